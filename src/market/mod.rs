pub mod controller;
pub mod orders;
