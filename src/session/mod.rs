pub mod store;

use anyhow::Result;

pub use store::SqliteSessionStore;

/// Durable per-session values the controller consumes at start and on
/// explicit refresh: whether the secret recovery phrase has been backed up,
/// and the last routed market token.
pub trait SessionStore: Send + Sync {
    fn mnemonic_saved(&self) -> Result<bool>;

    fn set_mnemonic_saved(&self, saved: bool) -> Result<()>;

    /// `None` when no token has been routed yet; callers fall back to the
    /// default market token.
    fn market_token(&self) -> Result<Option<String>>;

    fn set_market_token(&self, token: &str) -> Result<()>;
}
