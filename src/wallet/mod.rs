pub mod poller;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// Address derived from the locally held seed.
    Internal,
    /// Address supplied by a connected external signer.
    External,
}

/// Wallet lookup request. Currencies are lowercase tickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletQuery {
    pub currency: String,
    pub connected: bool,
    pub address_kind: AddressKind,
}

impl WalletQuery {
    pub fn internal(currency: &str) -> Self {
        Self {
            currency: currency.to_ascii_lowercase(),
            connected: false,
            address_kind: AddressKind::Internal,
        }
    }

    pub fn external(currency: &str) -> Self {
        Self {
            currency: currency.to_ascii_lowercase(),
            connected: true,
            address_kind: AddressKind::External,
        }
    }
}

/// Opaque handle to a resolved wallet. The address is shown to the user for
/// top-ups; nothing else about the wallet is assumed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletHandle {
    pub currency: String,
    pub address: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalletCapabilities {
    /// Whether externally addressed (browser-signer) wallets can be connected.
    pub external_wallets: bool,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn capabilities(&self) -> WalletCapabilities;

    /// Resolve a wallet, or `None` if the currency is unsupported or the
    /// requested connection is not ready yet.
    async fn wallet(&self, query: &WalletQuery) -> Option<WalletHandle>;

    async fn fetch_balance(&self, wallet: &WalletHandle) -> Result<Decimal>;
}
