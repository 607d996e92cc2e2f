pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One peer-to-peer swap as observed from the swap network. Everything but
/// `state_fields` is fixed at creation; `state_fields` mirrors the swap
/// flow's current status attributes verbatim and varies by swap type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: String,
    pub is_my: bool,
    pub buy_currency: String,
    pub sell_currency: String,
    pub buy_amount: Decimal,
    pub sell_amount: Decimal,
    pub created_unix: u64,
    #[serde(default)]
    pub state_fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub enum SwapEvent {
    Attached(SwapRecord),
    StateChanged(SwapRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Live event feed handed out by [`SwapNetwork::subscribe`]. Dropping the
/// receiver does not unsubscribe; pass the id back to
/// [`SwapNetwork::unsubscribe`].
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<SwapEvent>,
}

#[async_trait]
pub trait SwapNetwork: Send + Sync {
    /// Swaps currently attached to this session, for the initial bulk load.
    async fn list_active_swaps(&self) -> Result<Vec<SwapRecord>>;

    fn subscribe(&self) -> Subscription;

    fn unsubscribe(&self, id: SubscriptionId);
}
