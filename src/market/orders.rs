use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Sell the market token for BTC.
    SellToken,
    /// Sell BTC for the market token.
    BuyToken,
}

/// A request for one liquidity order. Computed fresh on every toggle-on
/// transition and handed straight to the order service; the controller
/// never keeps one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: Side,
    pub buy_currency: String,
    pub sell_currency: String,
    pub buy_amount: Decimal,
    pub sell_amount: Decimal,
    pub exchange_rate: Decimal,
    /// The wallet balance this leg was computed from.
    pub balance: Decimal,
    pub is_partial: bool,
    pub manual_rate: bool,
    pub is_turbo: bool,
    pub is_sending: bool,
    pub min_buy_amount: Decimal,
    pub min_sell_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHandle {
    pub id: OrderId,
    pub intent: OrderIntent,
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn list_my_orders(&self) -> Result<Vec<OrderHandle>>;

    async fn create_order(&self, intent: OrderIntent) -> Result<OrderHandle>;

    /// Idempotent: cancelling an already settled or already cancelled order
    /// succeeds. Which of those happened is the order service's concern.
    async fn cancel_order(&self, id: &OrderId) -> Result<()>;

    /// Hand an order over for partial-fill management.
    async fn register_partial_order(&self, order: &OrderHandle) -> Result<()>;
}

/// ```text
///           / 100 - spread[%] \
///  price * |  ---------------  |
///           \       100       /
/// ```
///
/// Sell the full token balance for BTC at a rate marked down by the spread.
pub fn compute_sell_leg(
    token_balance: Decimal,
    spread_fraction: Decimal,
    market_token: &str,
    min_tradable_amount: Decimal,
) -> OrderIntent {
    let hundred = dec!(100);
    let exchange_rate = (hundred - hundred * spread_fraction) / hundred;
    let sell_amount = token_balance * exchange_rate;

    OrderIntent {
        side: Side::SellToken,
        buy_currency: "btc".to_string(),
        sell_currency: market_token.to_ascii_lowercase(),
        buy_amount: token_balance,
        sell_amount,
        exchange_rate,
        balance: token_balance,
        is_partial: true,
        manual_rate: true,
        is_turbo: false,
        is_sending: true,
        min_buy_amount: min_tradable_amount,
        min_sell_amount: min_tradable_amount,
    }
}

/// Mirror of [`compute_sell_leg`]: sell the full BTC balance for the market
/// token at a rate marked up by the spread.
pub fn compute_buy_leg(
    btc_balance: Decimal,
    spread_fraction: Decimal,
    market_token: &str,
    min_tradable_amount: Decimal,
) -> OrderIntent {
    let hundred = dec!(100);
    let exchange_rate = (hundred + hundred * spread_fraction) / hundred;
    let buy_amount = btc_balance * exchange_rate;

    OrderIntent {
        side: Side::BuyToken,
        buy_currency: market_token.to_ascii_lowercase(),
        sell_currency: "btc".to_string(),
        buy_amount,
        sell_amount: btc_balance,
        exchange_rate,
        balance: btc_balance,
        is_partial: true,
        manual_rate: true,
        is_turbo: false,
        is_sending: true,
        min_buy_amount: min_tradable_amount,
        min_sell_amount: min_tradable_amount,
    }
}
