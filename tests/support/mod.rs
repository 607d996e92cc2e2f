use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use rust_decimal_macros::dec;
use tokio::sync::mpsc::UnboundedReceiver;

use swap_marketmaker::config::MarketMakerConfig;
use swap_marketmaker::market::controller::{MarketmakerController, Notice};
use swap_marketmaker::paper::{PaperOrderBook, PaperSession, PaperSwapNetwork, PaperWalletProvider};
use swap_marketmaker::swap::SwapRecord;

pub struct PaperStack {
    pub wallets: Arc<PaperWalletProvider>,
    pub orders: Arc<PaperOrderBook>,
    pub network: Arc<PaperSwapNetwork>,
    pub session: Arc<PaperSession>,
}

pub fn paper_stack() -> PaperStack {
    PaperStack {
        wallets: Arc::new(PaperWalletProvider::new()),
        orders: Arc::new(PaperOrderBook::new()),
        network: Arc::new(PaperSwapNetwork::new()),
        session: Arc::new(PaperSession::new()),
    }
}

pub fn controller(
    stack: &PaperStack,
) -> Result<(MarketmakerController, UnboundedReceiver<Notice>)> {
    MarketmakerController::new(
        MarketMakerConfig::default(),
        stack.wallets.clone(),
        stack.orders.clone(),
        stack.network.clone(),
        stack.session.clone(),
    )
}

pub fn swap_record(id: &str, created_unix: u64) -> SwapRecord {
    let mut state_fields = serde_json::Map::new();
    state_fields.insert("step".to_string(), serde_json::json!(1));
    SwapRecord {
        id: id.to_string(),
        is_my: true,
        buy_currency: "btc".to_string(),
        sell_currency: "usdt".to_string(),
        buy_amount: dec!(0.01),
        sell_amount: dec!(100),
        created_unix,
        state_fields,
    }
}

pub async fn wait_for<T, F, Fut>(description: &str, timeout: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut sleep_for = Duration::from_millis(200);

    loop {
        let now = Instant::now();
        if now >= deadline {
            anyhow::bail!("timeout waiting for {description}");
        }

        if let Some(value) = f().await.with_context(|| format!("poll {description}"))? {
            return Ok(value);
        }

        tokio::time::sleep(sleep_for).await;
        sleep_for = (sleep_for * 2).min(Duration::from_secs(2));
    }
}
