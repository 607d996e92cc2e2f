use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::Parser as _;
use rust_decimal::Decimal;
use serde_json::json;

use swap_marketmaker::config::MarketMakerConfig;
use swap_marketmaker::market::controller::MarketmakerController;
use swap_marketmaker::paper::{PaperOrderBook, PaperSwapNetwork, PaperWalletProvider};
use swap_marketmaker::session::{SessionStore as _, SqliteSessionStore};

/// Run one market-making cycle against paper collaborators: fetch balances,
/// flip the toggle on and print the placed legs.
#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long, default_value = "usdt")]
    market_token: String,

    #[arg(long, default_value = "0.1")]
    spread: Decimal,

    #[arg(long, default_value = "1.5")]
    btc_balance: Decimal,

    #[arg(long, default_value = "0.2")]
    eth_balance: Decimal,

    #[arg(long, default_value = "250")]
    token_balance: Decimal,

    #[arg(long)]
    store_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    swap_marketmaker::logging::init().ok();

    let args = Args::parse();

    let cfg = MarketMakerConfig {
        spread_fraction: args.spread,
        ..MarketMakerConfig::default()
    };

    let wallets = Arc::new(PaperWalletProvider::new());
    wallets.set_balance("btc", args.btc_balance);
    wallets.set_balance("eth", args.eth_balance);
    wallets.set_balance(&args.market_token, args.token_balance);

    let orders = Arc::new(PaperOrderBook::new());
    let network = Arc::new(PaperSwapNetwork::new());

    let store_path = args
        .store_path
        .unwrap_or_else(|| std::env::temp_dir().join("paper_mm_session.sqlite3"));
    let session = Arc::new(SqliteSessionStore::open(store_path).context("open session store")?);
    session
        .set_market_token(&args.market_token)
        .context("persist market token")?;
    session
        .set_mnemonic_saved(true)
        .context("persist mnemonic flag")?;

    let (controller, mut notices) = MarketmakerController::new(
        cfg,
        wallets.clone(),
        orders.clone(),
        network,
        session,
    )?;
    controller.start().await.context("start controller")?;

    wait_for_balances(&controller).await?;
    let balances = controller.balances();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "market_token": balances.market_token,
            "btc_balance": balances.btc_balance,
            "eth_balance": balances.eth_balance,
            "token_balance": balances.token_balance,
        }))?
    );

    let state = controller.toggle_market_maker().await?;
    println!("market maker: {state:?}");

    while let Ok(notice) = notices.try_recv() {
        tracing::warn!(notice = ?notice, "advisory notice");
    }

    for order in orders.orders() {
        println!("{}", serde_json::to_string_pretty(&order)?);
    }

    controller.stop();
    Ok(())
}

async fn wait_for_balances(controller: &MarketmakerController) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let balances = controller.balances();
        if !balances.fetch_in_flight && balances.token_wallet.is_some() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            anyhow::bail!("timeout waiting for balance snapshot");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
