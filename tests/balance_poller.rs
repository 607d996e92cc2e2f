mod support;

use std::time::Duration;

use anyhow::Result;
use rust_decimal_macros::dec;

use support::PaperStack;
use swap_marketmaker::market::controller::MarketmakerController;

fn funded_stack() -> PaperStack {
    let stack = support::paper_stack();
    stack.wallets.set_balance("btc", dec!(1));
    stack.wallets.set_balance("eth", dec!(0.5));
    stack.wallets.set_balance("usdt", dec!(100));
    stack
}

async fn wait_for_commit(controller: &MarketmakerController) -> Result<()> {
    support::wait_for("balance snapshot commit", Duration::from_secs(60), || async {
        let balances = controller.balances();
        Ok((!balances.fetch_in_flight && balances.token_wallet.is_some()).then_some(()))
    })
    .await
}

#[tokio::test(start_paused = true)]
async fn overlapping_refreshes_never_run_concurrent_fetches() -> Result<()> {
    let stack = funded_stack();
    let (controller, _notices) = support::controller(&stack)?;

    stack.wallets.hold_fetches();
    controller.start().await?;
    // Let the first fetch claim the snapshot before piling on.
    tokio::time::sleep(Duration::from_millis(10)).await;

    for _ in 0..3 {
        controller.refresh_balances();
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    stack.wallets.release_fetches();

    wait_for_commit(&controller).await?;
    // Give the re-scheduled refreshes time to drain.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(stack.wallets.max_concurrent_fetches(), 1);
    let balances = controller.balances();
    assert_eq!(balances.btc_balance, dec!(1));
    assert_eq!(balances.eth_balance, dec!(0.5));
    assert_eq!(balances.token_balance, dec!(100));
    assert_eq!(balances.market_token, "usdt");

    controller.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unresolved_token_wallet_polls_until_it_appears() -> Result<()> {
    let stack = support::paper_stack();
    stack.wallets.set_balance("btc", dec!(1));
    stack.wallets.set_balance("eth", dec!(0.5));
    // No usdt wallet yet: the poller must back off, not fail.

    let (controller, _notices) = support::controller(&stack)?;
    controller.start().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(controller.balances().token_wallet.is_none());

    stack.wallets.set_balance("usdt", dec!(42));
    wait_for_commit(&controller).await?;

    assert_eq!(controller.balances().token_balance, dec!(42));
    controller.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn result_for_a_stale_market_token_is_discarded() -> Result<()> {
    let stack = funded_stack();
    stack.wallets.set_balance("noxon", dec!(7));

    let (controller, _notices) = support::controller(&stack)?;
    stack.wallets.hold_fetches();
    controller.start().await?;
    // The usdt fetch is now in flight; switch tokens under it.
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.set_market_token("noxon");

    stack.wallets.release_fetches();
    support::wait_for("noxon snapshot commit", Duration::from_secs(60), || async {
        let balances = controller.balances();
        Ok((balances.token_balance == dec!(7)).then_some(()))
    })
    .await?;

    let balances = controller.balances();
    assert_eq!(balances.market_token, "noxon");
    assert_eq!(balances.token_balance, dec!(7));
    assert_eq!(balances.btc_balance, dec!(1));

    controller.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fetch_resolving_after_teardown_mutates_nothing() -> Result<()> {
    let stack = funded_stack();
    let (controller, _notices) = support::controller(&stack)?;

    stack.wallets.hold_fetches();
    controller.start().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;

    controller.stop();
    stack.wallets.release_fetches();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let balances = controller.balances();
    assert_eq!(balances.btc_balance, dec!(0));
    assert_eq!(balances.token_balance, dec!(0));
    assert!(balances.token_wallet.is_none());
    Ok(())
}
