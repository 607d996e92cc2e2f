mod support;

use std::time::Duration;

use anyhow::Result;
use rust_decimal_macros::dec;

use swap_marketmaker::swap::registry::SwapRegistry;

#[test]
fn attach_is_idempotent() {
    let mut registry = SwapRegistry::new();

    let mut first = support::swap_record("swap-a", 100);
    first
        .state_fields
        .insert("note".to_string(), serde_json::json!("original"));
    registry.on_attached(first);
    registry.on_attached(support::swap_record("swap-a", 100));

    assert_eq!(registry.len(), 1);
    let records = registry.snapshot();
    assert_eq!(records[0].id, "swap-a");
    // The second attach must not have replaced the stored record.
    assert_eq!(records[0].state_fields["note"], "original");
}

#[test]
fn state_change_overwrites_flow_fields_only() {
    let mut registry = SwapRegistry::new();
    registry.on_attached(support::swap_record("swap-a", 100));

    let mut update = support::swap_record("swap-a", 999);
    update.buy_amount = dec!(9.99);
    update.state_fields.insert("step".to_string(), serde_json::json!(4));
    registry.on_state_changed(update);

    let records = registry.snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state_fields["step"], 4);
    // Identity fields recorded at attach time stay put.
    assert_eq!(records[0].created_unix, 100);
    assert_eq!(records[0].buy_amount, dec!(0.01));
}

#[test]
fn state_change_for_unknown_id_never_inserts() {
    let mut registry = SwapRegistry::new();
    registry.on_state_changed(support::swap_record("ghost", 100));
    assert!(registry.is_empty());
}

#[test]
fn snapshot_sorts_newest_first_with_stable_ties() {
    let mut registry = SwapRegistry::new();
    registry.on_attached(support::swap_record("old", 100));
    registry.on_attached(support::swap_record("tie-a", 200));
    registry.on_attached(support::swap_record("tie-b", 200));
    registry.on_attached(support::swap_record("new", 300));

    let snapshot = registry.snapshot();
    let ids: Vec<&str> = snapshot.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["new", "tie-a", "tie-b", "old"]);
}

#[test]
fn load_initial_replaces_everything() {
    let mut registry = SwapRegistry::new();
    registry.on_attached(support::swap_record("stale", 50));

    registry.load_initial(vec![
        support::swap_record("fresh-a", 100),
        support::swap_record("fresh-b", 200),
        // A duplicate in the bulk snapshot must not produce two entries.
        support::swap_record("fresh-a", 100),
    ]);

    let snapshot = registry.snapshot();
    let ids: Vec<&str> = snapshot.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["fresh-b", "fresh-a"]);
}

#[tokio::test]
async fn controller_reconciles_bulk_load_with_event_stream() -> Result<()> {
    let stack = support::paper_stack();
    stack.wallets.set_balance("btc", dec!(1));
    stack.wallets.set_balance("eth", dec!(0.5));
    stack.wallets.set_balance("usdt", dec!(100));
    stack.network.seed_active(support::swap_record("seed-old", 100));
    stack.network.seed_active(support::swap_record("seed-new", 300));

    let (controller, _notices) = support::controller(&stack)?;
    controller.start().await?;
    assert_eq!(stack.network.subscriber_count(), 1);

    let ids: Vec<String> = controller.swaps().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, ["seed-new", "seed-old"]);

    // Attach arrives, then a duplicate attach and an update for it.
    stack.network.emit_attached(support::swap_record("live", 200));
    support::wait_for("live swap attached", Duration::from_secs(5), || async {
        Ok((controller.swaps().len() == 3).then_some(()))
    })
    .await?;

    stack.network.emit_attached(support::swap_record("live", 200));
    let mut update = support::swap_record("live", 200);
    update.state_fields.insert("step".to_string(), serde_json::json!(7));
    stack.network.emit_state_changed(update);

    support::wait_for("live swap updated", Duration::from_secs(5), || async {
        let swaps = controller.swaps();
        let live = swaps.iter().find(|r| r.id == "live");
        Ok(live.is_some_and(|r| r.state_fields["step"] == 7).then_some(()))
    })
    .await?;

    let ids: Vec<String> = controller.swaps().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, ["seed-new", "live", "seed-old"]);

    controller.stop();
    assert_eq!(stack.network.subscriber_count(), 0);
    Ok(())
}
