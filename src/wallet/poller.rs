use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::retry::RetryScheduler;
use crate::wallet::{WalletHandle, WalletProvider, WalletQuery};

/// Locally cached balances for the three wallets the market maker trades
/// from. Replaced wholesale when the market token changes; refreshed in
/// place on each successful fetch.
#[derive(Debug, Clone)]
pub struct WalletBalanceSnapshot {
    pub market_token: String,
    pub btc_wallet: Option<WalletHandle>,
    pub eth_wallet: Option<WalletHandle>,
    pub token_wallet: Option<WalletHandle>,
    pub btc_balance: Decimal,
    pub eth_balance: Decimal,
    pub token_balance: Decimal,
    pub fetch_in_flight: bool,
}

impl WalletBalanceSnapshot {
    pub fn new(market_token: String) -> Self {
        Self {
            market_token,
            btc_wallet: None,
            eth_wallet: None,
            token_wallet: None,
            btc_balance: Decimal::ZERO,
            eth_balance: Decimal::ZERO,
            token_balance: Decimal::ZERO,
            fetch_in_flight: false,
        }
    }
}

/// Single-flight balance fetcher. At most one fetch sequence runs per
/// snapshot; contending refresh requests are re-scheduled after
/// `retry_delay` rather than dropped, so rapid token switches never lose a
/// refresh.
#[derive(Clone)]
pub struct BalancePoller {
    wallets: Arc<dyn WalletProvider>,
    snapshot: Arc<Mutex<WalletBalanceSnapshot>>,
    retries: Arc<RetryScheduler>,
    active: Arc<AtomicBool>,
    retry_delay: Duration,
}

impl BalancePoller {
    pub(crate) fn new(
        wallets: Arc<dyn WalletProvider>,
        snapshot: Arc<Mutex<WalletBalanceSnapshot>>,
        retries: Arc<RetryScheduler>,
        active: Arc<AtomicBool>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            wallets,
            snapshot,
            retries,
            active,
            retry_delay,
        }
    }

    /// Request that the snapshot for `market_token` be brought up to date.
    /// Returns immediately; the fetch runs in the background.
    pub fn refresh(&self, market_token: String) {
        let poller = self.clone();
        tokio::spawn(async move {
            poller.run_refresh(market_token).await;
        });
    }

    fn schedule_retry(&self, market_token: String) {
        let poller = self.clone();
        self.retries.schedule(self.retry_delay, async move {
            poller.run_refresh(market_token).await;
        });
    }

    async fn run_refresh(&self, market_token: String) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut snap = self.snapshot.lock().expect("balance snapshot mutex poisoned");
            if snap.fetch_in_flight {
                // Another fetch is resolving, typically because the token in
                // the route changed while the previous one was still running.
                // Keep the request alive instead of dropping it.
                drop(snap);
                debug!(token = %market_token, "balance fetch already in flight, retrying later");
                self.schedule_retry(market_token);
                return;
            }
            snap.fetch_in_flight = true;
        }

        let btc_wallet = self.wallets.wallet(&WalletQuery::internal("btc")).await;
        let eth_wallet = self.wallets.wallet(&WalletQuery::external("eth")).await;
        let token_wallet = self.wallets.wallet(&WalletQuery::external(&market_token)).await;

        let Some(token_wallet) = token_wallet else {
            // Unsupported token or the external signer is not connected yet.
            // Not an error: back off and poll again.
            if self.active.load(Ordering::SeqCst) {
                self.snapshot
                    .lock()
                    .expect("balance snapshot mutex poisoned")
                    .fetch_in_flight = false;
                debug!(token = %market_token, "token wallet not resolved, retrying later");
                self.schedule_retry(market_token);
            }
            return;
        };

        let btc_balance = self.fetch_one(btc_wallet.as_ref()).await;
        let eth_balance = self.fetch_one(eth_wallet.as_ref()).await;
        let token_balance = self.fetch_one(Some(&token_wallet)).await;

        if !self.active.load(Ordering::SeqCst) {
            // Torn down while the fetches were resolving; drop the result.
            return;
        }

        let stale_token = {
            let mut snap = self.snapshot.lock().expect("balance snapshot mutex poisoned");
            if snap.market_token.eq_ignore_ascii_case(&market_token) {
                if let Some(balance) = btc_balance {
                    snap.btc_balance = balance;
                }
                if let Some(balance) = eth_balance {
                    snap.eth_balance = balance;
                }
                if let Some(balance) = token_balance {
                    snap.token_balance = balance;
                }
                snap.btc_wallet = btc_wallet;
                snap.eth_wallet = eth_wallet;
                snap.token_wallet = Some(token_wallet);
                snap.fetch_in_flight = false;
                None
            } else {
                // The market token changed while this fetch was resolving.
                // Committing would mix balances across tokens.
                snap.fetch_in_flight = false;
                Some(snap.market_token.clone())
            }
        };

        match stale_token {
            None => debug!(token = %market_token, "balance snapshot committed"),
            Some(current) => {
                debug!(
                    fetched = %market_token,
                    current = %current,
                    "discarding balance result for stale market token"
                );
                self.refresh(current);
            }
        }
    }

    async fn fetch_one(&self, wallet: Option<&WalletHandle>) -> Option<Decimal> {
        let wallet = wallet?;
        match self.wallets.fetch_balance(wallet).await {
            Ok(balance) => Some(balance),
            Err(err) => {
                warn!(currency = %wallet.currency, error = %format!("{err:#}"), "balance fetch failed");
                None
            }
        }
    }
}
