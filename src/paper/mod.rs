//! In-process collaborator implementations for paper trading and tests: a
//! wallet provider with scripted balances, an order book that only records
//! what it is asked to do, a swap network fed by hand and a plain in-memory
//! session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::market::orders::{OrderHandle, OrderId, OrderIntent, OrderService};
use crate::session::SessionStore;
use crate::swap::{Subscription, SubscriptionId, SwapEvent, SwapNetwork, SwapRecord};
use crate::wallet::{WalletCapabilities, WalletHandle, WalletProvider, WalletQuery};

/// Wallet provider over a scripted balance table. A currency has a wallet
/// iff it has a balance entry. Fetches can be held open to exercise
/// in-flight interleavings.
pub struct PaperWalletProvider {
    external_wallets: bool,
    balances: Mutex<HashMap<String, Decimal>>,
    gate: watch::Sender<bool>,
    fetch_starts: AtomicUsize,
    in_fetch: AtomicUsize,
    max_concurrent_fetches: AtomicUsize,
}

impl PaperWalletProvider {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            external_wallets: true,
            balances: Mutex::new(HashMap::new()),
            gate,
            fetch_starts: AtomicUsize::new(0),
            in_fetch: AtomicUsize::new(0),
            max_concurrent_fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_external_wallets(mut self, external_wallets: bool) -> Self {
        self.external_wallets = external_wallets;
        self
    }

    pub fn set_balance(&self, currency: &str, balance: Decimal) {
        self.balances
            .lock()
            .expect("paper balances mutex poisoned")
            .insert(currency.to_ascii_lowercase(), balance);
    }

    pub fn remove_wallet(&self, currency: &str) {
        self.balances
            .lock()
            .expect("paper balances mutex poisoned")
            .remove(&currency.to_ascii_lowercase());
    }

    /// Block every balance fetch until [`Self::release_fetches`].
    pub fn hold_fetches(&self) {
        self.gate.send_replace(true);
    }

    pub fn release_fetches(&self) {
        self.gate.send_replace(false);
    }

    pub fn fetch_starts(&self) -> usize {
        self.fetch_starts.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches.load(Ordering::SeqCst)
    }
}

impl Default for PaperWalletProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvider for PaperWalletProvider {
    fn capabilities(&self) -> WalletCapabilities {
        WalletCapabilities {
            external_wallets: self.external_wallets,
        }
    }

    async fn wallet(&self, query: &WalletQuery) -> Option<WalletHandle> {
        let balances = self.balances.lock().expect("paper balances mutex poisoned");
        balances.contains_key(&query.currency).then(|| WalletHandle {
            currency: query.currency.clone(),
            address: format!("paper:{}", query.currency),
        })
    }

    async fn fetch_balance(&self, wallet: &WalletHandle) -> Result<Decimal> {
        self.fetch_starts.fetch_add(1, Ordering::SeqCst);
        let current = self.in_fetch.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_fetches
            .fetch_max(current, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        gate.wait_for(|held| !*held).await.ok();

        let balance = self
            .balances
            .lock()
            .expect("paper balances mutex poisoned")
            .get(&wallet.currency)
            .copied()
            .unwrap_or(Decimal::ZERO);

        self.in_fetch.fetch_sub(1, Ordering::SeqCst);
        Ok(balance)
    }
}

/// Order service that records creations, cancels and partial registrations.
#[derive(Default)]
pub struct PaperOrderBook {
    orders: Mutex<Vec<OrderHandle>>,
    partial: Mutex<Vec<OrderId>>,
    fail_creates: AtomicBool,
    cancels: AtomicUsize,
}

impl PaperOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an owned order, as if left behind by an earlier session.
    pub fn seed_order(&self, intent: OrderIntent) -> OrderHandle {
        let order = OrderHandle {
            id: OrderId(Uuid::new_v4().to_string()),
            intent,
        };
        self.orders
            .lock()
            .expect("paper orders mutex poisoned")
            .push(order.clone());
        order
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<OrderHandle> {
        self.orders
            .lock()
            .expect("paper orders mutex poisoned")
            .clone()
    }

    pub fn partial_registrations(&self) -> Vec<OrderId> {
        self.partial
            .lock()
            .expect("paper partial mutex poisoned")
            .clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderService for PaperOrderBook {
    async fn list_my_orders(&self) -> Result<Vec<OrderHandle>> {
        Ok(self.orders())
    }

    async fn create_order(&self, intent: OrderIntent) -> Result<OrderHandle> {
        anyhow::ensure!(
            !self.fail_creates.load(Ordering::SeqCst),
            "order gateway rejected create"
        );
        let order = OrderHandle {
            id: OrderId(Uuid::new_v4().to_string()),
            intent,
        };
        self.orders
            .lock()
            .expect("paper orders mutex poisoned")
            .push(order.clone());
        Ok(order)
    }

    async fn cancel_order(&self, id: &OrderId) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .expect("paper orders mutex poisoned")
            .retain(|order| &order.id != id);
        Ok(())
    }

    async fn register_partial_order(&self, order: &OrderHandle) -> Result<()> {
        self.partial
            .lock()
            .expect("paper partial mutex poisoned")
            .push(order.id.clone());
        Ok(())
    }
}

/// Hand-driven swap network: seed the active list, then emit attach and
/// state-change events to every subscriber.
#[derive(Default)]
pub struct PaperSwapNetwork {
    active: Mutex<Vec<SwapRecord>>,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<SwapEvent>>>,
    next_id: AtomicU64,
}

impl PaperSwapNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_active(&self, record: SwapRecord) {
        self.active
            .lock()
            .expect("paper swaps mutex poisoned")
            .push(record);
    }

    pub fn emit_attached(&self, record: SwapRecord) {
        self.emit(SwapEvent::Attached(record));
    }

    pub fn emit_state_changed(&self, record: SwapRecord) {
        self.emit(SwapEvent::StateChanged(record));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("paper subscribers mutex poisoned")
            .len()
    }

    fn emit(&self, event: SwapEvent) {
        let subscribers = self
            .subscribers
            .lock()
            .expect("paper subscribers mutex poisoned");
        for tx in subscribers.values() {
            tx.send(event.clone()).ok();
        }
    }
}

#[async_trait]
impl SwapNetwork for PaperSwapNetwork {
    async fn list_active_swaps(&self) -> Result<Vec<SwapRecord>> {
        Ok(self
            .active
            .lock()
            .expect("paper swaps mutex poisoned")
            .clone())
    }

    fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("paper subscribers mutex poisoned")
            .insert(id, tx);
        Subscription {
            id: SubscriptionId(id),
            events: rx,
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .expect("paper subscribers mutex poisoned")
            .remove(&id.0);
    }
}

/// Plain in-memory session for tests.
#[derive(Debug, Default)]
pub struct PaperSession {
    mnemonic_saved: AtomicBool,
    market_token: Mutex<Option<String>>,
}

impl PaperSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market_token(self, token: &str) -> Self {
        *self
            .market_token
            .lock()
            .expect("paper session mutex poisoned") = Some(token.to_ascii_lowercase());
        self
    }

    pub fn with_mnemonic_saved(self, saved: bool) -> Self {
        self.mnemonic_saved.store(saved, Ordering::SeqCst);
        self
    }
}

impl SessionStore for PaperSession {
    fn mnemonic_saved(&self) -> Result<bool> {
        Ok(self.mnemonic_saved.load(Ordering::SeqCst))
    }

    fn set_mnemonic_saved(&self, saved: bool) -> Result<()> {
        self.mnemonic_saved.store(saved, Ordering::SeqCst);
        Ok(())
    }

    fn market_token(&self) -> Result<Option<String>> {
        Ok(self
            .market_token
            .lock()
            .expect("paper session mutex poisoned")
            .clone())
    }

    fn set_market_token(&self, token: &str) -> Result<()> {
        *self
            .market_token
            .lock()
            .expect("paper session mutex poisoned") = Some(token.to_ascii_lowercase());
        Ok(())
    }
}
