use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MarketMakerConfig;
use crate::market::orders::{self, OrderIntent, OrderService};
use crate::retry::RetryScheduler;
use crate::session::SessionStore;
use crate::swap::registry::SwapRegistry;
use crate::swap::{SubscriptionId, SwapEvent, SwapNetwork, SwapRecord};
use crate::wallet::poller::{BalancePoller, WalletBalanceSnapshot};
use crate::wallet::{WalletCapabilities, WalletProvider};

pub const DEFAULT_MARKET_TOKEN: &str = "usdt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToggleState {
    #[default]
    Off,
    On,
}

/// Advisory, user-facing signals. Expected business outcomes, not errors:
/// the controller keeps running after every one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// ETH balance is below the miner-fee threshold.
    InsufficientFeeBalance,
    /// Neither the market token nor BTC has any balance to trade.
    InsufficientFunds { market_token: String },
    /// The order service rejected a create or cancel request.
    OrderService { message: String },
}

#[derive(Debug, Default)]
struct ControllerState {
    toggle: ToggleState,
    mnemonic_saved: bool,
}

struct Inner {
    cfg: MarketMakerConfig,
    wallets: Arc<dyn WalletProvider>,
    orders: Arc<dyn OrderService>,
    network: Arc<dyn SwapNetwork>,
    session: Arc<dyn SessionStore>,
    poller: BalancePoller,
    snapshot: Arc<Mutex<WalletBalanceSnapshot>>,
    registry: Arc<Mutex<SwapRegistry>>,
    state: Mutex<ControllerState>,
    notices: mpsc::UnboundedSender<Notice>,
    active: Arc<AtomicBool>,
    retries: Arc<RetryScheduler>,
    subscription: Mutex<Option<SubscriptionId>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    // Serializes whole toggle transitions so rapid clicks cannot interleave
    // cleanup and placement.
    toggle_gate: tokio::sync::Mutex<()>,
}

/// The market-making controller: owns the balance snapshot, the swap
/// registry and the on/off toggle, and talks to the wallet, order and swap
/// network collaborators. Cheap to clone; all clones share one instance.
#[derive(Clone)]
pub struct MarketmakerController {
    inner: Arc<Inner>,
}

impl MarketmakerController {
    pub fn new(
        cfg: MarketMakerConfig,
        wallets: Arc<dyn WalletProvider>,
        orders: Arc<dyn OrderService>,
        network: Arc<dyn SwapNetwork>,
        session: Arc<dyn SessionStore>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notice>)> {
        cfg.validate().context("validate market maker config")?;

        let (notices, notices_rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(false));
        let retries = Arc::new(RetryScheduler::new());
        let snapshot = Arc::new(Mutex::new(WalletBalanceSnapshot::new(
            DEFAULT_MARKET_TOKEN.to_string(),
        )));
        let poller = BalancePoller::new(
            wallets.clone(),
            snapshot.clone(),
            retries.clone(),
            active.clone(),
            cfg.retry_delay,
        );

        let controller = Self {
            inner: Arc::new(Inner {
                cfg,
                wallets,
                orders,
                network,
                session,
                poller,
                snapshot,
                registry: Arc::new(Mutex::new(SwapRegistry::new())),
                state: Mutex::new(ControllerState::default()),
                notices,
                active,
                retries,
                subscription: Mutex::new(None),
                pump: Mutex::new(None),
                toggle_gate: tokio::sync::Mutex::new(()),
            }),
        };
        Ok((controller, notices_rx))
    }

    /// Bring the controller up: restore session values, recover the toggle
    /// state from currently owned orders, bulk-load the swap registry,
    /// subscribe to swap events and kick off the first balance refresh.
    pub async fn start(&self) -> Result<()> {
        anyhow::ensure!(
            !self.inner.active.swap(true, Ordering::SeqCst),
            "controller already started"
        );
        if let Err(err) = self.run_start().await {
            self.inner.active.store(false, Ordering::SeqCst);
            return Err(err);
        }
        Ok(())
    }

    async fn run_start(&self) -> Result<()> {
        let mnemonic_saved = self
            .inner
            .session
            .mnemonic_saved()
            .context("read mnemonic-saved flag")?;
        let market_token = self
            .inner
            .session
            .market_token()
            .context("read routed market token")?
            .unwrap_or_else(|| DEFAULT_MARKET_TOKEN.to_string())
            .to_ascii_lowercase();

        {
            let mut snap = self
                .inner
                .snapshot
                .lock()
                .expect("balance snapshot mutex poisoned");
            *snap = WalletBalanceSnapshot::new(market_token.clone());
        }

        let owned = self
            .inner
            .orders
            .list_my_orders()
            .await
            .context("list my orders")?;
        let initial = self
            .inner
            .network
            .list_active_swaps()
            .await
            .context("list active swaps")?;

        let market_enabled = !owned.is_empty();
        {
            let mut registry = self.inner.registry.lock().expect("swap registry mutex poisoned");
            registry.load_initial(initial);
        }
        {
            let mut state = self.inner.state.lock().expect("controller state mutex poisoned");
            state.toggle = if market_enabled {
                ToggleState::On
            } else {
                ToggleState::Off
            };
            state.mnemonic_saved = mnemonic_saved;
        }

        let subscription = self.inner.network.subscribe();
        *self
            .inner
            .subscription
            .lock()
            .expect("subscription mutex poisoned") = Some(subscription.id);

        let registry = self.inner.registry.clone();
        let active = self.inner.active.clone();
        let mut events = subscription.events;
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                let mut registry = registry.lock().expect("swap registry mutex poisoned");
                match event {
                    SwapEvent::Attached(record) => registry.on_attached(record),
                    SwapEvent::StateChanged(record) => registry.on_state_changed(record),
                }
            }
        });
        *self.inner.pump.lock().expect("pump handle mutex poisoned") = Some(pump);

        self.inner.poller.refresh(market_token.clone());

        info!(
            token = %market_token,
            market_enabled,
            "market-making controller started"
        );
        Ok(())
    }

    /// Tear the controller down: cancel pending retries, drop the event
    /// subscription and make every in-flight completion a no-op. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.retries.cancel_all();
        if let Some(id) = self
            .inner
            .subscription
            .lock()
            .expect("subscription mutex poisoned")
            .take()
        {
            self.inner.network.unsubscribe(id);
        }
        if let Some(pump) = self.inner.pump.lock().expect("pump handle mutex poisoned").take() {
            pump.abort();
        }
        info!("market-making controller stopped");
    }

    /// Switch to a different market token. The snapshot is replaced
    /// wholesale (balances zeroed, wallets cleared) and a refresh for the
    /// new token is issued; a fetch already in flight keeps its claim and
    /// its result is discarded on commit.
    pub fn set_market_token(&self, market_token: &str) {
        if !self.inner.active.load(Ordering::SeqCst) {
            return;
        }
        let market_token = market_token.to_ascii_lowercase();
        {
            let mut snap = self
                .inner
                .snapshot
                .lock()
                .expect("balance snapshot mutex poisoned");
            if snap.market_token.eq_ignore_ascii_case(&market_token) {
                return;
            }
            let fetch_in_flight = snap.fetch_in_flight;
            *snap = WalletBalanceSnapshot::new(market_token.clone());
            snap.fetch_in_flight = fetch_in_flight;
        }
        if let Err(err) = self.inner.session.set_market_token(&market_token) {
            warn!(error = %format!("{err:#}"), "persist market token");
        }
        info!(token = %market_token, "market token changed");
        self.inner.poller.refresh(market_token);
    }

    /// Re-poll wallet balances for the current token, e.g. after an
    /// external wallet connect or disconnect.
    pub fn refresh_balances(&self) {
        if !self.inner.active.load(Ordering::SeqCst) {
            return;
        }
        let market_token = self
            .inner
            .snapshot
            .lock()
            .expect("balance snapshot mutex poisoned")
            .market_token
            .clone();
        self.inner.poller.refresh(market_token);
    }

    /// Flip the market-making toggle. Validation failures never error: they
    /// raise an advisory [`Notice`] and force the toggle off. Turning on
    /// clears stale orders, then places one leg per funded balance; turning
    /// off clears orders only.
    pub async fn toggle_market_maker(&self) -> Result<ToggleState> {
        anyhow::ensure!(
            self.inner.active.load(Ordering::SeqCst),
            "controller not started"
        );
        let _gate = self.inner.toggle_gate.lock().await;

        let (market_token, btc_balance, eth_balance, token_balance) = {
            let snap = self
                .inner
                .snapshot
                .lock()
                .expect("balance snapshot mutex poisoned");
            (
                snap.market_token.clone(),
                snap.btc_balance,
                snap.eth_balance,
                snap.token_balance,
            )
        };

        let eth_ok = eth_balance >= self.inner.cfg.min_eth_for_fees;
        let token_ok = token_balance > Decimal::ZERO;
        let btc_ok = btc_balance > Decimal::ZERO;

        if !eth_ok {
            debug!(%eth_balance, "toggle rejected: not enough ETH for miner fees");
            self.force_off();
            self.notify(Notice::InsufficientFeeBalance);
            return Ok(ToggleState::Off);
        }
        if !token_ok && !btc_ok {
            debug!(token = %market_token, "toggle rejected: nothing to trade");
            self.force_off();
            self.notify(Notice::InsufficientFunds { market_token });
            return Ok(ToggleState::Off);
        }

        let next = {
            let mut state = self.inner.state.lock().expect("controller state mutex poisoned");
            state.toggle = match state.toggle {
                ToggleState::Off => ToggleState::On,
                ToggleState::On => ToggleState::Off,
            };
            state.toggle
        };

        let outcome = match next {
            ToggleState::On => {
                self.enable_market(
                    &market_token,
                    token_ok.then_some(token_balance),
                    btc_ok.then_some(btc_balance),
                )
                .await
            }
            ToggleState::Off => self.cancel_all_orders().await,
        };
        if let Err(err) = outcome {
            warn!(error = %format!("{err:#}"), "order service request failed");
            self.notify(Notice::OrderService {
                message: format!("{err:#}"),
            });
        }
        Ok(next)
    }

    /// Cancel stale orders, then place each leg whose balance check passed.
    /// The legs are computed from the balances validated by the caller, not
    /// re-read, so a refresh landing mid-transition cannot skew them.
    async fn enable_market(
        &self,
        market_token: &str,
        token_balance: Option<Decimal>,
        btc_balance: Option<Decimal>,
    ) -> Result<()> {
        self.cancel_all_orders().await?;

        let cfg = &self.inner.cfg;
        let mut first_err: Option<anyhow::Error> = None;

        if let Some(balance) = token_balance {
            let intent = orders::compute_sell_leg(
                balance,
                cfg.spread_fraction,
                market_token,
                cfg.min_tradable_amount,
            );
            if let Err(err) = self.place_order(intent).await {
                first_err.get_or_insert(err);
            }
        }
        if let Some(balance) = btc_balance {
            let intent = orders::compute_buy_leg(
                balance,
                cfg.spread_fraction,
                market_token,
                cfg.min_tradable_amount,
            );
            if let Err(err) = self.place_order(intent).await {
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn place_order(&self, intent: OrderIntent) -> Result<()> {
        let side = intent.side;
        let order = self
            .inner
            .orders
            .create_order(intent)
            .await
            .context("create order")?;
        self.inner
            .orders
            .register_partial_order(&order)
            .await
            .context("register partial order")?;
        info!(
            order_id = %order.id,
            side = ?side,
            sell_amount = %order.intent.sell_amount,
            buy_amount = %order.intent.buy_amount,
            rate = %order.intent.exchange_rate,
            "liquidity order placed"
        );
        Ok(())
    }

    /// Cancel every order currently owned by this controller. Enumerates at
    /// call time, so running it twice in a row is harmless.
    async fn cancel_all_orders(&self) -> Result<()> {
        let owned = self
            .inner
            .orders
            .list_my_orders()
            .await
            .context("list my orders")?;
        for order in owned {
            self.inner
                .orders
                .cancel_order(&order.id)
                .await
                .with_context(|| format!("cancel order {}", order.id))?;
            debug!(order_id = %order.id, "order cancelled");
        }
        Ok(())
    }

    fn force_off(&self) {
        self.inner
            .state
            .lock()
            .expect("controller state mutex poisoned")
            .toggle = ToggleState::Off;
    }

    fn notify(&self, notice: Notice) {
        // A dropped receiver only means nobody is listening.
        self.inner.notices.send(notice).ok();
    }

    pub fn state(&self) -> ToggleState {
        self.inner
            .state
            .lock()
            .expect("controller state mutex poisoned")
            .toggle
    }

    pub fn balances(&self) -> WalletBalanceSnapshot {
        self.inner
            .snapshot
            .lock()
            .expect("balance snapshot mutex poisoned")
            .clone()
    }

    /// Swap records for display, newest first.
    pub fn swaps(&self) -> Vec<SwapRecord> {
        self.inner
            .registry
            .lock()
            .expect("swap registry mutex poisoned")
            .snapshot()
    }

    pub fn capabilities(&self) -> WalletCapabilities {
        self.inner.wallets.capabilities()
    }

    pub fn mnemonic_saved(&self) -> bool {
        self.inner
            .state
            .lock()
            .expect("controller state mutex poisoned")
            .mnemonic_saved
    }

    /// Re-read the mnemonic-saved flag from the session store, e.g. after
    /// the backup dialog closes.
    pub fn refresh_mnemonic_saved(&self) -> Result<bool> {
        let saved = self
            .inner
            .session
            .mnemonic_saved()
            .context("read mnemonic-saved flag")?;
        self.inner
            .state
            .lock()
            .expect("controller state mutex poisoned")
            .mnemonic_saved = saved;
        Ok(saved)
    }
}

impl std::fmt::Debug for MarketmakerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketmakerController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
