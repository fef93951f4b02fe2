//! Economy engine
//!
//! Ties the ledger, exchange rates, inflation loop and persistence writer
//! together behind one cloneable handle.
//!
//! One `parking_lot::Mutex` guards the whole `EconomyState`. Every
//! transaction runs its checks and mutation inside it, and so does every
//! inflation tick, so a transaction never observes half-updated rates and
//! the GOLD cap check always sees the post-mutation aggregate. Persistence
//! happens after the lock is released.
//!
//! # Example
//!
//! ```no_run
//! use economy_core::{AlwaysActive, Config, Currency, Economy, RocksStore};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> economy_core::Result<()> {
//!     let config = Config::default();
//!     let store = Arc::new(RocksStore::open(&config)?);
//!     let economy = Economy::open(config, store, Arc::new(AlwaysActive)).await?;
//!
//!     let player = economy_core::AccountId::random();
//!     economy.credit(player, Currency::Gold, Decimal::from(100)).await?;
//!     assert_eq!(economy.balance(player, Currency::Gold), Decimal::from(100));
//!
//!     economy.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_persist_actor, PersistHandle},
    inflation::{InflationController, InflationReport, InflationTask},
    metrics::Metrics,
    presence::Presence,
    processor::TransactionProcessor,
    state::{EconomyState, Snapshot},
    storage::SnapshotStore,
    types::{AccountId, Balances, Currency, EconomySummary, ExchangeReceipt, TransferReceipt},
    Config, Error, Result,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Main economy interface
#[derive(Clone)]
pub struct Economy {
    inner: Arc<Inner>,
}

struct Inner {
    /// Ledger + rates + parameters
    state: Arc<Mutex<EconomyState>>,

    /// Reachability of credit targets
    presence: Arc<dyn Presence>,

    /// Prometheus metrics
    metrics: Metrics,

    /// Persistence writer
    persister: PersistHandle,

    /// Saves are coalesced by the writer instead of awaited
    batching: bool,

    /// Periodic recalibration, if enabled
    inflation: Mutex<Option<InflationTask>>,
}

impl std::fmt::Debug for Economy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Economy")
            .field("batching", &self.inner.batching)
            .finish_non_exhaustive()
    }
}

impl Economy {
    /// Open the economy: restore persisted state (or initialize defaults),
    /// start the persistence writer and the inflation task.
    pub async fn open(
        config: Config,
        store: Arc<dyn SnapshotStore>,
        presence: Arc<dyn Presence>,
    ) -> Result<Self> {
        config.validate()?;

        let state = match store.load()? {
            Some(snapshot) => {
                tracing::info!(accounts = snapshot.accounts.len(), "Loading economy data from store");
                EconomyState::restore(snapshot)?
            }
            None => {
                tracing::info!("No persisted economy data; initializing defaults");
                let state = EconomyState::new((&config.economy).into());
                store.save(&state.snapshot())?;
                state
            }
        };
        let saved_version = Some(state.version());

        let metrics = Metrics::new().map_err(|e| Error::Other(format!("Failed to create metrics: {}", e)))?;
        metrics.update_economy(
            state.circulating_gold_supply(),
            state.params().current_inflation_rate,
        );

        let state = Arc::new(Mutex::new(state));
        let persister = spawn_persist_actor(
            state.clone(),
            store,
            metrics.clone(),
            config.persistence.flush_interval(),
            config.persistence.batching,
            saved_version,
        );

        let inner = Arc::new(Inner {
            state,
            presence,
            metrics,
            persister,
            batching: config.persistence.batching,
            inflation: Mutex::new(None),
        });

        if config.inflation.enabled {
            let weak = Arc::downgrade(&inner);
            let task = InflationTask::spawn(config.inflation.interval(), move || {
                match weak.upgrade() {
                    Some(inner) => {
                        inner.run_inflation_tick();
                        true
                    }
                    // Engine dropped without shutdown
                    None => false,
                }
            });
            *inner.inflation.lock() = Some(task);
        }

        let economy = Self { inner };
        economy.log_startup(&config);
        Ok(economy)
    }

    fn log_startup(&self, config: &Config) {
        let summary = self.summary();
        tracing::info!(
            service = %config.service_name,
            max_gold_supply = %summary.max_gold_supply,
            circulating_gold = %summary.circulating_gold_supply,
            inflation_pct = %(summary.gold_inflation_rate * Decimal::ONE_HUNDRED).round_dp(4),
            inflation_interval_secs = config.inflation.interval_secs,
            accounts = summary.account_count,
            "Economy initialized"
        );
        for (currency, rate) in &summary.exchange_rates {
            tracing::info!(currency = %currency, rate = %rate, "Exchange rate to GOLD");
        }
    }

    // Transactions

    /// Credit `amount` of `currency` to `account`. Returns the new balance.
    pub async fn credit(&self, account: AccountId, currency: Currency, amount: Decimal) -> Result<Decimal> {
        let balance = self
            .inner
            .apply("credit", |p| p.credit(account, currency, amount))?;
        self.inner.persist().await;
        Ok(balance)
    }

    /// Transfer `amount` of `currency` from `from` to `to`
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        let receipt = self
            .inner
            .apply("transfer", |p| p.transfer(from, to, currency, amount))?;
        self.inner.persist().await;
        Ok(receipt)
    }

    /// Exchange `amount` of `from_currency` into `to_currency` for `account`
    pub async fn exchange(
        &self,
        account: AccountId,
        from_currency: Currency,
        to_currency: Currency,
        amount: Decimal,
    ) -> Result<ExchangeReceipt> {
        let receipt = self.inner.apply("exchange", |p| {
            p.exchange(account, from_currency, to_currency, amount)
        })?;
        self.inner.persist().await;
        Ok(receipt)
    }

    // Queries

    /// Balance of `account` in `currency` (0 when unseen)
    pub fn balance(&self, account: AccountId, currency: Currency) -> Decimal {
        self.balances(account).get(currency)
    }

    /// All balances of `account`
    pub fn balances(&self, account: AccountId) -> Balances {
        let (balances, opened) = {
            let mut state = self.inner.state.lock();
            let opened = state.ledger.open_account(account);
            if opened {
                state.bump_version();
            }
            (state.ledger.balances(&account), opened)
        };

        // New zeroed record gets saved with the next snapshot
        if opened {
            self.inner.persister.mark_dirty();
        }
        balances
    }

    /// Current rate of `currency` in GOLD
    pub fn exchange_rate(&self, currency: Currency) -> Decimal {
        self.inner.state.lock().rates.rate(currency)
    }

    /// GOLD supply cap
    pub fn max_gold_supply(&self) -> Decimal {
        self.inner.state.lock().params.max_gold_supply
    }

    /// GOLD held across all accounts
    pub fn circulating_gold_supply(&self) -> Decimal {
        self.inner.state.lock().circulating_gold_supply()
    }

    /// Inflation rate computed on the last tick
    pub fn gold_inflation_rate(&self) -> Decimal {
        self.inner.state.lock().params.current_inflation_rate
    }

    /// Overview for operators
    pub fn summary(&self) -> EconomySummary {
        let state = self.inner.state.lock();
        EconomySummary {
            max_gold_supply: state.params.max_gold_supply,
            circulating_gold_supply: state.circulating_gold_supply(),
            gold_inflation_rate: state.params.current_inflation_rate,
            exchange_rates: state.rates.non_reserve_rates(),
            account_count: state.ledger.account_count(),
        }
    }

    // Persistence & operations

    /// Persisted form of the current state
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.lock().snapshot()
    }

    /// Replace the whole state with `snapshot`
    pub async fn restore(&self, snapshot: Snapshot) -> Result<()> {
        let restored = EconomyState::restore(snapshot)?;
        {
            let mut state = self.inner.state.lock();
            state.replace_with(restored);
            self.inner.metrics.update_economy(
                state.circulating_gold_supply(),
                state.params.current_inflation_rate,
            );
        }
        tracing::info!("Economy state restored from snapshot");
        self.inner.persist().await;
        Ok(())
    }

    /// Run an inflation tick immediately
    pub fn recalibrate_now(&self) -> InflationReport {
        self.inner.run_inflation_tick()
    }

    /// Save now and wait for the outcome
    pub async fn flush(&self) -> Result<()> {
        self.inner.persister.flush().await
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Stop the inflation task, save, and stop the writer
    pub async fn shutdown(&self) -> Result<()> {
        let task = self.inner.inflation.lock().take();
        if let Some(task) = task {
            task.stop().await;
        }

        self.inner.persister.shutdown().await?;
        tracing::info!("Economy shut down");
        Ok(())
    }
}

impl Inner {
    /// Run one transaction inside the state lock and record the outcome
    fn apply<T>(
        &self,
        kind: &'static str,
        op: impl FnOnce(&mut TransactionProcessor<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        let result = op(&mut TransactionProcessor::new(&mut state, self.presence.as_ref()));

        match &result {
            Ok(_) => {
                self.metrics.record_transaction(kind);
                self.metrics.update_economy(
                    state.circulating_gold_supply(),
                    state.params.current_inflation_rate,
                );
            }
            Err(e) => {
                self.metrics.record_rejection(kind, e.reason());
                match e {
                    Error::SupplyCapExceeded { .. } | Error::AccountUnavailable(_) => {
                        tracing::warn!(kind, error = %e, "Transaction rejected")
                    }
                    e if e.is_user_error() => tracing::debug!(kind, error = %e, "Transaction rejected"),
                    e => tracing::error!(kind, error = %e, "Transaction failed"),
                }
            }
        }

        result
    }

    /// Hand the new state to the writer
    async fn persist(&self) {
        if self.batching {
            self.persister.mark_dirty();
        } else if let Err(e) = self.persister.flush().await {
            // Mutation stands; the writer keeps retrying
            tracing::warn!(error = %e, "Change applied but not yet persisted");
        }
    }

    fn run_inflation_tick(&self) -> InflationReport {
        let report = {
            let mut state = self.state.lock();
            InflationController::recalibrate(&mut state)
        };

        self.metrics.record_inflation_tick();
        self.metrics
            .update_economy(report.circulating_gold_supply, report.inflation_rate);
        self.persister.mark_dirty();

        report
    }
}
