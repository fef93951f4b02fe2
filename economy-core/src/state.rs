//! Engine state and its persisted form
//!
//! `EconomyState` is the one mutable aggregate (ledger, rates, parameters)
//! guarded by the engine lock. `Snapshot` is what the persistence gateway
//! stores and hands back on startup.

use crate::{
    config::EconomyConfig,
    error::{Error, Result},
    ledger::Ledger,
    rates::ExchangeRateModel,
    types::{AccountId, Balances, Currency},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Process-wide economy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyParameters {
    /// Cap on circulating GOLD
    pub max_gold_supply: Decimal,

    /// Baseline of the inflation controller (per tick)
    pub starting_inflation_rate: Decimal,

    /// Persisted for operators; not consulted by the controller
    pub target_inflation_rate: Decimal,

    /// Persisted for operators; not consulted by the controller
    pub inflation_curve_factor: Decimal,

    /// Rate computed on the last tick
    pub current_inflation_rate: Decimal,

    /// Legacy multiplier carried through persistence unchanged
    pub inflation_factor: Decimal,
}

impl Default for EconomyParameters {
    fn default() -> Self {
        EconomyParameters::from(&EconomyConfig::default())
    }
}

impl From<&EconomyConfig> for EconomyParameters {
    fn from(config: &EconomyConfig) -> Self {
        Self {
            max_gold_supply: config.max_gold_supply,
            starting_inflation_rate: config.starting_inflation_rate,
            target_inflation_rate: config.target_inflation_rate,
            inflation_curve_factor: config.inflation_curve_factor,
            current_inflation_rate: config.starting_inflation_rate,
            inflation_factor: Decimal::ONE,
        }
    }
}

/// Persisted economy state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Economy parameters
    pub parameters: EconomyParameters,

    /// Rate to GOLD per currency, rounded to 4 decimal places
    pub exchange_rates: BTreeMap<Currency, Decimal>,

    /// Balances per account per currency
    pub accounts: BTreeMap<AccountId, BTreeMap<Currency, Decimal>>,
}

/// Ledger + rates + parameters
#[derive(Debug, Clone, Default)]
pub struct EconomyState {
    pub(crate) ledger: Ledger,
    pub(crate) rates: ExchangeRateModel,
    pub(crate) params: EconomyParameters,
    version: u64,
}

impl EconomyState {
    /// Fresh economy: no accounts, default rates
    pub fn new(params: EconomyParameters) -> Self {
        Self {
            ledger: Ledger::new(),
            rates: ExchangeRateModel::new(),
            params,
            version: 0,
        }
    }

    /// Balance ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Exchange rates
    pub fn rates(&self) -> &ExchangeRateModel {
        &self.rates
    }

    /// Economy parameters
    pub fn params(&self) -> &EconomyParameters {
        &self.params
    }

    /// Monotonic counter bumped on every change worth persisting
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Swap in `other` wholesale; the version keeps increasing.
    pub(crate) fn replace_with(&mut self, other: EconomyState) {
        let version = self.version.max(other.version) + 1;
        *self = other;
        self.version = version;
    }

    /// Circulating GOLD (running total)
    pub fn circulating_gold_supply(&self) -> Decimal {
        self.ledger.circulating_supply(Currency::Gold)
    }

    /// Capture the persisted form of the current state
    pub fn snapshot(&self) -> Snapshot {
        let accounts = self
            .ledger
            .accounts()
            .map(|(id, balances)| (*id, balances.iter().collect()))
            .collect();

        Snapshot {
            parameters: self.params.clone(),
            exchange_rates: self.rates.persisted_rates(),
            accounts,
        }
    }

    /// Rebuild state from a snapshot
    pub fn restore(snapshot: Snapshot) -> Result<Self> {
        let params = snapshot.parameters;
        if params.max_gold_supply <= Decimal::ZERO {
            return Err(Error::InvalidSnapshot(format!(
                "max gold supply must be positive, got {}",
                params.max_gold_supply
            )));
        }

        let mut rates = ExchangeRateModel::new();
        for currency in Currency::NON_RESERVE {
            match snapshot.exchange_rates.get(&currency) {
                Some(rate) if *rate > Decimal::ZERO => rates.set_rate(currency, *rate)?,
                Some(rate) => {
                    tracing::warn!(
                        currency = %currency,
                        rate = %rate,
                        "Persisted rate is not positive, falling back to default"
                    );
                }
                None => {
                    tracing::debug!(currency = %currency, "No persisted rate, using default");
                }
            }
        }

        let ledger = Ledger::from_accounts(snapshot.accounts.into_iter().map(|(id, amounts)| {
            let mut balances = Balances::default();
            for (currency, amount) in amounts {
                balances.set(currency, amount);
            }
            (id, balances)
        }))?;

        let circulating = ledger.circulating_supply(Currency::Gold);
        if circulating > params.max_gold_supply {
            tracing::warn!(
                circulating = %circulating,
                cap = %params.max_gold_supply,
                "Restored gold supply exceeds the cap; gold credits will be refused"
            );
        }

        Ok(Self {
            ledger,
            rates,
            params,
            version: 0,
        })
    }
}
