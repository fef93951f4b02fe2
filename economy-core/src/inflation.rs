//! Inflation control loop
//!
//! A proportional controller on circulating GOLD:
//!
//! ```text
//! supply_ratio   = circulating_gold / max_gold_supply
//! inflation_rate = clamp(starting_rate + (supply_ratio - 0.25) * 0.03, -0.10, 0.10)
//! rate'(c)       = rate(c) / (1 + inflation_rate)      for every non-GOLD c
//! ```
//!
//! Rates compound: each tick divides the already-adjusted rate of the
//! previous tick. Supply above the 25% target pushes the inflation rate up
//! and non-GOLD currencies lose value faster; supply below it can turn the
//! rate negative, which raises non-GOLD rates.

use crate::{state::EconomyState, types::Currency};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Share of the cap the controller steers circulating GOLD towards (0.25)
pub const TARGET_SUPPLY_RATIO: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

/// Inflation change per unit of supply-ratio deviation (0.03)
pub const SUPPLY_SENSITIVITY: Decimal = Decimal::from_parts(3, 0, 0, false, 2);

/// Lower clamp (-0.10)
pub const MIN_INFLATION_RATE: Decimal = Decimal::from_parts(10, 0, 0, true, 2);

/// Upper clamp (0.10)
pub const MAX_INFLATION_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Result of one recalibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InflationReport {
    /// Circulating GOLD the tick was computed from
    pub circulating_gold_supply: Decimal,
    /// circulating / cap
    pub supply_ratio: Decimal,
    /// New (clamped) inflation rate
    pub inflation_rate: Decimal,
    /// Non-GOLD rates after adjustment
    pub exchange_rates: Vec<(Currency, Decimal)>,
    /// When the tick ran
    pub computed_at: DateTime<Utc>,
}

/// Recomputes the inflation rate and every non-GOLD exchange rate
#[derive(Debug, Clone, Copy, Default)]
pub struct InflationController;

impl InflationController {
    /// circulating / cap
    pub fn supply_ratio(circulating: Decimal, max_gold_supply: Decimal) -> Option<Decimal> {
        circulating.checked_div(max_gold_supply)
    }

    /// Clamped inflation rate for the given ratio
    pub fn inflation_rate(starting_rate: Decimal, supply_ratio: Decimal) -> Decimal {
        (supply_ratio - TARGET_SUPPLY_RATIO)
            .checked_mul(SUPPLY_SENSITIVITY)
            .and_then(|deviation| starting_rate.checked_add(deviation))
            .map(|rate| rate.clamp(MIN_INFLATION_RATE, MAX_INFLATION_RATE))
            .unwrap_or(MAX_INFLATION_RATE)
    }

    /// Run one tick against `state`. Never fails.
    pub fn recalibrate(state: &mut EconomyState) -> InflationReport {
        let circulating = state.ledger.circulating_supply(Currency::Gold);
        let supply_ratio = Self::supply_ratio(circulating, state.params.max_gold_supply)
            .unwrap_or(Decimal::MAX);
        let inflation_rate =
            Self::inflation_rate(state.params.starting_inflation_rate, supply_ratio);

        let divisor = Decimal::ONE + inflation_rate;
        for currency in Currency::NON_RESERVE {
            let base = state.rates.rate(currency);
            let adjusted = base.checked_div(divisor).unwrap_or(base);
            if let Err(e) = state.rates.set_rate(currency, adjusted) {
                // Underflow to zero: keep the previous rate
                tracing::warn!(currency = %currency, error = %e, "Rate adjustment skipped");
            }
        }

        state.params.current_inflation_rate = inflation_rate;
        state.bump_version();

        let exchange_rates = state.rates.non_reserve_rates();
        for (currency, rate) in &exchange_rates {
            tracing::info!(currency = %currency, rate = %rate.round_dp(6), "Exchange rate to GOLD");
        }
        tracing::info!(
            circulating_gold = %circulating,
            inflation_pct = %(inflation_rate * Decimal::ONE_HUNDRED).round_dp(2),
            "Inflation recalibrated"
        );

        InflationReport {
            circulating_gold_supply: circulating,
            supply_ratio,
            inflation_rate,
            exchange_rates,
            computed_at: Utc::now(),
        }
    }
}

/// Periodic recalibration task
///
/// The first tick fires one full period after spawning. The task ends when
/// stopped or when the tick callback returns `false`.
#[derive(Debug)]
pub struct InflationTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl InflationTask {
    /// Spawn a task calling `on_tick` every `period`
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (shutdown, mut stop) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !on_tick() {
                            break;
                        }
                    }
                    _ = &mut stop => break,
                }
            }

            tracing::debug!("Inflation task stopped");
        });

        Self { shutdown, handle }
    }

    /// Stop the task and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("Inflation task panicked: {}", e);
        }
    }
}
