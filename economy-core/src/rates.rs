//! Exchange rates against the GOLD reserve
//!
//! Each non-GOLD currency carries one factor: 1 unit = `rate` GOLD.
//! Cross rates always pivot through GOLD; there is no direct from→to table.

use crate::{
    error::{Error, Result},
    types::{Currency, AMOUNT_DP},
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;

/// Decimal places kept in memory
pub const RATE_DP: u32 = 12;

/// Decimal places kept when rates are persisted
pub const PERSISTED_RATE_DP: u32 = 4;

/// Current Currency → GOLD conversion factors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRateModel {
    rates: BTreeMap<Currency, Decimal>,
}

impl ExchangeRateModel {
    /// Model with every currency at its default rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Rate of `currency` in GOLD. GOLD is always 1.
    pub fn rate(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Gold => Decimal::ONE,
            Currency::Bronze | Currency::Copper | Currency::Silver => self
                .rates
                .get(&currency)
                .copied()
                .unwrap_or_else(|| currency.default_rate()),
        }
    }

    /// Overwrite the rate of `currency`.
    ///
    /// The factor is rounded to `RATE_DP` places and must stay positive.
    /// GOLD's rate is fixed at 1, so setting it is ignored.
    pub fn set_rate(&mut self, currency: Currency, factor: Decimal) -> Result<()> {
        let factor = factor.round_dp_with_strategy(RATE_DP, RoundingStrategy::MidpointAwayFromZero);
        if factor <= Decimal::ZERO {
            return Err(Error::InvalidRate {
                currency,
                rate: factor,
            });
        }
        if currency.is_reserve() {
            tracing::warn!(rate = %factor, "Ignoring attempt to re-rate the reserve currency");
            return Ok(());
        }
        self.rates.insert(currency, factor);
        Ok(())
    }

    /// Convert `amount` of `from` into `to`: `amount * rate(from) / rate(to)`.
    ///
    /// The result is truncated to `AMOUNT_DP` places.
    pub fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Result<Decimal> {
        let in_gold = amount
            .checked_mul(self.rate(from))
            .ok_or_else(|| Error::ArithmeticOverflow(format!("{} {} in GOLD", amount, from)))?;
        let converted = in_gold
            .checked_div(self.rate(to))
            .ok_or_else(|| Error::ArithmeticOverflow(format!("{} GOLD in {}", in_gold, to)))?;
        Ok(converted.round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::ToZero))
    }

    /// Non-GOLD rates in tier order
    pub fn non_reserve_rates(&self) -> Vec<(Currency, Decimal)> {
        Currency::NON_RESERVE
            .iter()
            .map(|c| (*c, self.rate(*c)))
            .collect()
    }

    /// Every rate (GOLD included) rounded for persistence
    pub fn persisted_rates(&self) -> BTreeMap<Currency, Decimal> {
        Currency::ALL
            .iter()
            .map(|c| {
                let rounded = self
                    .rate(*c)
                    .round_dp_with_strategy(PERSISTED_RATE_DP, RoundingStrategy::MidpointAwayFromZero);
                (*c, rounded)
            })
            .collect()
    }
}
