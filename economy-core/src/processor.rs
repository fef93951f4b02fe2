//! Transaction processing
//!
//! Validates and applies credit, transfer and exchange against an
//! `EconomyState`. Every operation is checked in full before the ledger is
//! touched, and multi-leg operations go through `Ledger::apply_deltas`, so a
//! rejected operation leaves no trace.
//!
//! The processor is synchronous and lock-free by itself; the engine runs it
//! inside its state lock.

use crate::{
    error::{Error, Result},
    ledger::BalanceDelta,
    presence::Presence,
    state::EconomyState,
    types::{AccountId, Currency, ExchangeReceipt, TransferReceipt, AMOUNT_DP},
};
use rust_decimal::Decimal;

/// Applies transactions to one borrowed state
pub struct TransactionProcessor<'a> {
    state: &'a mut EconomyState,
    presence: &'a dyn Presence,
}

impl std::fmt::Debug for TransactionProcessor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionProcessor")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> TransactionProcessor<'a> {
    /// Processor over `state`, using `presence` for reachability checks
    pub fn new(state: &'a mut EconomyState, presence: &'a dyn Presence) -> Self {
        Self { state, presence }
    }

    /// Add `amount` of `currency` to `account`. Returns the new balance.
    pub fn credit(&mut self, account: AccountId, currency: Currency, amount: Decimal) -> Result<Decimal> {
        validate_amount(amount)?;

        if !self.presence.is_active(&account) {
            return Err(Error::AccountUnavailable(account));
        }

        let cap = self.state.params.max_gold_supply;
        let balance = self.state.ledger.apply_delta(account, currency, amount, cap)?;
        self.state.bump_version();

        tracing::debug!(
            account = %account,
            currency = %currency,
            amount = %amount,
            balance = %balance,
            "Credit applied"
        );

        Ok(balance)
    }

    /// Move `amount` of `currency` from `from` to `to`
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        validate_amount(amount)?;

        if from == to {
            return Err(Error::SelfTransferDenied(from));
        }

        if !self.presence.is_active(&to) {
            return Err(Error::AccountUnavailable(to));
        }

        let available = self.state.ledger.balance(&from, currency);
        if available < amount {
            return Err(Error::InsufficientFunds {
                account: from,
                currency,
                available,
                requested: amount,
            });
        }

        let cap = self.state.params.max_gold_supply;
        let balances = self.state.ledger.apply_deltas(
            &[
                BalanceDelta::debit(from, currency, amount),
                BalanceDelta::credit(to, currency, amount),
            ],
            cap,
        )?;
        self.state.bump_version();

        tracing::debug!(
            from = %from,
            to = %to,
            currency = %currency,
            amount = %amount,
            "Transfer applied"
        );

        Ok(TransferReceipt {
            from,
            to,
            currency,
            amount,
            sender_balance: balances[0],
            recipient_balance: balances[1],
        })
    }

    /// Convert `amount` of `from_currency` into `to_currency` at current rates
    pub fn exchange(
        &mut self,
        account: AccountId,
        from_currency: Currency,
        to_currency: Currency,
        amount: Decimal,
    ) -> Result<ExchangeReceipt> {
        // Identity conversion would silently succeed, so reject it up front
        if from_currency == to_currency {
            return Err(Error::SameCurrencyExchange(from_currency));
        }

        validate_amount(amount)?;

        let available = self.state.ledger.balance(&account, from_currency);
        if available < amount {
            return Err(Error::InsufficientFunds {
                account,
                currency: from_currency,
                available,
                requested: amount,
            });
        }

        let credited = self.state.rates.convert(amount, from_currency, to_currency)?;
        if credited <= Decimal::ZERO {
            // Too small to be worth anything in the target currency
            return Err(Error::InvalidAmount(amount));
        }

        let cap = self.state.params.max_gold_supply;
        let balances = self.state.ledger.apply_deltas(
            &[
                BalanceDelta::debit(account, from_currency, amount),
                BalanceDelta::credit(account, to_currency, credited),
            ],
            cap,
        )?;
        self.state.bump_version();

        tracing::debug!(
            account = %account,
            from = %from_currency,
            to = %to_currency,
            debited = %amount,
            credited = %credited,
            "Exchange applied"
        );

        Ok(ExchangeReceipt {
            account,
            from_currency,
            to_currency,
            debited: amount,
            credited,
            from_balance: balances[0],
            to_balance: balances[1],
        })
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO || amount.normalize().scale() > AMOUNT_DP {
        return Err(Error::InvalidAmount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::{AlwaysActive, OnlineRoster};
    use crate::state::EconomyParameters;

    fn state_with_cap(cap: i64) -> EconomyState {
        let mut params = EconomyParameters::default();
        params.max_gold_supply = Decimal::from(cap);
        EconomyState::new(params)
    }

    #[test]
    fn test_credit_gold() {
        let mut state = EconomyState::default();
        let p1 = AccountId::random();

        let balance = TransactionProcessor::new(&mut state, &AlwaysActive)
            .credit(p1, Currency::Gold, Decimal::from(100))
            .unwrap();

        assert_eq!(balance, Decimal::from(100));
        assert_eq!(state.ledger().balance(&p1, Currency::Gold), Decimal::new(1000, 1));
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn test_credit_rejects_non_positive() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();

        assert!(matches!(
            processor.credit(p1, Currency::Gold, Decimal::ZERO),
            Err(Error::InvalidAmount(_))
        ));
        assert!(matches!(
            processor.credit(p1, Currency::Gold, Decimal::from(-3)),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_scale_is_limited() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();

        assert!(matches!(
            processor.credit(p1, Currency::Gold, Decimal::new(1, 9)),
            Err(Error::InvalidAmount(_))
        ));
        // Trailing zeros do not count
        processor
            .credit(p1, Currency::Gold, Decimal::new(1_000_000_000, 9))
            .unwrap();
        processor.credit(p1, Currency::Gold, Decimal::new(1, 8)).unwrap();
        assert_eq!(state.ledger().balance(&p1, Currency::Gold), Decimal::new(100000001, 8));
    }

    #[test]
    fn test_exchange_to_nothing_rejected() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();
        processor.credit(p1, Currency::Bronze, Decimal::ONE).unwrap();

        // 1e-8 bronze = 1e-11 gold, truncated to zero
        let err = processor
            .exchange(p1, Currency::Bronze, Currency::Gold, Decimal::new(1, 8))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!(state.ledger().balance(&p1, Currency::Bronze), Decimal::ONE);
    }

    #[test]
    fn test_transfer_round_trip_after_recalibration() {
        let mut state = EconomyState::default();
        crate::inflation::InflationController::recalibrate(&mut state);
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let a = AccountId::random();
        let b = AccountId::random();

        processor.credit(a, Currency::Silver, Decimal::from(100)).unwrap();
        processor.credit(b, Currency::Bronze, Decimal::ONE).unwrap();
        processor
            .exchange(b, Currency::Bronze, Currency::Silver, Decimal::ONE)
            .unwrap();
        let before = state.ledger().balance(&b, Currency::Silver);
        assert!(before.scale() <= AMOUNT_DP);

        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        processor.transfer(a, b, Currency::Silver, Decimal::from(100)).unwrap();
        processor.transfer(b, a, Currency::Silver, Decimal::from(100)).unwrap();

        assert_eq!(state.ledger().balance(&b, Currency::Silver), before);
        assert_eq!(state.ledger().balance(&a, Currency::Silver), Decimal::from(100));
        assert_eq!(
            state.ledger().circulating_supply(Currency::Silver),
            state.ledger().recompute_supply(Currency::Silver)
        );
    }

    #[test]
    fn test_credit_over_cap_leaves_balances_unchanged() {
        let mut state = state_with_cap(1_000);
        let p1 = AccountId::random();
        let p2 = AccountId::random();

        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        processor.credit(p2, Currency::Gold, Decimal::from(900)).unwrap();
        processor.credit(p1, Currency::Gold, Decimal::from(50)).unwrap();

        // Circulating 950, cap 1000
        let err = processor
            .credit(p1, Currency::Gold, Decimal::from(100))
            .unwrap_err();
        assert!(matches!(err, Error::SupplyCapExceeded { .. }));

        assert_eq!(state.ledger().balance(&p1, Currency::Gold), Decimal::from(50));
        assert_eq!(state.circulating_gold_supply(), Decimal::from(950));
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn test_credit_requires_active_account() {
        let mut state = EconomyState::default();
        let roster = OnlineRoster::new();
        let p1 = AccountId::random();

        let err = TransactionProcessor::new(&mut state, &roster)
            .credit(p1, Currency::Copper, Decimal::from(5))
            .unwrap_err();
        assert!(matches!(err, Error::AccountUnavailable(id) if id == p1));
        assert!(!state.ledger().contains(&p1));

        roster.connect(p1);
        TransactionProcessor::new(&mut state, &roster)
            .credit(p1, Currency::Copper, Decimal::from(5))
            .unwrap();
    }

    #[test]
    fn test_transfer_moves_funds() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();
        let p2 = AccountId::random();
        processor.credit(p1, Currency::Silver, Decimal::from(30)).unwrap();

        let receipt = processor
            .transfer(p1, p2, Currency::Silver, Decimal::from(12))
            .unwrap();
        assert_eq!(receipt.sender_balance, Decimal::from(18));
        assert_eq!(receipt.recipient_balance, Decimal::from(12));
        assert_eq!(state.ledger().circulating_supply(Currency::Silver), Decimal::from(30));
    }

    #[test]
    fn test_self_transfer_denied() {
        let mut state = EconomyState::default();
        let p1 = AccountId::random();

        // Denied even without funds
        let err = TransactionProcessor::new(&mut state, &AlwaysActive)
            .transfer(p1, p1, Currency::Gold, Decimal::from(5))
            .unwrap_err();
        assert!(matches!(err, Error::SelfTransferDenied(_)));
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();
        let p2 = AccountId::random();
        processor.credit(p1, Currency::Gold, Decimal::from(4)).unwrap();

        let err = processor
            .transfer(p1, p2, Currency::Gold, Decimal::from(5))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(state.ledger().balance(&p1, Currency::Gold), Decimal::from(4));
        assert_eq!(state.ledger().balance(&p2, Currency::Gold), Decimal::ZERO);
    }

    #[test]
    fn test_transfer_to_offline_recipient() {
        let mut state = EconomyState::default();
        let roster = OnlineRoster::new();
        let p1 = AccountId::random();
        let p2 = AccountId::random();
        roster.connect(p1);

        let mut processor = TransactionProcessor::new(&mut state, &roster);
        processor.credit(p1, Currency::Gold, Decimal::from(10)).unwrap();
        let err = processor
            .transfer(p1, p2, Currency::Gold, Decimal::from(5))
            .unwrap_err();
        assert!(matches!(err, Error::AccountUnavailable(id) if id == p2));
    }

    #[test]
    fn test_transfer_round_trip_restores_balances() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let a = AccountId::random();
        let b = AccountId::random();
        processor.credit(a, Currency::Copper, Decimal::new(1005, 1)).unwrap();
        processor.credit(b, Currency::Copper, Decimal::from(3)).unwrap();

        let amount = Decimal::new(425, 1);
        processor.transfer(a, b, Currency::Copper, amount).unwrap();
        processor.transfer(b, a, Currency::Copper, amount).unwrap();

        assert_eq!(state.ledger().balance(&a, Currency::Copper), Decimal::new(1005, 1));
        assert_eq!(state.ledger().balance(&b, Currency::Copper), Decimal::from(3));
    }

    #[test]
    fn test_same_currency_exchange_rejected() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();

        let err = processor
            .exchange(p1, Currency::Bronze, Currency::Bronze, Decimal::from(10))
            .unwrap_err();
        assert!(matches!(err, Error::SameCurrencyExchange(Currency::Bronze)));

        // Regardless of balance
        processor.credit(p1, Currency::Bronze, Decimal::from(100)).unwrap();
        let err = processor
            .exchange(p1, Currency::Bronze, Currency::Bronze, Decimal::from(10))
            .unwrap_err();
        assert!(matches!(err, Error::SameCurrencyExchange(_)));
    }

    #[test]
    fn test_exchange_bronze_for_gold() {
        let mut state = EconomyState::default();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();
        processor.credit(p1, Currency::Bronze, Decimal::from(5_000)).unwrap();

        let receipt = processor
            .exchange(p1, Currency::Bronze, Currency::Gold, Decimal::from(2_000))
            .unwrap();
        assert_eq!(receipt.credited, Decimal::from(2));
        assert_eq!(receipt.from_balance, Decimal::from(3_000));
        assert_eq!(receipt.to_balance, Decimal::from(2));
        assert_eq!(state.circulating_gold_supply(), Decimal::from(2));
    }

    #[test]
    fn test_exchange_insufficient_funds() {
        let mut state = EconomyState::default();
        let p1 = AccountId::random();
        let err = TransactionProcessor::new(&mut state, &AlwaysActive)
            .exchange(p1, Currency::Silver, Currency::Gold, Decimal::from(1))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
    }

    #[test]
    fn test_exchange_into_gold_respects_cap() {
        let mut state = state_with_cap(10);
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();
        processor.credit(p1, Currency::Silver, Decimal::from(200)).unwrap();

        // 200 silver = 20 gold > cap of 10
        let err = processor
            .exchange(p1, Currency::Silver, Currency::Gold, Decimal::from(200))
            .unwrap_err();
        assert!(matches!(err, Error::SupplyCapExceeded { .. }));
        assert_eq!(state.ledger().balance(&p1, Currency::Silver), Decimal::from(200));
        assert_eq!(state.circulating_gold_supply(), Decimal::ZERO);
    }

    #[test]
    fn test_exchange_round_trip() {
        let mut state = EconomyState::default();
        state
            .rates
            .set_rate(Currency::Copper, Decimal::new(97531, 7))
            .unwrap();
        let mut processor = TransactionProcessor::new(&mut state, &AlwaysActive);
        let p1 = AccountId::random();
        processor.credit(p1, Currency::Copper, Decimal::from(777)).unwrap();

        let out = processor
            .exchange(p1, Currency::Copper, Currency::Silver, Decimal::from(333))
            .unwrap();
        processor
            .exchange(p1, Currency::Silver, Currency::Copper, out.credited)
            .unwrap();

        let diff = (state.ledger().balance(&p1, Currency::Copper) - Decimal::from(777)).abs();
        assert!(diff < Decimal::new(1, 15));
    }
}
