//! Balance ledger
//!
//! Single source of truth for account balances. Per-currency circulating
//! totals are maintained incrementally so the GOLD cap check never scans
//! every account.
//!
//! # Invariants
//!
//! - Every stored balance is >= 0
//! - `totals[c]` == Σ balance(·, c) for every currency
//! - A GOLD-increasing mutation never leaves circulating GOLD above the cap
//! - A multi-leg mutation is applied entirely or not at all

use crate::{
    error::{Error, Result},
    types::{AccountId, Balances, Currency},
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One leg of a ledger mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Account to adjust
    pub account: AccountId,
    /// Currency to adjust
    pub currency: Currency,
    /// Signed change
    pub delta: Decimal,
}

impl BalanceDelta {
    /// Positive leg
    pub fn credit(account: AccountId, currency: Currency, amount: Decimal) -> Self {
        Self {
            account,
            currency,
            delta: amount,
        }
    }

    /// Negative leg
    pub fn debit(account: AccountId, currency: Currency, amount: Decimal) -> Self {
        Self {
            account,
            currency,
            delta: -amount,
        }
    }
}

/// Multi-currency balance store
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    accounts: HashMap<AccountId, Balances>,
    totals: Balances,
}

impl Ledger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted balances, recomputing the running totals.
    pub fn from_accounts(accounts: impl IntoIterator<Item = (AccountId, Balances)>) -> Result<Self> {
        let mut ledger = Ledger::new();

        for (account, balances) in accounts {
            for (currency, amount) in balances.iter() {
                if amount < Decimal::ZERO {
                    return Err(Error::InvalidSnapshot(format!(
                        "negative {} balance {} for account {}",
                        currency, amount, account
                    )));
                }
                let total = exact_add(ledger.totals.get(currency), amount)
                    .ok_or_else(|| overflow(currency))?;
                ledger.totals.set(currency, total);
            }
            ledger.accounts.insert(account, balances);
        }

        Ok(ledger)
    }

    /// Balance of `account` in `currency`; zero when either is unseen.
    pub fn balance(&self, account: &AccountId, currency: Currency) -> Decimal {
        self.accounts
            .get(account)
            .map(|b| b.get(currency))
            .unwrap_or(Decimal::ZERO)
    }

    /// All balances of `account`; zeros when unseen.
    pub fn balances(&self, account: &AccountId) -> Balances {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    /// Materialize an empty record for `account` if none exists (idempotent).
    ///
    /// Returns true when a record was created.
    pub fn open_account(&mut self, account: AccountId) -> bool {
        if self.accounts.contains_key(&account) {
            return false;
        }
        self.accounts.insert(account, Balances::default());
        true
    }

    /// True if `account` has a record
    pub fn contains(&self, account: &AccountId) -> bool {
        self.accounts.contains_key(account)
    }

    /// Number of account records
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Iterate over every account record
    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Balances)> {
        self.accounts.iter()
    }

    /// Sum of `currency` across all accounts (running total)
    pub fn circulating_supply(&self, currency: Currency) -> Decimal {
        self.totals.get(currency)
    }

    /// Sum of `currency` recomputed by scanning every account.
    ///
    /// Diagnostics and tests only; cross-checks the running total.
    pub fn recompute_supply(&self, currency: Currency) -> Decimal {
        self.accounts.values().map(|b| b.get(currency)).sum()
    }

    /// Apply a single signed delta. Returns the new balance.
    pub fn apply_delta(
        &mut self,
        account: AccountId,
        currency: Currency,
        delta: Decimal,
        max_gold_supply: Decimal,
    ) -> Result<Decimal> {
        let applied = self.apply_deltas(
            &[BalanceDelta {
                account,
                currency,
                delta,
            }],
            max_gold_supply,
        )?;
        Ok(applied[0])
    }

    /// Apply every leg or none of them.
    ///
    /// Legs are staged against a scratch copy of the touched accounts; the
    /// GOLD cap is checked against the post-mutation aggregate. Returns the
    /// new balance of each leg, in order.
    pub fn apply_deltas(
        &mut self,
        deltas: &[BalanceDelta],
        max_gold_supply: Decimal,
    ) -> Result<Vec<Decimal>> {
        let mut staged: HashMap<AccountId, Balances> = HashMap::with_capacity(deltas.len());
        let mut totals = self.totals;

        for leg in deltas {
            let balances = staged
                .entry(leg.account)
                .or_insert_with(|| self.accounts.get(&leg.account).copied().unwrap_or_default());

            let current = balances.get(leg.currency);
            let next = exact_add(current, leg.delta).ok_or_else(|| overflow(leg.currency))?;

            if next < Decimal::ZERO {
                return Err(Error::InsufficientFunds {
                    account: leg.account,
                    currency: leg.currency,
                    available: current,
                    requested: -leg.delta,
                });
            }
            balances.set(leg.currency, next);

            let total = exact_add(totals.get(leg.currency), leg.delta)
                .ok_or_else(|| overflow(leg.currency))?;
            totals.set(leg.currency, total);
        }

        let circulating = self.totals.get(Currency::Gold);
        let gold_added = totals.get(Currency::Gold) - circulating;
        if gold_added > Decimal::ZERO && totals.get(Currency::Gold) > max_gold_supply {
            return Err(Error::SupplyCapExceeded {
                circulating,
                requested: gold_added,
                cap: max_gold_supply,
            });
        }

        // Commit
        let new_balances = deltas
            .iter()
            .map(|leg| staged[&leg.account].get(leg.currency))
            .collect();
        self.accounts.extend(staged);
        self.totals = totals;

        Ok(new_balances)
    }
}

/// `a + b`, or `None` when `Decimal` would have to round the sum
fn exact_add(a: Decimal, b: Decimal) -> Option<Decimal> {
    let sum = a.checked_add(b)?;
    if a.is_zero() || b.is_zero() {
        return Some(sum);
    }
    // An inexact sum comes back with its scale reduced
    (sum.scale() >= a.scale().max(b.scale())).then_some(sum)
}

fn overflow(currency: Currency) -> Error {
    Error::ArithmeticOverflow(format!("{} balance out of range", currency))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap() -> Decimal {
        Decimal::from(1_000)
    }

    #[test]
    fn test_unseen_balance_is_zero() {
        let ledger = Ledger::new();
        let account = AccountId::random();
        for currency in Currency::ALL {
            assert_eq!(ledger.balance(&account, currency), Decimal::ZERO);
        }
        assert!(!ledger.contains(&account));
    }

    #[test]
    fn test_open_account_is_idempotent() {
        let mut ledger = Ledger::new();
        let account = AccountId::random();
        assert!(ledger.open_account(account));
        assert!(!ledger.open_account(account));
        assert_eq!(ledger.account_count(), 1);
        assert!(ledger.balances(&account).is_empty());
    }

    #[test]
    fn test_apply_delta_credit_and_debit() {
        let mut ledger = Ledger::new();
        let account = AccountId::random();

        let balance = ledger
            .apply_delta(account, Currency::Copper, Decimal::from(50), cap())
            .unwrap();
        assert_eq!(balance, Decimal::from(50));

        let balance = ledger
            .apply_delta(account, Currency::Copper, Decimal::from(-20), cap())
            .unwrap();
        assert_eq!(balance, Decimal::from(30));
        assert_eq!(ledger.circulating_supply(Currency::Copper), Decimal::from(30));
    }

    #[test]
    fn test_debit_below_zero_rejected() {
        let mut ledger = Ledger::new();
        let account = AccountId::random();
        ledger
            .apply_delta(account, Currency::Silver, Decimal::from(5), cap())
            .unwrap();

        let err = ledger
            .apply_delta(account, Currency::Silver, Decimal::from(-6), cap())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds { available, requested, .. }
                if available == Decimal::from(5) && requested == Decimal::from(6)
        ));
        assert_eq!(ledger.balance(&account, Currency::Silver), Decimal::from(5));
    }

    #[test]
    fn test_gold_cap_uses_aggregate_supply() {
        let mut ledger = Ledger::new();
        let alice = AccountId::random();
        let bob = AccountId::random();

        ledger
            .apply_delta(alice, Currency::Gold, Decimal::from(950), cap())
            .unwrap();

        // Bob holds nothing, but the aggregate would reach 1050
        let err = ledger
            .apply_delta(bob, Currency::Gold, Decimal::from(100), cap())
            .unwrap_err();
        assert!(matches!(err, Error::SupplyCapExceeded { .. }));
        assert_eq!(ledger.balance(&bob, Currency::Gold), Decimal::ZERO);
        assert_eq!(ledger.circulating_supply(Currency::Gold), Decimal::from(950));

        // Exactly reaching the cap is allowed
        ledger
            .apply_delta(bob, Currency::Gold, Decimal::from(50), cap())
            .unwrap();
        assert_eq!(ledger.circulating_supply(Currency::Gold), cap());
    }

    #[test]
    fn test_cap_does_not_apply_to_other_currencies() {
        let mut ledger = Ledger::new();
        let account = AccountId::random();
        ledger
            .apply_delta(account, Currency::Bronze, Decimal::from(5_000), cap())
            .unwrap();
        assert_eq!(ledger.balance(&account, Currency::Bronze), Decimal::from(5_000));
    }

    #[test]
    fn test_multi_leg_is_all_or_nothing() {
        let mut ledger = Ledger::new();
        let alice = AccountId::random();
        let bob = AccountId::random();
        ledger
            .apply_delta(alice, Currency::Copper, Decimal::from(10), cap())
            .unwrap();

        // Credit leg first, failing debit second: nothing may stick
        let err = ledger
            .apply_deltas(
                &[
                    BalanceDelta::credit(bob, Currency::Copper, Decimal::from(20)),
                    BalanceDelta::debit(alice, Currency::Copper, Decimal::from(20)),
                ],
                cap(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(&alice, Currency::Copper), Decimal::from(10));
        assert_eq!(ledger.balance(&bob, Currency::Copper), Decimal::ZERO);
        assert!(!ledger.contains(&bob));
        assert_eq!(ledger.circulating_supply(Currency::Copper), Decimal::from(10));
    }

    #[test]
    fn test_running_total_matches_scan() {
        let mut ledger = Ledger::new();
        let accounts: Vec<_> = (0..5).map(|_| AccountId::random()).collect();
        for (i, account) in accounts.iter().enumerate() {
            ledger
                .apply_delta(*account, Currency::Gold, Decimal::from(i as i64 * 10 + 1), cap())
                .unwrap();
        }
        ledger
            .apply_deltas(
                &[
                    BalanceDelta::debit(accounts[4], Currency::Gold, Decimal::from(7)),
                    BalanceDelta::credit(accounts[0], Currency::Gold, Decimal::from(7)),
                ],
                cap(),
            )
            .unwrap();

        assert_eq!(
            ledger.circulating_supply(Currency::Gold),
            ledger.recompute_supply(Currency::Gold)
        );
    }

    #[test]
    fn test_inexact_sum_rejected() {
        let mut ledger = Ledger::new();
        let account = AccountId::random();
        let big = Decimal::from_str_exact("1000000000000000000000").unwrap();
        ledger
            .apply_delta(account, Currency::Copper, big, cap())
            .unwrap();

        // 1e21 + 1e-8 needs 30 significant digits
        let err = ledger
            .apply_delta(account, Currency::Copper, Decimal::new(1, 8), cap())
            .unwrap_err();
        assert!(matches!(err, Error::ArithmeticOverflow(_)));
        assert_eq!(ledger.balance(&account, Currency::Copper), big);
        assert_eq!(ledger.circulating_supply(Currency::Copper), big);
    }

    #[test]
    fn test_zero_balance_accepts_coarser_amount() {
        let mut ledger = Ledger::new();
        let account = AccountId::random();
        ledger
            .apply_delta(account, Currency::Silver, Decimal::new(150, 8), cap())
            .unwrap();
        ledger
            .apply_delta(account, Currency::Silver, Decimal::new(-150, 8), cap())
            .unwrap();
        assert_eq!(
            ledger
                .apply_delta(account, Currency::Silver, Decimal::from(5), cap())
                .unwrap(),
            Decimal::from(5)
        );
    }

    #[test]
    fn test_from_accounts_rejects_negative_balance() {
        let mut balances = Balances::default();
        balances.set(Currency::Silver, Decimal::from(-1));
        let err = Ledger::from_accounts(vec![(AccountId::random(), balances)]).unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }

    #[test]
    fn test_from_accounts_computes_totals() {
        let mut a = Balances::default();
        a.set(Currency::Gold, Decimal::from(3));
        let mut b = Balances::default();
        b.set(Currency::Gold, Decimal::from(4));

        let ledger =
            Ledger::from_accounts(vec![(AccountId::random(), a), (AccountId::random(), b)]).unwrap();
        assert_eq!(ledger.circulating_supply(Currency::Gold), Decimal::from(7));
        assert_eq!(ledger.account_count(), 2);
    }
}
