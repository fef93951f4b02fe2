//! Core types for the economy
//!
//! All money values are `Decimal`:
//! - Exact arithmetic (no binary float drift in balances)
//! - Deterministic serialization (bincode, JSON)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account identifier (player UUID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Wrap an existing UUID
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Random identifier (tests, tooling)
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency tier. GOLD is the reserve currency every rate is quoted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Lowest tier
    Bronze,
    /// Second tier
    Copper,
    /// Third tier
    Silver,
    /// Reserve currency
    Gold,
}

impl Currency {
    /// All tiers, lowest first
    pub const ALL: [Currency; 4] = [
        Currency::Bronze,
        Currency::Copper,
        Currency::Silver,
        Currency::Gold,
    ];

    /// Tiers that carry a floating rate against GOLD
    pub const NON_RESERVE: [Currency; 3] = [Currency::Bronze, Currency::Copper, Currency::Silver];

    /// Upper-case name as used in commands and persisted data
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Bronze => "BRONZE",
            Currency::Copper => "COPPER",
            Currency::Silver => "SILVER",
            Currency::Gold => "GOLD",
        }
    }

    /// True for GOLD
    pub fn is_reserve(&self) -> bool {
        matches!(self, Currency::Gold)
    }

    /// Rate to GOLD used before any recalibration
    pub fn default_rate(&self) -> Decimal {
        match self {
            Currency::Bronze => Decimal::new(1, 3),
            Currency::Copper => Decimal::new(1, 2),
            Currency::Silver => Decimal::new(1, 1),
            Currency::Gold => Decimal::ONE,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Currency::Bronze => 0,
            Currency::Copper => 1,
            Currency::Silver => 2,
            Currency::Gold => 3,
        }
    }
}

impl FromStr for Currency {
    type Err = crate::Error;

    /// Case-insensitive parse; anything outside the four tiers is `UnknownCurrency`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BRONZE" => Ok(Currency::Bronze),
            "COPPER" => Ok(Currency::Copper),
            "SILVER" => Ok(Currency::Silver),
            "GOLD" => Ok(Currency::Gold),
            _ => Err(crate::Error::UnknownCurrency(s.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Decimal places an amount may carry.
///
/// Balances stay well inside `Decimal`'s 28 significant digits, so balance
/// additions are exact.
pub const AMOUNT_DP: u32 = 8;

/// Per-currency balances of one account (or per-currency totals of the ledger)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balances([Decimal; 4]);

impl Balances {
    /// Amount held in `currency`
    pub fn get(&self, currency: Currency) -> Decimal {
        self.0[currency.index()]
    }

    pub(crate) fn set(&mut self, currency: Currency, amount: Decimal) {
        self.0[currency.index()] = amount;
    }

    /// Iterate `(currency, amount)` in tier order
    pub fn iter(&self) -> impl Iterator<Item = (Currency, Decimal)> + '_ {
        Currency::ALL.iter().map(move |c| (*c, self.get(*c)))
    }

    /// True when every currency is zero
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|amount| amount.is_zero())
    }
}

/// Outcome of a successful transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Paying account
    pub from: AccountId,
    /// Receiving account
    pub to: AccountId,
    /// Currency moved
    pub currency: Currency,
    /// Amount moved
    pub amount: Decimal,
    /// Sender balance after the transfer
    pub sender_balance: Decimal,
    /// Recipient balance after the transfer
    pub recipient_balance: Decimal,
}

/// Outcome of a successful currency exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    /// Account that exchanged
    pub account: AccountId,
    /// Currency given up
    pub from_currency: Currency,
    /// Currency received
    pub to_currency: Currency,
    /// Amount debited in `from_currency`
    pub debited: Decimal,
    /// Amount credited in `to_currency`
    pub credited: Decimal,
    /// Balance of `from_currency` afterwards
    pub from_balance: Decimal,
    /// Balance of `to_currency` afterwards
    pub to_balance: Decimal,
}

/// Read-only overview of the economy (operator "info" view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomySummary {
    /// GOLD supply cap
    pub max_gold_supply: Decimal,
    /// GOLD currently held across all accounts
    pub circulating_gold_supply: Decimal,
    /// Inflation rate computed on the last tick
    pub gold_inflation_rate: Decimal,
    /// Current rate to GOLD of each non-reserve currency
    pub exchange_rates: Vec<(Currency, Decimal)>,
    /// Number of known accounts
    pub account_count: usize,
}
