//! Error types for the economy engine

use crate::types::{AccountId, Currency};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for economy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Economy errors
#[derive(Error, Debug)]
pub enum Error {
    /// Non-positive amount, or more decimal places than `AMOUNT_DP`
    #[error("Invalid amount: {0} (must be positive, at most 8 decimal places)")]
    InvalidAmount(Decimal),

    /// Debit would make a balance negative
    #[error("Insufficient funds: account {account} holds {available} {currency}, needs {requested}")]
    InsufficientFunds {
        /// Debited account
        account: AccountId,
        /// Debited currency
        currency: Currency,
        /// Balance before the debit
        available: Decimal,
        /// Amount requested
        requested: Decimal,
    },

    /// GOLD credit would push circulating supply over the cap
    #[error("Gold supply cap exceeded: {circulating} circulating + {requested} requested > {cap}")]
    SupplyCapExceeded {
        /// Circulating GOLD before the transaction
        circulating: Decimal,
        /// Net GOLD the transaction would add
        requested: Decimal,
        /// Configured maximum supply
        cap: Decimal,
    },

    /// Sender and recipient are the same account
    #[error("Account {0} cannot transfer to itself")]
    SelfTransferDenied(AccountId),

    /// Source and target currency are the same
    #[error("Cannot exchange {0} for itself")]
    SameCurrencyExchange(Currency),

    /// Target account is not currently reachable
    #[error("Account unavailable: {0}")]
    AccountUnavailable(AccountId),

    /// Name outside the closed currency set
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Exchange rate must be positive
    #[error("Invalid exchange rate for {currency}: {rate}")]
    InvalidRate {
        /// Currency whose rate was rejected
        currency: Currency,
        /// Rejected rate
        rate: Decimal,
    },

    /// Decimal overflow in balance or conversion arithmetic
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Persisted state failed validation
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (writer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for rejections caused by the caller's input rather than a system fault.
    ///
    /// The command layer turns these into player-facing text.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::InsufficientFunds { .. }
                | Error::SupplyCapExceeded { .. }
                | Error::SelfTransferDenied(_)
                | Error::SameCurrencyExchange(_)
                | Error::AccountUnavailable(_)
                | Error::UnknownCurrency(_)
        )
    }

    /// Stable short label (metrics, logs)
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::SupplyCapExceeded { .. } => "supply_cap_exceeded",
            Error::SelfTransferDenied(_) => "self_transfer",
            Error::SameCurrencyExchange(_) => "same_currency",
            Error::AccountUnavailable(_) => "account_unavailable",
            Error::UnknownCurrency(_) => "unknown_currency",
            Error::InvalidRate { .. } => "invalid_rate",
            Error::ArithmeticOverflow(_) => "overflow",
            Error::InvalidSnapshot(_) => "invalid_snapshot",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
