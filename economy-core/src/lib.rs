//! Economy Core
//!
//! In-game virtual economy: four-currency balance ledger, GOLD-denominated
//! exchange rates and a supply-driven inflation loop.
//!
//! # Architecture
//!
//! - **Single Lock**: ledger, rates and parameters live in one `EconomyState`
//!   behind one mutex; transactions and inflation ticks are serialized
//! - **All-or-Nothing**: multi-leg transactions stage every delta before
//!   committing any
//! - **Single Writer**: one task owns the snapshot store; I/O never runs
//!   under the state lock
//! - **Decimal Money**: `rust_decimal`, never floats
//!
//! # Invariants
//!
//! - No balance is ever negative
//! - Circulating GOLD never exceeds the cap through a GOLD credit
//! - Transfers conserve per-currency supply
//! - GOLD's exchange rate is always exactly 1

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod error;
pub mod config;
pub mod ledger;
pub mod rates;
pub mod state;
pub mod inflation;
pub mod presence;
pub mod processor;
pub mod storage;
pub mod actor;
pub mod metrics;
pub mod economy;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    AccountId, Balances, Currency, EconomySummary, ExchangeReceipt, TransferReceipt,
};
pub use config::Config;
pub use ledger::Ledger;
pub use rates::ExchangeRateModel;
pub use state::{EconomyParameters, EconomyState, Snapshot};
pub use inflation::{InflationController, InflationReport};
pub use presence::{AlwaysActive, OnlineRoster, Presence};
pub use processor::TransactionProcessor;
pub use storage::{MemoryStore, RocksStore, SnapshotStore};
pub use economy::Economy;
