//! Configuration for the economy engine

use crate::inflation::{MAX_INFLATION_RATE, MIN_INFLATION_RATE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Initial economy parameters (used when nothing is persisted yet)
    pub economy: EconomyConfig,

    /// Inflation tick configuration
    pub inflation: InflationConfig,

    /// Persistence writer configuration
    pub persistence: PersistenceConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/economy"),
            service_name: "economy-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            economy: EconomyConfig::default(),
            inflation: InflationConfig::default(),
            persistence: PersistenceConfig::default(),
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// Economy parameter defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Cap on circulating GOLD
    #[serde(with = "rust_decimal::serde::float")]
    pub max_gold_supply: Decimal,

    /// Inflation baseline per tick
    #[serde(with = "rust_decimal::serde::float")]
    pub starting_inflation_rate: Decimal,

    /// Stored and persisted, not used by the controller
    #[serde(with = "rust_decimal::serde::float")]
    pub target_inflation_rate: Decimal,

    /// Stored and persisted, not used by the controller
    #[serde(with = "rust_decimal::serde::float")]
    pub inflation_curve_factor: Decimal,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            max_gold_supply: Decimal::from(1_000_000),
            starting_inflation_rate: Decimal::new(15, 4), // 0.15% per tick
            target_inflation_rate: Decimal::new(5, 3),    // 0.5% per tick
            inflation_curve_factor: Decimal::from(2),
        }
    }
}

/// Inflation tick configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InflationConfig {
    /// Run the periodic recalibration
    pub enabled: bool,

    /// Seconds between recalibrations
    pub interval_secs: u64,
}

impl Default for InflationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60 * 60, // hourly
        }
    }
}

impl InflationConfig {
    /// Tick period
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Persistence writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Coalesce saves on a timer instead of saving before each transaction returns
    pub batching: bool,

    /// Flush timer (milliseconds); also the retry cadence after a failed save
    pub flush_interval_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            batching: false,
            flush_interval_ms: 250,
        }
    }
}

impl PersistenceConfig {
    /// Flush timer period
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 16,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("ECONOMY_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(secs) = std::env::var("ECONOMY_INFLATION_INTERVAL_SECS") {
            config.inflation.interval_secs = secs.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid ECONOMY_INFLATION_INTERVAL_SECS '{}': {}", secs, e))
            })?;
        }

        if let Ok(batching) = std::env::var("ECONOMY_PERSIST_BATCHING") {
            config.persistence.batching = batching.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid ECONOMY_PERSIST_BATCHING '{}': {}", batching, e))
            })?;
        }

        if let Ok(cap) = std::env::var("ECONOMY_MAX_GOLD_SUPPLY") {
            config.economy.max_gold_supply = cap.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid ECONOMY_MAX_GOLD_SUPPLY '{}': {}", cap, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.economy.max_gold_supply <= Decimal::ZERO {
            return Err(crate::Error::Config(format!(
                "max_gold_supply must be positive, got {}",
                self.economy.max_gold_supply
            )));
        }

        let rate = self.economy.starting_inflation_rate;
        if rate < MIN_INFLATION_RATE || rate > MAX_INFLATION_RATE {
            return Err(crate::Error::Config(format!(
                "starting_inflation_rate {} outside [{}, {}]",
                rate, MIN_INFLATION_RATE, MAX_INFLATION_RATE
            )));
        }

        if self.inflation.interval_secs == 0 {
            return Err(crate::Error::Config(
                "inflation.interval_secs must be positive".to_string(),
            ));
        }

        if self.persistence.flush_interval_ms == 0 {
            return Err(crate::Error::Config(
                "persistence.flush_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
