//! Persistence gateway
//!
//! The engine hands complete `Snapshot`s to a `SnapshotStore` and asks for
//! the last one at startup. Format and location belong to the store.
//!
//! # Column Families (RocksStore)
//!
//! - `economy` - parameters and exchange rates (fixed keys)
//! - `accounts` - per-currency balances (key: account UUID string)

use crate::{
    error::{Error, Result},
    state::{EconomyParameters, Snapshot},
    types::{AccountId, Currency},
    Config,
};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Column family names
const CF_ECONOMY: &str = "economy";
const CF_ACCOUNTS: &str = "accounts";

/// Keys in `economy`
const KEY_PARAMETERS: &[u8] = b"parameters";
const KEY_EXCHANGE_RATES: &[u8] = b"exchange_rates";

/// Where snapshots live
pub trait SnapshotStore: Send + Sync {
    /// Last saved snapshot, `None` if nothing was ever saved
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// RocksDB-backed store
pub struct RocksStore {
    db: Arc<DB>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ECONOMY, Options::default()),
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Balances are read once at startup and rewritten often
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn load_accounts(&self) -> Result<BTreeMap<AccountId, BTreeMap<Currency, Decimal>>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let mut accounts = BTreeMap::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;

            let account = match std::str::from_utf8(&key)
                .ok()
                .and_then(|s| s.parse::<AccountId>().ok())
            {
                Some(account) => account,
                None => {
                    tracing::warn!(key = %String::from_utf8_lossy(&key), "Invalid account id in storage, skipping");
                    continue;
                }
            };

            let balances: BTreeMap<Currency, Decimal> = bincode::deserialize(&value)?;
            accounts.insert(account, balances);
        }

        Ok(accounts)
    }
}

impl SnapshotStore for RocksStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let cf = self.cf_handle(CF_ECONOMY)?;

        let parameters: EconomyParameters = match self.db.get_cf(cf, KEY_PARAMETERS)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => return Ok(None),
        };

        let exchange_rates = match self.db.get_cf(cf, KEY_EXCHANGE_RATES)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => BTreeMap::new(),
        };

        let accounts = self.load_accounts()?;

        tracing::debug!(accounts = accounts.len(), "Snapshot loaded");

        Ok(Some(Snapshot {
            parameters,
            exchange_rates,
            accounts,
        }))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let cf_economy = self.cf_handle(CF_ECONOMY)?;
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_economy, KEY_PARAMETERS, bincode::serialize(&snapshot.parameters)?);
        batch.put_cf(
            cf_economy,
            KEY_EXCHANGE_RATES,
            bincode::serialize(&snapshot.exchange_rates)?,
        );

        // Account keys are ASCII UUID strings, all below 0xff
        batch.delete_range_cf(cf_accounts, b"".as_slice(), b"\xff".as_slice());
        for (account, balances) in &snapshot.accounts {
            batch.put_cf(
                cf_accounts,
                account.to_string().as_bytes(),
                bincode::serialize(balances)?,
            );
        }

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(accounts = snapshot.accounts.len(), "Snapshot saved");
        Ok(())
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    saves: Mutex<u64>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot` (tests, fixtures)
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful saves
    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }

    /// Last saved snapshot
    pub fn latest(&self) -> Option<Snapshot> {
        self.snapshot.lock().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
