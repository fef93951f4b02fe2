//! Persistence writer
//!
//! Single-writer task that owns the snapshot store, so disk I/O never runs
//! under the engine lock:
//! - Transactions mutate state under the lock, then notify the writer
//! - The writer takes the lock only long enough to build a snapshot
//! - Failed saves keep the state dirty and are retried on every timer tick
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              Economy (credit/transfer/exchange)       │
//! │        mutate EconomyState under parking_lot lock     │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ PersistHandle (Clone)
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              PersistActor (Single Task)               │
//! │  dirty flag + saved version                           │
//! │  Timer: flush_interval → retry / coalesced flush      │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//!             SnapshotStore::save()
//! ```

use crate::{metrics::Metrics, state::EconomyState, storage::SnapshotStore, Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Message sent to the persistence writer
#[derive(Debug)]
pub enum PersistMessage {
    /// State changed; save it when convenient
    MarkDirty,

    /// Save now and report the outcome
    Flush {
        response: oneshot::Sender<Result<()>>,
    },

    /// Final save, then stop
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Task that writes snapshots to the store
pub struct PersistActor {
    /// Shared engine state
    state: Arc<Mutex<EconomyState>>,

    /// Persistence gateway
    store: Arc<dyn SnapshotStore>,

    /// Save latency and failure counters
    metrics: Metrics,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<PersistMessage>,

    /// Flush/retry timer period
    flush_interval: Duration,

    /// Coalesce MarkDirty notifications until the timer fires
    batching_enabled: bool,

    /// Version of the last successfully saved snapshot
    saved_version: Option<u64>,

    /// Unsaved changes pending
    dirty: bool,
}

impl std::fmt::Debug for PersistActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistActor")
            .field("batching_enabled", &self.batching_enabled)
            .field("saved_version", &self.saved_version)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl PersistActor {
    /// Create new actor
    pub fn new(
        state: Arc<Mutex<EconomyState>>,
        store: Arc<dyn SnapshotStore>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<PersistMessage>,
        flush_interval: Duration,
        batching_enabled: bool,
        saved_version: Option<u64>,
    ) -> Self {
        Self {
            state,
            store,
            metrics,
            mailbox,
            flush_interval,
            batching_enabled,
            saved_version,
            dirty: false,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut flush_timer = interval(self.flush_interval);
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut shutdown = None;

        loop {
            tokio::select! {
                Some(msg) = self.mailbox.recv() => {
                    match msg {
                        PersistMessage::Shutdown { response } => {
                            shutdown = Some((response, self.flush()));
                            break;
                        }
                        PersistMessage::MarkDirty => {
                            self.dirty = true;
                            if !self.batching_enabled {
                                // Failure already logged; the timer retries
                                let _ = self.flush();
                            }
                        }
                        PersistMessage::Flush { response } => {
                            let result = self.flush();
                            let _ = response.send(result);
                        }
                    }
                }

                // Coalesced flush or retry after a failed save
                _ = flush_timer.tick(), if self.dirty => {
                    let _ = self.flush();
                }

                // Mailbox closed and nothing pending
                else => break,
            }
        }

        // Store must be closed before the caller hears back
        drop(self);
        if let Some((response, result)) = shutdown {
            let _ = response.send(result);
        }

        tracing::debug!("Persistence writer stopped");
    }

    /// Snapshot under the lock, save outside it
    fn flush(&mut self) -> Result<()> {
        let (snapshot, version) = {
            let state = self.state.lock();
            (state.snapshot(), state.version())
        };

        if self.saved_version == Some(version) {
            self.dirty = false;
            return Ok(());
        }

        let started = Instant::now();
        let result = self.store.save(&snapshot);
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                self.metrics.record_persist(elapsed, true);
                self.saved_version = Some(version);
                self.dirty = false;
                tracing::debug!(version, "Economy snapshot saved");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_persist(elapsed, false);
                self.dirty = true;
                tracing::error!(
                    version,
                    error = %e,
                    "Failed to save economy snapshot; in-memory state kept, retrying"
                );
                Err(e)
            }
        }
    }
}

/// Handle for sending messages to the writer
#[derive(Debug, Clone)]
pub struct PersistHandle {
    sender: mpsc::Sender<PersistMessage>,
}

impl PersistHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<PersistMessage>) -> Self {
        Self { sender }
    }

    /// Notify the writer that state changed (non-blocking)
    pub fn mark_dirty(&self) {
        match self.sender.try_send(PersistMessage::MarkDirty) {
            Ok(()) => {}
            // A full mailbox already holds pending work that will flush this change
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("Persistence writer is gone; change not queued for saving");
            }
        }
    }

    /// Save now and wait for the outcome
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PersistMessage::Flush { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Final save, then stop the writer
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PersistMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }
}

/// Spawn the persistence writer
pub fn spawn_persist_actor(
    state: Arc<Mutex<EconomyState>>,
    store: Arc<dyn SnapshotStore>,
    metrics: Metrics,
    flush_interval: Duration,
    batching_enabled: bool,
    saved_version: Option<u64>,
) -> PersistHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = PersistActor::new(
        state,
        store,
        metrics,
        rx,
        flush_interval,
        batching_enabled,
        saved_version,
    );

    tokio::spawn(async move {
        actor.run().await;
    });

    PersistHandle::new(tx)
}
