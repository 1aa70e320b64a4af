//! # Table queue registry and dispatch workers
//!
//! One ordered queue per table identity, one active dispatch worker per
//! table. Data-change events are materialized and forwarded downstream in
//! drain order; a schema-change event blocks its table's queue, refreshes the
//! cached converter pipeline synchronously, and unblocks before draining
//! resumes. Unrelated tables keep progressing independently.
//!
//! ## Ordering guarantee
//!
//! No data-change event for a table is ever forwarded downstream while a
//! previously-enqueued schema-change event for the same table is
//! unprocessed. Cross-table interleaving is unconstrained.
//!
//! ## Usage
//!
//! ```ignore
//! use logrow::{CdcDispatcher, ChannelSink, DispatchConfig};
//!
//! let config = DispatchConfig::builder().batch_depth(500).build()?;
//! let (sink, mut rows) = ChannelSink::new();
//! let dispatcher = CdcDispatcher::new(config, provider, Arc::new(sink));
//!
//! dispatcher.enqueue(event).await;
//! while let Some(row) = rows.recv().await {
//!     deliver(row);
//! }
//! dispatcher.stop().await;
//! ```

use crate::config::DispatchConfig;
use crate::error::Result;
use crate::event::{ChangeEvent, ChangeOp};
use crate::row::{OutputRow, RowMaterializer};
use crate::schema::{ConverterCache, MetadataProvider};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Downstream consumer of materialized rows.
///
/// Assumed non-blocking or internally buffered; starvation protection is the
/// consumer's responsibility.
pub trait RowSink: Send + Sync {
    /// Receive one output row in drain order.
    fn accept(&self, row: OutputRow);
}

/// [`RowSink`] backed by an unbounded tokio channel.
pub struct ChannelSink {
    tx: UnboundedSender<OutputRow>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its rows.
    pub fn new() -> (Self, UnboundedReceiver<OutputRow>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RowSink for ChannelSink {
    fn accept(&self, row: OutputRow) {
        // Receiver dropped means the consumer is gone; rows are discarded
        let _ = self.tx.send(row);
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Dispatcher counters for metrics and tests.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub events_enqueued: AtomicU64,
    pub events_dropped: AtomicU64,
    pub rows_emitted: AtomicU64,
    pub ddl_handled: AtomicU64,
    pub tables_failed: AtomicU64,
    pub active_workers: AtomicU64,
}

impl DispatcherStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_row(&self) {
        self.rows_emitted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ddl(&self) {
        self.ddl_handled.fetch_add(1, Ordering::Relaxed);
    }

    fn table_failed(&self) {
        self.tables_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    fn worker_stopped(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            rows_emitted: self.rows_emitted.load(Ordering::Relaxed),
            ddl_handled: self.ddl_handled.load(Ordering::Relaxed),
            tables_failed: self.tables_failed.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherStatsSnapshot {
    pub events_enqueued: u64,
    pub events_dropped: u64,
    pub rows_emitted: u64,
    pub ddl_handled: u64,
    pub tables_failed: u64,
    pub active_workers: u64,
}

// ============================================================================
// Per-table queue state
// ============================================================================

/// Queue state for one table, created lazily on first event.
///
/// Exactly one worker drains a given table, so the queue mutex is contended
/// only between that worker and producers appending new events.
struct TableState {
    queue: Mutex<VecDeque<ChangeEvent>>,
    /// Set while a schema-change event is being processed, or permanently
    /// after a fatal error
    blocked: AtomicBool,
    /// Set after a fatal error; subsequent events for the table are dropped
    failed: AtomicBool,
    wake: Notify,
}

impl TableState {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            blocked: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }
}

// ============================================================================
// Dispatch worker
// ============================================================================

/// One dispatch loop bound to one table's queue.
struct TableWorker {
    table: String,
    state: Arc<TableState>,
    cache: Arc<ConverterCache>,
    materializer: RowMaterializer,
    sink: Arc<dyn RowSink>,
    stats: Arc<DispatcherStats>,
    batch_depth: usize,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl TableWorker {
    async fn run(self) {
        self.stats.worker_started();
        debug!(table = %self.table, "dispatch worker started");

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let more = if self.state.blocked.load(Ordering::SeqCst) {
                // Unblocking happens only via the schema-change handler;
                // this turn does no dequeue.
                false
            } else {
                match self.drain_turn().await {
                    Ok(more) => more,
                    Err(e) => {
                        error!(
                            table = %self.table,
                            error = %e,
                            code = e.error_code(),
                            "fatal error, terminating dispatch for this table"
                        );
                        self.state.blocked.store(true, Ordering::SeqCst);
                        self.state.failed.store(true, Ordering::SeqCst);
                        self.stats.table_failed();
                        break;
                    }
                }
            };

            if more {
                // Quota exhausted with events still queued: yield so other
                // tables sharing the runtime get scheduled.
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = self.state.wake.notified() => {}
                _ = self.shutdown.notified() => break,
            }
        }

        self.stats.worker_stopped();
        debug!(table = %self.table, "dispatch worker stopped");
    }

    /// Drain up to `batch_depth` events from the head of the queue.
    ///
    /// The quota is re-evaluated per event, so a schema-change event mid-turn
    /// blocks, refreshes, unblocks, and draining resumes on the remaining
    /// budget of the same turn. Returns whether events remain queued.
    async fn drain_turn(&self) -> Result<bool> {
        let mut budget = self.batch_depth;
        while budget > 0 {
            let event = self.state.queue.lock().await.pop_front();
            let Some(event) = event else {
                return Ok(false);
            };
            budget -= 1;

            match event.op {
                ChangeOp::Ddl => self.handle_ddl(&event).await?,
                _ => self.handle_dml(&event).await?,
            }
        }
        Ok(!self.state.queue.lock().await.is_empty())
    }

    /// Process a schema-change event: block the queue, refresh the cached
    /// converter pipeline, unblock.
    ///
    /// Data events enqueued behind the marker cannot overtake the refresh:
    /// they sit in the queue until this call returns.
    async fn handle_ddl(&self, event: &ChangeEvent) -> Result<()> {
        self.state.blocked.store(true, Ordering::SeqCst);
        info!(
            table = %self.table,
            scn = event.scn,
            "schema change event, refreshing table metadata"
        );

        let entry = self.cache.refresh(&event.schema, &event.table).await?;

        debug!(
            table = %self.table,
            columns = entry.schema.len(),
            "converter pipeline refreshed"
        );
        self.stats.record_ddl();
        self.state.blocked.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Materialize a data-change event and forward its rows downstream.
    async fn handle_dml(&self, event: &ChangeEvent) -> Result<()> {
        let entry = self
            .cache
            .resolve(&event.schema, &event.table, event.probe_columns())
            .await?;
        let rows = self.materializer.materialize(event, &entry)?;
        for row in rows {
            self.sink.accept(row);
            self.stats.record_row();
        }
        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Ordering-safe concurrent dispatcher: the table queue registry plus one
/// worker per table.
///
/// The only shared mutable structure is the table-identity -> queue map;
/// per-table queue contents are owned by their worker during a drain.
pub struct CdcDispatcher {
    config: DispatchConfig,
    cache: Arc<ConverterCache>,
    materializer: RowMaterializer,
    sink: Arc<dyn RowSink>,
    tables: DashMap<String, Arc<TableState>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    stats: Arc<DispatcherStats>,
}

impl CdcDispatcher {
    /// Create a dispatcher.
    ///
    /// Workers are spawned lazily, one per distinct table identity, as
    /// events arrive.
    pub fn new(
        config: DispatchConfig,
        provider: Arc<dyn MetadataProvider>,
        sink: Arc<dyn RowSink>,
    ) -> Self {
        let materializer =
            RowMaterializer::new(config.paved_representation, config.split_update);
        Self {
            cache: Arc::new(ConverterCache::new(provider)),
            materializer,
            sink,
            tables: DashMap::new(),
            workers: Mutex::new(Vec::new()),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(DispatcherStats::new()),
            config,
        }
    }

    /// Append an event to its table's queue, creating queue and worker on
    /// first sight of the table. Never blocks beyond the queue append.
    pub async fn enqueue(&self, event: ChangeEvent) {
        if !self.running.load(Ordering::SeqCst) {
            warn!(table = %event.table_identity(), "dispatcher stopped, dropping event");
            self.stats.record_dropped();
            return;
        }

        let key = event.table_identity();
        let (state, spawned) = self.table_state(&key);
        if let Some(handle) = spawned {
            self.workers.lock().await.push(handle);
        }

        if state.failed.load(Ordering::SeqCst) {
            warn!(table = %key, "dropping event for failed table");
            self.stats.record_dropped();
            return;
        }

        state.queue.lock().await.push_back(event);
        self.stats.record_enqueued();
        state.wake.notify_one();
    }

    /// Get or lazily create the queue state for a table; a vacant entry
    /// spawns the table's single dispatch worker.
    fn table_state(&self, key: &str) -> (Arc<TableState>, Option<JoinHandle<()>>) {
        if let Some(state) = self.tables.get(key) {
            return (Arc::clone(state.value()), None);
        }
        match self.tables.entry(key.to_string()) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), None),
            Entry::Vacant(slot) => {
                let state = Arc::new(TableState::new());
                slot.insert(Arc::clone(&state));

                let worker = TableWorker {
                    table: key.to_string(),
                    state: Arc::clone(&state),
                    cache: Arc::clone(&self.cache),
                    materializer: self.materializer.clone(),
                    sink: Arc::clone(&self.sink),
                    stats: Arc::clone(&self.stats),
                    batch_depth: self.config.batch_depth,
                    running: Arc::clone(&self.running),
                    shutdown: Arc::clone(&self.shutdown),
                };
                (state, Some(tokio::spawn(worker.run())))
            }
        }
    }

    /// Stop all workers after their current turn and wait for them, aborting
    /// any that exceed the shutdown timeout.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("cdc dispatcher stopping");

        // Wake parked workers so they observe the stop flag
        for entry in self.tables.iter() {
            entry.value().wake.notify_one();
        }
        self.shutdown.notify_waiters();

        let workers = std::mem::take(&mut *self.workers.lock().await);
        let deadline = Instant::now() + self.config.shutdown_timeout;
        for handle in workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                handle.abort();
                warn!("aborted dispatch worker after shutdown timeout");
                continue;
            }
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("dispatch worker panicked: {e}"),
                Err(_) => warn!("dispatch worker timed out during shutdown"),
            }
        }

        info!("cdc dispatcher stopped");
    }

    /// Check if the dispatcher accepts events.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of distinct tables seen so far.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Dispatcher statistics.
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }
}
