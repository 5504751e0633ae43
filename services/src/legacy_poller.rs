//! Polling loop for the legacy vendor export.
//!
//! The export file has no durable cursor, so every tick reads the whole
//! table and filters to events newer than the last successful run
//! (24 hours back on the very first run). A tick that yields nothing new is
//! a normal, successful no-op.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audit;
use crate::legacy::LegacyExportReader;
use crate::reconcile::{self, EventSource};

const FIRST_RUN_WINDOW_HOURS: i64 = 24;

/// Loop state surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PollerStatus {
    pub is_running: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Outcome of one tick, returned from manual `sync_now` calls.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LegacySyncReport {
    pub success: bool,
    pub message: String,
    pub records_processed: usize,
    pub records_saved: usize,
    pub unmapped_ids: Vec<i64>,
    pub errors: Vec<String>,
}

/// Start/stop-able interval loop over the legacy export reader.
///
/// Constructed once at startup and shared; all loop state lives here rather
/// than in process-wide globals.
#[derive(Clone)]
pub struct LegacyPoller {
    inner: Arc<Inner>,
}

struct Inner {
    db: DatabaseConnection,
    reader: LegacyExportReader,
    interval: Duration,
    running: AtomicBool,
    /// Bumped by every `stop()`. The loop captures the value at spawn and
    /// exits when it no longer matches, so a task left asleep across a
    /// stop/start cycle cannot tick again alongside its replacement.
    epoch: AtomicU64,
    /// Stops a manual `sync_now` racing a timer tick from double-reading
    /// the same window. Wasted work only, thanks to the idempotent insert,
    /// but there is no reason to do it.
    tick_in_flight: AtomicBool,
    /// Stretch applied at the front of every tick; zero outside of tests.
    tick_delay: Duration,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LegacyPoller {
    pub fn new(db: DatabaseConnection, path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                reader: LegacyExportReader::new(path),
                interval,
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                tick_in_flight: AtomicBool::new(false),
                tick_delay: Duration::ZERO,
                last_sync: Mutex::new(None),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.tick_delay = delay;
        }
        self
    }

    /// Spawns the interval loop. A second call while running is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let my_epoch = self.inner.epoch.load(Ordering::SeqCst);
        let poller = self.clone();
        let handle = tokio::spawn(async move {
            info!(interval = ?poller.inner.interval, "legacy export poller started");
            loop {
                tokio::time::sleep(poller.inner.interval).await;
                if poller.inner.epoch.load(Ordering::SeqCst) != my_epoch
                    || !poller.inner.running.load(Ordering::SeqCst)
                {
                    break;
                }
                poller.sync_now().await;
            }
            info!("legacy export poller stopped");
        });

        *self.inner.task.lock().expect("poller task slot poisoned") = Some(handle);
    }

    /// Retires the loop. A tick already in flight completes; the epoch bump
    /// makes the old task exit at its next wake, even if the poller has been
    /// restarted in the meantime.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.task.lock().expect("poller task slot poisoned").take();
    }

    pub fn status(&self) -> PollerStatus {
        PollerStatus {
            is_running: self.inner.running.load(Ordering::SeqCst),
            last_sync_time: *self.inner.last_sync.lock().expect("last_sync poisoned"),
        }
    }

    /// Runs one tick immediately. Returns a busy no-op report if a tick is
    /// already in flight.
    pub async fn sync_now(&self) -> LegacySyncReport {
        if self.inner.tick_in_flight.swap(true, Ordering::SeqCst) {
            return LegacySyncReport {
                success: true,
                message: "Legacy sync already in progress".into(),
                ..Default::default()
            };
        }
        let report = self.run_tick().await;
        self.inner.tick_in_flight.store(false, Ordering::SeqCst);
        report
    }

    async fn run_tick(&self) -> LegacySyncReport {
        if !self.inner.tick_delay.is_zero() {
            tokio::time::sleep(self.inner.tick_delay).await;
        }
        let tick_started = Utc::now();
        let cutoff = self
            .last_sync_time()
            .unwrap_or_else(|| tick_started - chrono::Duration::hours(FIRST_RUN_WINDOW_HOURS));

        let read = match self.inner.reader.read_events().await {
            Ok(read) => read,
            Err(err) => {
                warn!(
                    error = %err.message,
                    available_tables = ?err.available_tables,
                    "legacy export read failed; will retry next tick"
                );
                return LegacySyncReport {
                    success: false,
                    message: err.message,
                    errors: if err.available_tables.is_empty() {
                        vec![]
                    } else {
                        vec![format!(
                            "tables present: {}",
                            err.available_tables.join(", ")
                        )]
                    },
                    ..Default::default()
                };
            }
        };

        let fresh: Vec<_> = read
            .events
            .into_iter()
            .filter(|event| event.timestamp > cutoff)
            .collect();

        let source = EventSource::LegacyDb;
        let outcome = match reconcile::reconcile(&self.inner.db, &fresh, &source).await {
            Ok(outcome) => outcome,
            Err(err) => {
                return LegacySyncReport {
                    success: false,
                    message: format!("Reconciliation failed: {err}"),
                    ..Default::default()
                };
            }
        };

        // The read completed, so the watermark advances even when the tick
        // found nothing new.
        *self.inner.last_sync.lock().expect("last_sync poisoned") = Some(tick_started);

        let mut errors = read.row_errors;
        errors.extend(outcome.errors.iter().cloned());

        audit::record_run(
            &self.inner.db,
            &source,
            &outcome,
            serde_json::json!({ "table": read.table }),
        )
        .await;

        info!(
            table = read.table,
            fresh = outcome.records_processed,
            saved = outcome.records_saved,
            unmapped = outcome.unmapped_ids.len(),
            "legacy export tick complete"
        );

        LegacySyncReport {
            success: true,
            message: format!(
                "Processed {} new events, saved {}",
                outcome.records_processed, outcome.records_saved
            ),
            records_processed: outcome.records_processed,
            records_saved: outcome.records_saved,
            unmapped_ids: outcome.unmapped_ids,
            errors,
        }
    }

    fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_sync.lock().expect("last_sync poisoned")
    }
}
