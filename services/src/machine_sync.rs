//! On-demand live-device sync: one machine at a time, wrapped in
//! `sync_log` and audit bookkeeping.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use db::models::{
    machine_config::{Entity as MachineEntity, Model as MachineModel},
    sync_log::{Model as SyncLogModel, SyncStatus},
};
use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::{error, info};

use crate::audit;
use crate::device::{DeviceClient, DeviceInfo};
use crate::reconcile::{self, EventSource};

/// Why a sync or probe failed, independent of its display message. API
/// handlers map these to status codes rather than parsing message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFailureKind {
    MachineNotFound,
    MachineDisabled,
    SyncInProgress,
    Device,
    Database,
}

/// Outcome of one sync attempt, returned to the triggering operator.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SyncFailureKind>,
    pub records_retrieved: usize,
    pub records_saved: usize,
    pub unmatched_user_ids: Vec<i64>,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn failure(kind: SyncFailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            failure: Some(kind),
            ..Default::default()
        }
    }
}

/// Outcome of a connection probe.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SyncFailureKind>,
    pub machine_info: Option<DeviceInfo>,
}

/// Drives live-device syncs.
///
/// A mutex-held set of busy machine ids keeps two triggers for the same
/// machine (double click, manual racing a schedule) from fetching and
/// reconciling the same window twice. The idempotent attendance insert
/// already protects the data; the guard protects the `sync_log` trail
/// from interleaved entries and the device from a second connection.
pub struct MachineSyncService {
    client: DeviceClient,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl Default for MachineSyncService {
    fn default() -> Self {
        Self::new(DeviceClient::new())
    }
}

impl MachineSyncService {
    pub fn new(client: DeviceClient) -> Self {
        Self {
            client,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Read-only reachability probe; nothing is persisted.
    pub async fn test_connection(
        &self,
        db: &DatabaseConnection,
        machine_id: i64,
    ) -> ConnectionReport {
        let machine = match load_machine(db, machine_id).await {
            Ok(machine) => machine,
            Err((kind, message)) => {
                return ConnectionReport {
                    success: false,
                    message,
                    failure: Some(kind),
                    machine_info: None,
                };
            }
        };

        match self.client.test_connection(&machine).await {
            Ok(info) => ConnectionReport {
                success: true,
                message: format!("Connected to {}", machine.name),
                failure: None,
                machine_info: Some(info),
            },
            Err(err) => ConnectionReport {
                success: false,
                message: format!("Connection failed ({}): {}", err.kind, err.message),
                failure: Some(SyncFailureKind::Device),
                machine_info: None,
            },
        }
    }

    /// Runs one full sync for a machine.
    ///
    /// A failure here is fatal for this machine's run only; other machines
    /// and sources are unaffected.
    pub async fn sync_machine(&self, db: &DatabaseConnection, machine_id: i64) -> SyncReport {
        let machine = match load_machine(db, machine_id).await {
            Ok(machine) => machine,
            Err((kind, message)) => return SyncReport::failure(kind, message),
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, machine_id) else {
            return SyncReport::failure(
                SyncFailureKind::SyncInProgress,
                format!("Sync already in progress for machine {}", machine.name),
            );
        };

        let started_at = Utc::now();
        let log = match SyncLogModel::start(db, machine_id, started_at).await {
            Ok(log) => log,
            Err(err) => {
                return SyncReport::failure(
                    SyncFailureKind::Database,
                    format!("Could not open sync log: {err}"),
                );
            }
        };

        let logs = match self.client.fetch_attendance_logs(&machine).await {
            Ok(logs) => logs,
            Err(err) => {
                let message = format!("Device fetch failed ({}): {}", err.kind, err.message);
                error!(machine = %machine.name, "{message}");
                finalize(db, log.id, SyncStatus::Failed, 0, 0, Some(message.clone())).await;
                return SyncReport::failure(SyncFailureKind::Device, message);
            }
        };
        let records_retrieved = logs.len();

        // The device always returns its full retained buffer; only records
        // newer than the last successful sync are new to us.
        let cutoff: Option<DateTime<Utc>> = machine.last_sync_at;
        let fresh: Vec<_> = logs
            .into_iter()
            .filter(|event| cutoff.is_none_or(|c| event.timestamp > c))
            .collect();

        let source = EventSource::Machine {
            ip: machine.ip_address.clone(),
        };
        let outcome = match reconcile::reconcile(db, &fresh, &source).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let message = format!("Reconciliation failed: {err}");
                finalize(
                    db,
                    log.id,
                    SyncStatus::Failed,
                    records_retrieved as i32,
                    0,
                    Some(message.clone()),
                )
                .await;
                return SyncReport::failure(SyncFailureKind::Database, message);
            }
        };

        finalize(
            db,
            log.id,
            SyncStatus::Success,
            records_retrieved as i32,
            outcome.records_saved as i32,
            None,
        )
        .await;

        if let Err(err) = MachineModel::mark_synced(db, machine_id, started_at).await {
            error!(machine = %machine.name, %err, "failed to advance last_sync_at");
        }

        audit::record_run(
            db,
            &source,
            &outcome,
            serde_json::json!({ "machine_id": machine_id }),
        )
        .await;

        info!(
            machine = %machine.name,
            retrieved = records_retrieved,
            fresh = outcome.records_processed,
            saved = outcome.records_saved,
            unmapped = outcome.unmapped_ids.len(),
            "machine sync complete"
        );

        SyncReport {
            success: true,
            message: format!(
                "Synced {}: {} new of {} retrieved",
                machine.name, outcome.records_saved, records_retrieved
            ),
            failure: None,
            records_retrieved,
            records_saved: outcome.records_saved,
            unmatched_user_ids: outcome.unmapped_ids,
            errors: outcome.errors,
        }
    }
}

async fn load_machine(
    db: &DatabaseConnection,
    machine_id: i64,
) -> Result<MachineModel, (SyncFailureKind, String)> {
    match MachineEntity::find_by_id(machine_id).one(db).await {
        Ok(Some(machine)) if machine.enabled => Ok(machine),
        Ok(Some(machine)) => Err((
            SyncFailureKind::MachineDisabled,
            format!("Machine {} is disabled", machine.name),
        )),
        Ok(None) => Err((
            SyncFailureKind::MachineNotFound,
            format!("Machine ID {machine_id} not found"),
        )),
        Err(err) => Err((
            SyncFailureKind::Database,
            format!("Could not load machine: {err}"),
        )),
    }
}

async fn finalize(
    db: &DatabaseConnection,
    log_id: i64,
    status: SyncStatus,
    retrieved: i32,
    saved: i32,
    error_message: Option<String>,
) {
    if let Err(err) =
        SyncLogModel::complete(db, log_id, status, retrieved, saved, error_message).await
    {
        error!(log_id, %err, "failed to finalize sync log row");
    }
}

/// Removes the machine id from the busy set when the run ends, however it
/// ends.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<i64>>>,
    machine_id: i64,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<i64>>>, machine_id: i64) -> Option<Self> {
        let mut busy = set.lock().expect("in-flight set poisoned");
        if !busy.insert(machine_id) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            machine_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.set.lock() {
            busy.remove(&self.machine_id);
        }
    }
}
