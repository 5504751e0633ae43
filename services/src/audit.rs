//! Audit bookkeeping shared by every sync run.

use db::models::attendance_audit_log::Model as AuditModel;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use tracing::warn;

use crate::reconcile::{EventSource, ReconcileOutcome};

pub const OPERATION_MACHINE_SYNC: &str = "machine_sync";
pub const PERFORMED_BY_SYSTEM: &str = "system";

/// Long error lists add nothing to the audit trail; the full list goes back
/// to the caller in the run result.
const MAX_AUDITED_ERRORS: usize = 10;

/// Appends one audit row summarizing a completed run.
///
/// An audit write failure is logged and swallowed: bookkeeping must never
/// turn a successful sync into a failed one.
pub async fn record_run(
    db: &DatabaseConnection,
    source: &EventSource,
    outcome: &ReconcileOutcome,
    extra: Value,
) {
    let mut details = json!({
        "source": source.name(),
        "records_processed": outcome.records_processed,
        "records_saved": outcome.records_saved,
        "unmapped_ids": outcome.unmapped_ids,
        "errors": outcome.errors.iter().take(MAX_AUDITED_ERRORS).collect::<Vec<_>>(),
    });

    if let (Value::Object(details_map), Value::Object(extra_map)) = (&mut details, extra) {
        details_map.extend(extra_map);
    }

    if let Err(err) = AuditModel::record(
        db,
        OPERATION_MACHINE_SYNC,
        PERFORMED_BY_SYSTEM,
        details,
    )
    .await
    {
        warn!(source = source.name(), %err, "failed to write audit log entry");
    }
}
