//! The reconciliation engine: the single choke point through which every raw
//! event from any ingestion source becomes either a persisted attendance row
//! or an entry in the run's unmapped-id set.
//!
//! Keeping one code path means identity resolution and write semantics can
//! never drift apart between the live-device, legacy-export and CSV sources.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use db::models::{
    dual_mode_attendance::Model as AttendanceModel,
    user_machine_mapping::{Entity as MappingEntity, PersonType},
};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use tracing::warn;

/// A single punch as it came off a source, before identity resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawAttendanceEvent {
    pub machine_user_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Which ingestion path produced a batch. Determines the source tag written
/// to each attendance row and the source name recorded in the audit log.
#[derive(Debug, Clone, PartialEq)]
pub enum EventSource {
    Machine { ip: String },
    LegacyDb,
    CsvImport { file: String },
}

impl EventSource {
    /// All machine-sourced rows share one `source_type`; the tag tells the
    /// paths apart.
    pub fn source_type(&self) -> &'static str {
        "machine"
    }

    pub fn source_tag(&self) -> String {
        match self {
            EventSource::Machine { ip } => ip.clone(),
            EventSource::LegacyDb => "legacy_db".to_owned(),
            EventSource::CsvImport { file } => file.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventSource::Machine { .. } => "machine",
            EventSource::LegacyDb => "legacy_db",
            EventSource::CsvImport { .. } => "csv_import",
        }
    }
}

/// Result of reconciling one batch.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReconcileOutcome {
    pub records_processed: usize,
    pub records_saved: usize,
    /// Distinct machine user ids with no mapping row, in first-seen order.
    pub unmapped_ids: Vec<i64>,
    pub errors: Vec<String>,
}

/// Resolves and persists a batch of raw events.
///
/// Events are processed in the order received. An unmapped id is an expected
/// operator-action state, not a fault: the id is accumulated and processing
/// continues. A failure writing one event is caught and logged without
/// aborting the rest of the batch. Failing to load the mapping table at all
/// is the only fatal outcome.
pub async fn reconcile(
    db: &DatabaseConnection,
    events: &[RawAttendanceEvent],
    source: &EventSource,
) -> Result<ReconcileOutcome, DbErr> {
    let mappings: HashMap<i64, (i64, PersonType)> = MappingEntity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.machine_user_id, (m.person_id, m.person_type)))
        .collect();

    let mut outcome = ReconcileOutcome::default();
    let mut seen_unmapped: HashSet<i64> = HashSet::new();

    for event in events {
        outcome.records_processed += 1;

        let Some(&(person_id, person_type)) = mappings.get(&event.machine_user_id) else {
            if seen_unmapped.insert(event.machine_user_id) {
                outcome.unmapped_ids.push(event.machine_user_id);
            }
            continue;
        };

        match AttendanceModel::insert_ignore(
            db,
            person_id,
            person_type,
            event.timestamp,
            source.source_type(),
            &source.source_tag(),
        )
        .await
        {
            Ok(true) => outcome.records_saved += 1,
            Ok(false) => {} // duplicate punch, absorbed by the unique index
            Err(err) => {
                warn!(
                    machine_user_id = event.machine_user_id,
                    %err,
                    "failed to save attendance row"
                );
                outcome.errors.push(format!(
                    "machine_user_id {} at {}: {}",
                    event.machine_user_id, event.timestamp, err
                ));
            }
        }
    }

    Ok(outcome)
}
