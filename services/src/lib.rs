//! Biometric attendance synchronization services.
//!
//! Three ingestion paths (live terminal, legacy vendor export, CSV upload)
//! feed one shared reconciliation engine, which resolves machine user ids to
//! application persons and writes idempotent attendance rows.

pub mod audit;
pub mod csv_import;
pub mod device;
pub mod error;
pub mod legacy;
pub mod legacy_poller;
pub mod machine_sync;
pub mod reconcile;

pub use error::{DeviceError, DeviceErrorKind, LegacyReadError};
pub use reconcile::{EventSource, RawAttendanceEvent, ReconcileOutcome};
