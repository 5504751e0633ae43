use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use services::legacy_poller::LegacyPoller;
use services::machine_sync::MachineSyncService;
use util::config;

/// Shared handles injected into every request handler.
///
/// Built once at startup. The sync service and the poller own all
/// cross-request state (in-flight guards, the legacy watermark), so the
/// router only ever clones cheap handles.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    sync: Arc<MachineSyncService>,
    poller: LegacyPoller,
}

impl AppState {
    pub fn new(db: DatabaseConnection) -> Self {
        let poller = LegacyPoller::new(
            db.clone(),
            config::legacy_db_path(),
            Duration::from_secs(config::legacy_poll_seconds()),
        );
        Self {
            db,
            sync: Arc::new(MachineSyncService::default()),
            poller,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn sync(&self) -> &MachineSyncService {
        &self.sync
    }

    pub fn poller(&self) -> &LegacyPoller {
        &self.poller
    }
}
