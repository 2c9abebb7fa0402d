use crate::common::time::Clock;
use crate::storage::{
    MeasurementRepository, MigrationReport, MigrationRunner, RetentionCleaner, Storage,
};
use std::sync::Arc;

/// Outcome of the startup sequence. Nothing in it is fatal: the monitor runs
/// even when storage or migrations are unusable.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub storage_ready: bool,
    pub migrations: MigrationReport,
    pub purged: u64,
}

impl StartupReport {
    pub fn history_available(&self) -> bool {
        self.storage_ready && self.migrations.failed.is_none()
    }
}

/// Opens storage, brings the schema up to date, then purges expired history.
pub fn bootstrap(
    storage: Arc<dyn Storage>,
    retention_days: u32,
    clock: Arc<dyn Clock>,
) -> StartupReport {
    let runner = MigrationRunner::with_builtin(Arc::clone(&storage));
    bootstrap_with(storage, runner, retention_days, clock)
}

pub fn bootstrap_with(
    storage: Arc<dyn Storage>,
    runner: MigrationRunner,
    retention_days: u32,
    clock: Arc<dyn Clock>,
) -> StartupReport {
    storage.init();
    let storage_ready = storage.is_initialized();
    if !storage_ready {
        tracing::warn!("history disabled: storage could not be opened");
    }

    let migrations = runner.run();

    // cleanup also runs on a partially migrated schema; a missing table
    // just yields zero deletions
    let cleaner = RetentionCleaner::with_clock(
        MeasurementRepository::new(storage),
        retention_days,
        clock,
    );
    let purged = cleaner.run();

    StartupReport {
        storage_ready,
        migrations,
        purged,
    }
}
