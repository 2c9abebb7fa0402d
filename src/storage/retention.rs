use super::repository::{DEFAULT_RETENTION_DAYS, MeasurementRepository};
use crate::common::time::{Clock, SystemClock};
use std::sync::Arc;

/// Purges history past the retention horizon. Meant to run once at startup,
/// after migrations; never fails outward.
pub struct RetentionCleaner {
    repository: MeasurementRepository,
    retention_days: u32,
    clock: Arc<dyn Clock>,
}

impl RetentionCleaner {
    pub fn new(repository: MeasurementRepository) -> Self {
        Self::with_clock(repository, DEFAULT_RETENTION_DAYS, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: MeasurementRepository,
        retention_days: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            retention_days,
            clock,
        }
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn run(&self) -> u64 {
        tracing::info!(retention_days = self.retention_days, "starting data retention cleanup");
        let deleted = self
            .repository
            .delete_older_than(self.retention_days, self.clock.now_ms());
        tracing::info!(deleted, "cleanup complete");
        deleted
    }
}
