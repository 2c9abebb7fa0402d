use super::{Storage, StorageError};
use crate::common::time::epoch_millis;
use crate::probe::{MeasureStatus, Measurement};
use std::sync::Arc;

pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

const INSERT_PING: &str =
    "INSERT INTO pings (timestamp, latency_ms, success, target) VALUES (?, ?, ?, ?)";
const DELETE_PINGS_BEFORE: &str = "DELETE FROM pings WHERE timestamp < ?";

/// Owns the persisted `pings` rows. Every fault is logged and swallowed so
/// callers never see persistence trouble.
#[derive(Clone)]
pub struct MeasurementRepository {
    storage: Arc<dyn Storage>,
}

impl MeasurementRepository {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn save(&self, measurement: &Measurement, target: &str) {
        if !self.storage.is_initialized() {
            return;
        }
        if let Err(err) = self.insert(measurement, target) {
            tracing::error!(error = %err, target_url = target, "failed to persist measurement");
        }
    }

    fn insert(&self, measurement: &Measurement, target: &str) -> Result<(), StorageError> {
        let success = match measurement.status() {
            MeasureStatus::Ok => 1i64,
            MeasureStatus::Error => 0i64,
        };
        self.storage.execute(
            INSERT_PING,
            &[
                epoch_millis(measurement.timestamp()).into(),
                measurement.latency_ms().into(),
                success.into(),
                target.into(),
            ],
        )
    }

    /// Deletes rows older than `retention_days` before `now_ms`. Returns the
    /// number of rows removed, or 0 when storage is unavailable or failing.
    pub fn delete_older_than(&self, retention_days: u32, now_ms: i64) -> u64 {
        if !self.storage.is_initialized() {
            return 0;
        }
        let cutoff = retention_cutoff(retention_days, now_ms);
        match self
            .storage
            .execute_returning_affected_count(DELETE_PINGS_BEFORE, &[cutoff.into()])
        {
            Ok(count) => {
                tracing::info!(deleted = count, cutoff_ms = cutoff, "deleted old ping records");
                count
            }
            Err(err) => {
                tracing::error!(error = %err, cutoff_ms = cutoff, "failed to delete old pings");
                0
            }
        }
    }
}

pub fn retention_cutoff(retention_days: u32, now_ms: i64) -> i64 {
    now_ms.saturating_sub(i64::from(retention_days).saturating_mul(MS_PER_DAY))
}

#[cfg(test)]
mod tests;
