use super::{MeasurementRepository, retention_cutoff};
use crate::common::time::from_epoch_millis;
use crate::probe::Measurement;
use crate::storage::{MigrationRunner, Row, SqlValue, SqliteStorage, Storage, StorageError};
use std::sync::{Arc, Mutex};

const NOW_MS: i64 = 1_702_800_000_000;

fn migrated() -> Arc<SqliteStorage> {
    let storage = Arc::new(SqliteStorage::in_memory());
    storage.init();
    MigrationRunner::with_builtin(storage.clone()).run();
    storage
}

fn rows(storage: &SqliteStorage) -> Vec<Row> {
    storage
        .query(
            "SELECT timestamp, latency_ms, success, target FROM pings ORDER BY id",
            &[],
        )
        .expect("query")
}

/// Records every statement and answers counted deletes with a fixed number.
#[derive(Default)]
struct RecordingStorage {
    statements: Mutex<Vec<(String, Vec<SqlValue>)>>,
    fail: bool,
}

impl Storage for RecordingStorage {
    fn init(&self) {}

    fn is_initialized(&self) -> bool {
        true
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), StorageError> {
        self.execute_returning_affected_count(sql, params).map(|_| ())
    }

    fn query(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        Ok(Vec::new())
    }

    fn execute_returning_affected_count(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<u64, StorageError> {
        self.statements
            .lock()
            .expect("statements")
            .push((sql.to_string(), params.to_vec()));
        if self.fail {
            Err(StorageError::NotInitialized)
        } else {
            Ok(5)
        }
    }

    fn close(&self) {}
}

#[test]
fn error_measurement_persists_null_latency_and_failure_flag() {
    let storage = migrated();
    let repo = MeasurementRepository::new(storage.clone());
    repo.save(&Measurement::error(from_epoch_millis(NOW_MS)), "https://example.com");

    assert_eq!(
        rows(&storage),
        vec![vec![
            SqlValue::Integer(NOW_MS),
            SqlValue::Null,
            SqlValue::Integer(0),
            SqlValue::Text("https://example.com".to_string()),
        ]]
    );
}

#[test]
fn ok_measurement_persists_latency_and_success_flag() {
    let storage = migrated();
    let repo = MeasurementRepository::new(storage.clone());
    repo.save(&Measurement::ok(from_epoch_millis(NOW_MS), 42.5), "1.1.1.1");

    let saved = rows(&storage);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0][1], SqlValue::Real(42.5));
    assert_eq!(saved[0][2], SqlValue::Integer(1));
}

#[test]
fn save_without_schema_is_swallowed() {
    let storage = Arc::new(SqliteStorage::in_memory());
    storage.init();
    let repo = MeasurementRepository::new(storage);
    // no pings table: the insert fails and must not panic
    repo.save(&Measurement::ok(from_epoch_millis(NOW_MS), 1.0), "x");
}

#[test]
fn save_on_uninitialized_storage_is_a_noop() {
    let storage = Arc::new(SqliteStorage::in_memory());
    let repo = MeasurementRepository::new(storage.clone());
    repo.save(&Measurement::ok(from_epoch_millis(NOW_MS), 1.0), "x");
    assert!(!storage.is_initialized());
}

#[test]
fn delete_uses_thirty_day_cutoff() {
    let storage = Arc::new(RecordingStorage::default());
    let repo = MeasurementRepository::new(storage.clone());

    let deleted = repo.delete_older_than(30, NOW_MS);
    assert_eq!(deleted, 5);

    let statements = storage.statements.lock().expect("statements");
    assert_eq!(statements.len(), 1);
    let (sql, params) = &statements[0];
    assert!(sql.contains("DELETE FROM pings WHERE timestamp < ?"));
    assert_eq!(params, &vec![SqlValue::Integer(NOW_MS - 2_592_000_000)]);
}

#[test]
fn delete_fault_returns_zero() {
    let storage = Arc::new(RecordingStorage {
        fail: true,
        ..RecordingStorage::default()
    });
    let repo = MeasurementRepository::new(storage);
    assert_eq!(repo.delete_older_than(30, NOW_MS), 0);
}

#[test]
fn delete_on_uninitialized_storage_returns_zero() {
    let repo = MeasurementRepository::new(Arc::new(SqliteStorage::in_memory()));
    assert_eq!(repo.delete_older_than(30, NOW_MS), 0);
}

#[test]
fn delete_removes_only_rows_past_horizon() {
    let storage = migrated();
    let repo = MeasurementRepository::new(storage.clone());
    let day = 86_400_000;
    repo.save(&Measurement::ok(from_epoch_millis(NOW_MS - 31 * day), 1.0), "t");
    repo.save(&Measurement::error(from_epoch_millis(NOW_MS - 40 * day)), "t");
    repo.save(&Measurement::ok(from_epoch_millis(NOW_MS - day), 2.0), "t");

    assert_eq!(repo.delete_older_than(30, NOW_MS), 2);
    let left = rows(&storage);
    assert_eq!(left.len(), 1);
    assert_eq!(left[0][1], SqlValue::Real(2.0));
}

#[test]
fn cutoff_saturates_instead_of_overflowing() {
    assert_eq!(retention_cutoff(30, NOW_MS), NOW_MS - 2_592_000_000);
    assert_eq!(retention_cutoff(u32::MAX, i64::MIN + 1), i64::MIN);
}
