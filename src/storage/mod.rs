//! Durable measurement history: the storage contract, its SQLite backend, the
//! schema migration runner, the measurement repository and retention.

pub mod migrations;
pub mod repository;
pub mod retention;
mod sqlite;
pub mod writer;

pub use migrations::{Migration, MigrationError, MigrationReport, MigrationRunner};
pub use repository::{DEFAULT_RETENTION_DAYS, MeasurementRepository};
pub use retention::RetentionCleaner;
pub use sqlite::SqliteStorage;
pub use writer::{SaveQueue, WriterHandle, spawn_writer};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is not initialized")]
    NotInitialized,
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// True when the statement referenced a table that does not exist yet.
    pub fn is_missing_table(&self) -> bool {
        self.to_string().to_ascii_lowercase().contains("no such table")
    }
}

/// A bound statement parameter or a column value read back.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            SqlValue::Real(v) => Some(*v as i64),
            SqlValue::Text(v) => v.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(v) => Some(*v as f64),
            SqlValue::Real(v) => Some(*v),
            SqlValue::Text(v) => v.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

pub type Row = Vec<SqlValue>;

/// Minimal statement-level store the repository and migrations run against.
///
/// `init` never fails outward: an unusable backend simply stays
/// uninitialized, and callers check [`Storage::is_initialized`] and degrade
/// to no-ops.
pub trait Storage: Send + Sync {
    fn init(&self);

    fn is_initialized(&self) -> bool;

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), StorageError>;

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError>;

    fn execute_returning_affected_count(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<u64, StorageError>;

    fn close(&self);
}
