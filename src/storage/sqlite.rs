use super::{Row, SqlValue, Storage, StorageError};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Eq, PartialEq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-backed [`Storage`]. A single connection is shared behind a mutex;
/// statements from the writer thread and startup never overlap in practice.
pub struct SqliteStorage {
    location: Location,
    conn: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("location", &self.location)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl SqliteStorage {
    pub fn open_path(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            conn: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: Mutex::new(None),
        }
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = match &self.location {
            Location::Memory => Connection::open_in_memory()?,
            Location::File(path) => {
                ensure_parent_dir(path)?;
                let conn = Connection::open(path).map_err(|source| StorageError::Open {
                    path: path.clone(),
                    source,
                })?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
                conn
            }
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(StorageError::NotInitialized)?;
        f(conn)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), StorageError> {
    let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

impl Storage for SqliteStorage {
    fn init(&self) {
        let mut guard = self.lock();
        if guard.is_some() {
            return;
        }
        match self.connect() {
            Ok(conn) => {
                tracing::debug!(location = ?self.location, "sqlite storage opened");
                *guard = Some(conn);
            }
            Err(err) => {
                tracing::error!(
                    location = ?self.location,
                    error = %err,
                    "failed to initialize storage; history disabled"
                );
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), StorageError> {
        self.execute_returning_affected_count(sql, params)
            .map(|_| ())
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns = stmt.column_count();
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                (0..columns)
                    .map(|idx| row.get_ref(idx).map(read_value))
                    .collect::<rusqlite::Result<Row>>()
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<Row>>>()?)
        })
    }

    fn execute_returning_affected_count(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<u64, StorageError> {
        self.with_conn(|conn| {
            let changed = conn.execute(sql, params_from_iter(params.iter()))?;
            Ok(changed as u64)
        })
    }

    fn close(&self) {
        let Some(conn) = self.lock().take() else {
            return;
        };
        if let Err((_, err)) = conn.close() {
            tracing::warn!(error = %err, "sqlite close reported an error");
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

fn read_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
