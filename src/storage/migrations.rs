use super::{SqlValue, Storage, StorageError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const SCHEMA_VERSION_KEY: &str = "schema_version";

pub type ApplyFn = Box<dyn Fn(&dyn Storage) -> Result<(), StorageError> + Send + Sync>;

/// One ordered schema change. `apply` must be safe to run twice: a crash
/// between applying and recording the version re-runs it.
pub struct Migration {
    version: i64,
    name: &'static str,
    apply: ApplyFn,
}

impl Migration {
    pub fn new<F>(version: i64, name: &'static str, apply: F) -> Self
    where
        F: Fn(&dyn Storage) -> Result<(), StorageError> + Send + Sync + 'static,
    {
        Self {
            version,
            name,
            apply: Box::new(apply),
        }
    }

    /// A migration made only of SQL statements run in order.
    pub fn from_statements(
        version: i64,
        name: &'static str,
        statements: &'static [&'static str],
    ) -> Self {
        Self::new(version, name, move |storage: &dyn Storage| {
            for sql in statements {
                storage.execute(sql, &[])?;
            }
            Ok(())
        })
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration v{version} ({name}) failed: {source}")]
    Apply {
        version: i64,
        name: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("migration v{version} applied but recording the schema version failed: {source}")]
    Version {
        version: i64,
        #[source]
        source: StorageError,
    },
}

impl MigrationError {
    pub fn version(&self) -> i64 {
        match self {
            MigrationError::Apply { version, .. } | MigrationError::Version { version, .. } => {
                *version
            }
        }
    }
}

/// What a single [`MigrationRunner::run`] did. Failures are reported here
/// instead of being returned as errors.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub skipped: bool,
    pub from: i64,
    pub to: i64,
    pub applied: Vec<i64>,
    pub failed: Option<MigrationError>,
}

impl MigrationReport {
    pub fn is_degraded(&self) -> bool {
        self.skipped || self.failed.is_some()
    }
}

pub struct MigrationRunner {
    storage: Arc<dyn Storage>,
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            migrations: Vec::new(),
        }
    }

    /// Runner preloaded with every schema change this crate ships.
    pub fn with_builtin(storage: Arc<dyn Storage>) -> Self {
        let mut runner = Self::new(storage);
        for migration in builtin_migrations() {
            runner.register(migration);
        }
        runner
    }

    pub fn register(&mut self, migration: Migration) {
        self.migrations.push(migration);
        self.migrations.sort_by_key(Migration::version);
    }

    pub fn registered_versions(&self) -> Vec<i64> {
        self.migrations.iter().map(Migration::version).collect()
    }

    /// Stored schema version; every read problem counts as a fresh install.
    pub fn current_version(&self) -> i64 {
        let sql = "SELECT value FROM settings WHERE key = ?";
        match self.storage.query(sql, &[SCHEMA_VERSION_KEY.into()]) {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.first())
                .and_then(SqlValue::as_i64)
                .unwrap_or(0),
            Err(err) if err.is_missing_table() => {
                tracing::info!("settings table does not exist yet (first run)");
                0
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to read schema version; assuming 0");
                0
            }
        }
    }

    pub fn set_version(&self, version: i64) -> Result<(), StorageError> {
        self.storage.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            &[SCHEMA_VERSION_KEY.into(), version.to_string().into()],
        )
    }

    pub fn run(&self) -> MigrationReport {
        if !self.storage.is_initialized() {
            tracing::warn!("storage not initialized, skipping migrations");
            return MigrationReport {
                skipped: true,
                ..MigrationReport::default()
            };
        }

        let current = self.current_version();
        let mut report = MigrationReport {
            from: current,
            to: current,
            ..MigrationReport::default()
        };

        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version > current)
            .collect();
        if pending.is_empty() {
            tracing::info!(version = current, "schema is up to date");
            return report;
        }

        tracing::info!(
            from = current,
            pending = pending.len(),
            "running schema migrations"
        );

        for migration in pending {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "applying migration"
            );
            if let Err(source) = (migration.apply)(self.storage.as_ref()) {
                let err = MigrationError::Apply {
                    version: migration.version,
                    name: migration.name,
                    source,
                };
                tracing::error!(error = %err, "migration failed; leaving schema at v{}", report.to);
                report.failed = Some(err);
                return report;
            }
            if let Err(source) = self.set_version(migration.version) {
                let err = MigrationError::Version {
                    version: migration.version,
                    source,
                };
                tracing::error!(error = %err, "migration failed; leaving schema at v{}", report.to);
                report.failed = Some(err);
                return report;
            }
            report.applied.push(migration.version);
            report.to = migration.version;
        }

        tracing::info!(version = report.to, "all migrations completed");
        report
    }
}

const V1_INITIAL_SCHEMA: &[&str] = &[
    // settings first: the version marker lives there
    "CREATE TABLE IF NOT EXISTS settings (\
        key TEXT PRIMARY KEY,\
        value TEXT\
    )",
    "CREATE TABLE IF NOT EXISTS pings (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        timestamp INTEGER NOT NULL,\
        latency_ms REAL,\
        success INTEGER NOT NULL,\
        target TEXT NOT NULL\
    )",
    "CREATE INDEX IF NOT EXISTS idx_pings_timestamp ON pings(timestamp)",
];

pub fn builtin_migrations() -> Vec<Migration> {
    vec![Migration::from_statements(1, "initial_schema", V1_INITIAL_SCHEMA)]
}
