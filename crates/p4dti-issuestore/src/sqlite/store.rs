//! [`SqliteStore`] -- SQLite-backed issue-side adapter.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::sqlite::schema;

/// One deferred mail action recorded during a critical section (e.g. a
/// pre-overwrite snapshot mailed after a revert). Flushed by the
/// notification layer once `poll_end` releases the lock.
#[derive(Debug, Clone)]
pub struct DeferredMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// SQLite-backed implementation of the issue-side adapter.
///
/// Wraps a [`rusqlite::Connection`] in a `Mutex` for thread safety, as a
/// single replicator process is expected to drive it from one poll loop.
pub struct SqliteStore {
    pub(crate) conn: Mutex<Connection>,
    /// Mail actions queued during the current critical section.
    pub(crate) deferred_mail: Mutex<Vec<DeferredMail>>,
    /// Set between `poll_start` and `poll_end`.
    pub(crate) in_cycle: Mutex<bool>,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(?path, "opening issue-store SQLite database");

        let conn = Connection::open(path)
            .map_err(|e| StorageError::Connection(format!("failed to open {}: {e}", path.display())))?;

        let store = Self {
            conn: Mutex::new(conn),
            deferred_mail: Mutex::new(Vec::new()),
            in_cycle: Mutex::new(false),
        };
        store.configure_connection()?;
        Ok(store)
    }

    /// Opens an in-memory SQLite database (used by tests).
    pub fn open_in_memory() -> Result<Self> {
        debug!("opening in-memory issue-store SQLite database");
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("failed to open in-memory db: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
            deferred_mail: Mutex::new(Vec::new()),
            in_cycle: Mutex::new(false),
        };
        store.configure_connection()?;
        Ok(store)
    }

    fn configure_connection(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StorageError::Connection(format!("failed to set pragmas: {e}")))?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Connection(format!("mutex poisoned: {e}")))
    }

    /// Creates all base tables and schema-extension tables if missing,
    /// then brings the schema-extension version up to
    /// [`schema::CURRENT_SCHEMA_VERSION`].
    ///
    /// Bootstrapping the config table also seeds
    /// `schema_version = CURRENT_SCHEMA_VERSION` for `(rid, sid)`, since
    /// a freshly created store has nothing to upgrade from. An unknown
    /// or newer-than-supported stored version is fatal.
    pub fn init_schema(&self, rid: &str, sid: &str) -> Result<()> {
        {
            let conn = self.lock()?;
            for stmt in schema::SCHEMA_STATEMENTS {
                conn.execute_batch(stmt)
                    .map_err(|e| StorageError::Connection(format!("schema init failed: {e}")))?;
            }
        }

        let stored = self.read_schema_version(rid, sid)?;
        match stored {
            None => {
                self.write_schema_version(rid, sid, schema::CURRENT_SCHEMA_VERSION)?;
                info!(rid, sid, version = schema::CURRENT_SCHEMA_VERSION, "bootstrapped schema-extension version");
            }
            Some(v) if v == schema::CURRENT_SCHEMA_VERSION => {
                debug!(version = v, "schema-extension already current");
            }
            Some(v) if v < schema::MIN_SUPPORTED_SCHEMA_VERSION || v > schema::CURRENT_SCHEMA_VERSION => {
                return Err(StorageError::UnsupportedSchemaVersion {
                    version: v,
                    min: schema::MIN_SUPPORTED_SCHEMA_VERSION,
                    max: schema::CURRENT_SCHEMA_VERSION,
                });
            }
            Some(mut v) => {
                while v != schema::CURRENT_SCHEMA_VERSION {
                    let step = schema::UPGRADES
                        .iter()
                        .find(|u| u.from == v)
                        .ok_or_else(|| StorageError::SchemaUpgrade {
                            from: v,
                            to: schema::CURRENT_SCHEMA_VERSION,
                            reason: "no upgrade step registered".to_string(),
                        })?;
                    let conn = self.lock()?;
                    for stmt in step.statements {
                        conn.execute_batch(stmt).map_err(|e| StorageError::SchemaUpgrade {
                            from: step.from,
                            to: step.to,
                            reason: e.to_string(),
                        })?;
                    }
                    drop(conn);
                    warn!(from = step.from, to = step.to, "applied schema-extension upgrade");
                    v = step.to;
                    self.write_schema_version(rid, sid, v)?;
                }
            }
        }

        Ok(())
    }

    fn read_schema_version(&self, rid: &str, sid: &str) -> Result<Option<i32>> {
        let conn = self.lock()?;
        let v: rusqlite::Result<String> = conn.query_row(
            "SELECT config_value FROM p4dti_config WHERE rid = ?1 AND sid = ?2 AND config_key = 'schema_version'",
            rusqlite::params![rid, sid],
            |row| row.get(0),
        );
        match v {
            Ok(s) => Ok(Some(s.parse::<i32>().map_err(|e| {
                StorageError::Internal(format!("corrupt schema_version value: {e}"))
            })?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Query(e)),
        }
    }

    fn write_schema_version(&self, rid: &str, sid: &str, version: i32) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO p4dti_config (rid, sid, config_key, config_value) VALUES (?1, ?2, 'schema_version', ?3)
             ON CONFLICT(rid, sid, config_key) DO UPDATE SET config_value = excluded.config_value",
            rusqlite::params![rid, sid, version.to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_schema_is_idempotent_and_seeds_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema("DT", "p4.example.com").unwrap();
        store.init_schema("DT", "p4.example.com").unwrap();

        let v = store.read_schema_version("DT", "p4.example.com").unwrap();
        assert_eq!(v, Some(schema::CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn future_version_is_fatal() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema("DT", "p4.example.com").unwrap();
        store
            .write_schema_version("DT", "p4.example.com", schema::CURRENT_SCHEMA_VERSION + 99)
            .unwrap();

        let err = store.init_schema("DT", "p4.example.com");
        assert!(matches!(err, Err(StorageError::UnsupportedSchemaVersion { .. })));
    }
}
