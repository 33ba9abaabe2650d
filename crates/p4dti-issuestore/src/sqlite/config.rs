//! Generic `p4dti_config` key/value access, scoped to `(rid, sid)`.
//!
//! `schema_version` is the one reserved key this crate writes itself
//! (see [`crate::sqlite::store`]); everything else is free for the
//! replicator core to stash counters and fence timestamps in.

use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

impl SqliteStore {
    pub(crate) fn config_get_impl(&self, rid: &str, sid: &str, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT config_value FROM p4dti_config WHERE rid = ?1 AND sid = ?2 AND config_key = ?3",
            params![rid, sid, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn config_set_impl(&self, rid: &str, sid: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO p4dti_config (rid, sid, config_key, config_value) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(rid, sid, config_key) DO UPDATE SET config_value = excluded.config_value",
            params![rid, sid, key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let s = SqliteStore::open_in_memory().unwrap();
        s.init_schema("DT", "p4.example.com").unwrap();
        s
    }

    #[test]
    fn get_set_round_trips() {
        let store = store();
        assert!(store.config_get_impl("DT", "p4.example.com", "last_job").unwrap().is_none());
        store.config_set_impl("DT", "p4.example.com", "last_job", "job000042").unwrap();
        assert_eq!(
            store.config_get_impl("DT", "p4.example.com", "last_job").unwrap(),
            Some("job000042".to_string())
        );
    }
}
