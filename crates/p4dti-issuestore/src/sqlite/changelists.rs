//! Mirrored `p4dti_changelists` rows: side-1 revisions kept queryable
//! alongside issues.

use chrono::{DateTime, Utc};
use rusqlite::params;

use p4dti_core::changelist::Changelist;

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

fn row_to_changelist(row: &rusqlite::Row<'_>) -> rusqlite::Result<Changelist> {
    let date: String = row.get("date")?;
    Ok(Changelist {
        change: row.get("change")?,
        user: row.get("user")?,
        client: row.get("client")?,
        description: row.get("description")?,
        status: row.get("status")?,
        date: parse_ts(&date),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteStore {
    pub(crate) fn changelist_impl(&self, change: i64, rid: &str, sid: &str) -> Result<Option<Changelist>> {
        use rusqlite::OptionalExtension;
        let conn = self.lock()?;
        conn.query_row(
            "SELECT change, user, flags, description, client, date, status FROM p4dti_changelists \
             WHERE change = ?1 AND rid = ?2 AND sid = ?3",
            params![change, rid, sid],
            row_to_changelist,
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn set_changelist_impl(&self, cl: &Changelist, rid: &str, sid: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO p4dti_changelists (change, rid, sid, user, flags, description, client, date, status) \
             VALUES (?1, ?2, ?3, ?4, '', ?5, ?6, ?7, ?8) \
             ON CONFLICT(change, rid, sid) \
             DO UPDATE SET user = excluded.user, description = excluded.description, \
                 client = excluded.client, date = excluded.date, status = excluded.status",
            params![
                cl.change,
                rid,
                sid,
                cl.user,
                cl.description,
                cl.client,
                cl.date.to_rfc3339(),
                cl.status,
            ],
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
    fn set_then_read_back_changelist() {
        let store = store();
        let cl = Changelist {
            change: 100,
            user: "alice".into(),
            client: "alice-ws".into(),
            description: "fix widget".into(),
            status: "submitted".into(),
            date: Utc::now(),
        };
        store.set_changelist_impl(&cl, "DT", "p4.example.com").unwrap();

        let fetched = store.changelist_impl(100, "DT", "p4.example.com").unwrap().unwrap();
        assert_eq!(fetched.description, "fix widget");
    }

    #[test]
    fn missing_changelist_is_none() {
        let store = store();
        assert!(store.changelist_impl(1, "DT", "p4.example.com").unwrap().is_none());
    }
}
