//! The `p4dti_link` row: the (issue, job) pairing owned by a single
//! `(rid, sid)` replicator instance.

use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub issue_id: i64,
    pub rid: String,
    pub sid: String,
    pub jobname: String,
    /// Set once this pairing has been migrated (vs. deduced by jobname
    /// convention); `None` until migration completes.
    pub migrated: Option<String>,
}

impl SqliteStore {
    pub(crate) fn link_by_issue_impl(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Option<Link>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT issue_id, rid, sid, jobname, migrated FROM p4dti_link \
             WHERE issue_id = ?1 AND rid = ?2 AND sid = ?3",
            params![issue_id, rid, sid],
            |row| {
                Ok(Link {
                    issue_id: row.get(0)?,
                    rid: row.get(1)?,
                    sid: row.get(2)?,
                    jobname: row.get(3)?,
                    migrated: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn link_by_jobname_impl(&self, jobname: &str, rid: &str, sid: &str) -> Result<Option<Link>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT issue_id, rid, sid, jobname, migrated FROM p4dti_link \
             WHERE jobname = ?1 AND rid = ?2 AND sid = ?3",
            params![jobname, rid, sid],
            |row| {
                Ok(Link {
                    issue_id: row.get(0)?,
                    rid: row.get(1)?,
                    sid: row.get(2)?,
                    jobname: row.get(3)?,
                    migrated: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn set_link_impl(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO p4dti_link (issue_id, rid, sid, jobname) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(issue_id, rid, sid) DO UPDATE SET jobname = excluded.jobname",
            params![issue_id, rid, sid, jobname],
        )?;
        Ok(())
    }

    pub(crate) fn mark_migrated_impl(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> Result<()> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE p4dti_link SET migrated = ?5 WHERE issue_id = ?1 AND rid = ?2 AND sid = ?3 AND jobname = ?4",
            params![issue_id, rid, sid, jobname, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::issues::NewIssue;

    fn store() -> SqliteStore {
        let s = SqliteStore::open_in_memory().unwrap();
        s.init_schema("DT", "p4.example.com").unwrap();
        s
    }

    #[test]
    fn set_and_look_up_link_both_directions() {
        let store = store();
        let issue = store
            .new_issue_impl(NewIssue {
                summary: "x".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        store
            .set_link_impl(issue.issue_id, "DT", "p4.example.com", "job000123")
            .unwrap();

        let by_issue = store
            .link_by_issue_impl(issue.issue_id, "DT", "p4.example.com")
            .unwrap()
            .unwrap();
        assert_eq!(by_issue.jobname, "job000123");

        let by_name = store
            .link_by_jobname_impl("job000123", "DT", "p4.example.com")
            .unwrap()
            .unwrap();
        assert_eq!(by_name.issue_id, issue.issue_id);
    }
}
