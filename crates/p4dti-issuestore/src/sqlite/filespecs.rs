//! Mirrored `p4dti_filespecs` rows.

use rusqlite::params;

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

impl SqliteStore {
    pub(crate) fn filespecs_for_issue_impl(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT filespec FROM p4dti_filespecs WHERE issue_id = ?1 AND rid = ?2 AND sid = ?3",
        )?;
        let rows = stmt
            .query_map(params![issue_id, rid, sid], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub(crate) fn add_filespec_impl(&self, issue_id: i64, rid: &str, sid: &str, filespec: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO p4dti_filespecs (issue_id, rid, sid, filespec) VALUES (?1, ?2, ?3, ?4)",
            params![issue_id, rid, sid, filespec],
        )?;
        Ok(())
    }

    pub(crate) fn remove_filespec_impl(&self, issue_id: i64, rid: &str, sid: &str, filespec: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM p4dti_filespecs WHERE issue_id = ?1 AND rid = ?2 AND sid = ?3 AND filespec = ?4",
            params![issue_id, rid, sid, filespec],
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
    fn add_and_remove_filespec() {
        let store = store();
        let issue = store
            .new_issue_impl(NewIssue {
                summary: "x".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        store
            .add_filespec_impl(issue.issue_id, "DT", "p4.example.com", "//depot/a/...")
            .unwrap();
        assert_eq!(
            store.filespecs_for_issue_impl(issue.issue_id, "DT", "p4.example.com").unwrap(),
            vec!["//depot/a/...".to_string()]
        );

        store
            .remove_filespec_impl(issue.issue_id, "DT", "p4.example.com", "//depot/a/...")
            .unwrap();
        assert!(store
            .filespecs_for_issue_impl(issue.issue_id, "DT", "p4.example.com")
            .unwrap()
            .is_empty());
    }
}
