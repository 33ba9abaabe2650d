//! Mirrored `p4dti_fixes` rows: issue/changelist associations.

use chrono::{DateTime, Utc};
use rusqlite::params;

use p4dti_core::enums::FixStatus;
use p4dti_core::fix::Fix;

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

fn row_to_fix(row: &rusqlite::Row<'_>) -> rusqlite::Result<Fix> {
    let status: String = row.get("status")?;
    let date: String = row.get("date")?;
    Ok(Fix {
        change: row.get("change")?,
        issue_id: row.get("issue_id")?,
        status: FixStatus::from(status),
        user: row.get("user")?,
        client: row.get("client")?,
        date: parse_ts(&date),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteStore {
    pub(crate) fn fixes_for_issue_impl(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Vec<Fix>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT change, issue_id, user, client, status, date FROM p4dti_fixes \
             WHERE issue_id = ?1 AND rid = ?2 AND sid = ?3",
        )?;
        let rows = stmt
            .query_map(params![issue_id, rid, sid], row_to_fix)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub(crate) fn set_fix_impl(&self, fix: &Fix, rid: &str, sid: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO p4dti_fixes (change, issue_id, rid, sid, user, client, status, date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(change, issue_id, rid, sid) \
             DO UPDATE SET user = excluded.user, client = excluded.client, \
                 status = excluded.status, date = excluded.date",
            params![
                fix.change,
                fix.issue_id,
                rid,
                sid,
                fix.user,
                fix.client,
                fix.status.as_str(),
                fix.date.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn delete_fix_impl(&self, change: i64, issue_id: i64, rid: &str, sid: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM p4dti_fixes WHERE change = ?1 AND issue_id = ?2 AND rid = ?3 AND sid = ?4",
            params![change, issue_id, rid, sid],
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
    fn set_then_read_back_fix() {
        let store = store();
        let issue = store
            .new_issue_impl(NewIssue {
                summary: "x".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        let fix = Fix {
            change: 42,
            issue_id: issue.issue_id,
            status: FixStatus::Open,
            user: "alice".into(),
            client: "alice-ws".into(),
            date: Utc::now(),
        };
        store.set_fix_impl(&fix, "DT", "p4.example.com").unwrap();

        let fixes = store.fixes_for_issue_impl(issue.issue_id, "DT", "p4.example.com").unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].change, 42);
    }
}
