//! `changed_issues_since`: the three-way disjoint classification of
//! issues touched since the last poll fence.
//!
//! An issue falls into exactly one class relative to a fence timestamp:
//!
//! - [`ChangeClass::New`][NewVariant]: created after the fence.
//! - touched but every changed field's activity-log row has a matching
//!   row in the replicator's own mirror log (this cycle's self-echo --
//!   the replicator wrote it last cycle and is now seeing its own
//!   write reflected back) -- excluded from the result entirely.
//! - changed by somebody other than the replicator itself -- the only
//!   class that needs replicating onward.
//!
//! [NewVariant]: p4dti_core::enums::ChangeClass::IssueOnly

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

/// True iff `issue_id` is linked to this `(rid, sid)` and that link's
/// `migrated` timestamp is set and falls at or after `fence`. Such a
/// row was stamped by a migration this cycle (or a resumed one) and
/// must not be reported as changed solely because of that stamp --
/// `mark_migrated` writes no activity-log row, so without this check
/// the issue would look freshly created/touched to the caller.
fn migrated_at_or_after_fence(
    conn: &Connection,
    issue_id: i64,
    rid: &str,
    sid: &str,
    fence_str: &Option<String>,
) -> Result<bool> {
    let Some(fence) = fence_str else {
        return Ok(false);
    };
    let migrated: Option<String> = conn
        .query_row(
            "SELECT migrated FROM p4dti_link WHERE issue_id = ?1 AND rid = ?2 AND sid = ?3",
            params![issue_id, rid, sid],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    Ok(matches!(migrated, Some(m) if &m >= fence))
}

/// The result of a `changed_issues_since` scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedIssues {
    /// Created since the fence.
    pub new: Vec<i64>,
    /// Modified since the fence by something other than this replicator.
    pub changed: Vec<i64>,
}

impl SqliteStore {
    /// Classifies every issue touched since `fence` (or every issue, if
    /// `fence` is `None`, e.g. a first-ever poll or a full refresh).
    pub fn changed_issues_since_impl(
        &self,
        fence: Option<DateTime<Utc>>,
        rid: &str,
        sid: &str,
    ) -> Result<ChangedIssues> {
        let fence_str = fence.map(|f| f.to_rfc3339());
        let conn = self.lock()?;

        let mut new = Vec::new();
        let mut candidates: HashSet<i64> = HashSet::new();

        {
            let mut stmt = match &fence_str {
                Some(f) => conn.prepare("SELECT issue_id, creation_ts FROM issues WHERE creation_ts > ?1 OR delta_ts > ?1")?,
                None => conn.prepare("SELECT issue_id, creation_ts FROM issues")?,
            };
            let mut rows = match &fence_str {
                Some(f) => stmt.query(params![f])?,
                None => stmt.query([])?,
            };
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let creation_ts: String = row.get(1)?;
                let is_new = match &fence_str {
                    Some(f) => &creation_ts > f,
                    None => true,
                };
                if is_new {
                    if migrated_at_or_after_fence(&conn, id, rid, sid, &fence_str)? {
                        continue;
                    }
                    new.push(id);
                } else {
                    candidates.insert(id);
                }
            }
        }

        let mut changed = Vec::new();
        for issue_id in candidates {
            let mut activity_stmt = conn.prepare(
                "SELECT field, old_value, new_value FROM activity_log \
                 WHERE issue_id = ?1 AND (?2 IS NULL OR when_ts > ?2)",
            )?;
            let activity_rows: Vec<(String, String, String)> = activity_stmt
                .query_map(params![issue_id, fence_str], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            if activity_rows.is_empty() {
                // Class 2: touched (delta_ts advanced) but no activity-log
                // row in the window. Only counts as "changed" if the link
                // isn't freshly migrated -- a migration stamps `migrated`
                // without an activity-log row, and that alone must not
                // make the issue look externally changed.
                if !migrated_at_or_after_fence(&conn, issue_id, rid, sid, &fence_str)? {
                    changed.push(issue_id);
                }
                continue;
            }

            let mut mirror_stmt = conn.prepare(
                "SELECT field, old_value, new_value FROM p4dti_mirror_activity_log \
                 WHERE issue_id = ?1 AND rid = ?2 AND sid = ?3 AND (?4 IS NULL OR when_ts > ?4)",
            )?;
            let mirror_rows: HashSet<(String, String, String)> = mirror_stmt
                .query_map(params![issue_id, rid, sid, fence_str], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<rusqlite::Result<HashSet<_>>>()?;

            let all_self_echo = activity_rows.iter().all(|r| mirror_rows.contains(r));
            if !all_self_echo {
                changed.push(issue_id);
            }
        }

        Ok(ChangedIssues { new, changed })
    }

    /// All issues, disjoint sets skipped: used by migration and refresh
    /// modes, which process everything regardless of self-echo.
    pub fn all_issues_impl(&self) -> Result<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT issue_id FROM issues ORDER BY issue_id")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::issues::NewIssue;
    use p4dti_core::issue::IssueUpdates;
    use p4dti_core::validation::IssueInvariants;

    fn store() -> SqliteStore {
        let s = SqliteStore::open_in_memory().unwrap();
        s.init_schema("DT", "p4.example.com").unwrap();
        s
    }

    #[test]
    fn freshly_created_issue_is_new_on_first_poll() {
        let store = store();
        store
            .new_issue_impl(NewIssue {
                summary: "x".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();

        let result = store.changed_issues_since_impl(None, "DT", "p4.example.com").unwrap();
        assert_eq!(result.new.len(), 1);
        assert!(result.changed.is_empty());
    }

    #[test]
    fn self_echoed_change_is_excluded() {
        let store = store();
        let issue = store
            .new_issue_impl(NewIssue {
                summary: "x".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        let fence = Some(Utc::now());
        std::thread::sleep(std::time::Duration::from_millis(5));

        let mut updates = IssueUpdates::default();
        updates.assignee = Some("bob".into());
        store
            .update_impl(
                issue.issue_id,
                &updates,
                "p4dti",
                &IssueInvariants::default(),
                true,
                Some(("DT", "p4.example.com")),
            )
            .unwrap();

        let result = store.changed_issues_since_impl(fence, "DT", "p4.example.com").unwrap();
        assert!(result.new.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn externally_changed_issue_is_reported() {
        let store = store();
        let issue = store
            .new_issue_impl(NewIssue {
                summary: "x".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        let fence = Some(Utc::now());
        std::thread::sleep(std::time::Duration::from_millis(5));

        let mut updates = IssueUpdates::default();
        updates.assignee = Some("bob".into());
        store
            .update_impl(
                issue.issue_id,
                &updates,
                "alice",
                &IssueInvariants::default(),
                true,
                None,
            )
            .unwrap();

        let result = store.changed_issues_since_impl(fence, "DT", "p4.example.com").unwrap();
        assert_eq!(result.changed, vec![issue.issue_id]);
    }

    #[test]
    fn migrated_issue_is_not_reported_new_on_the_next_poll() {
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
        store
            .mark_migrated_impl(issue.issue_id, "DT", "p4.example.com", "job000123")
            .unwrap();

        // The fence for the poll right after migration predates the
        // issue's creation_ts/migrated stamp, same as a real cycle
        // where the previous mark was taken before migration ran.
        let fence = Some(issue.creation_ts - chrono::Duration::seconds(1));

        let result = store.changed_issues_since_impl(fence, "DT", "p4.example.com").unwrap();
        assert!(result.new.is_empty());
        assert!(result.changed.is_empty());
    }
}
