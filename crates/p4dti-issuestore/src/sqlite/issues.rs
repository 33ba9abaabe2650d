//! Issue CRUD and the invariant-enforcing update path.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use p4dti_core::enums::Status;
use p4dti_core::issue::{FieldValue, Issue, IssueUpdates};
use p4dti_core::validation::IssueInvariants;

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;

/// Fields supplied when creating a new issue. Mirrors the typed-partial
/// pattern used for updates rather than an untyped map.
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    pub summary: String,
    pub reporter: String,
    pub assignee: String,
    pub status: Option<Status>,
    pub description: String,
    pub component: String,
    pub version: String,
    pub product: String,
}

pub(crate) fn row_to_issue(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let extra_json: String = row.get("extra_json")?;
    let extra: std::collections::BTreeMap<String, FieldValue> =
        serde_json::from_str(&extra_json).unwrap_or_default();
    let status: String = row.get("status")?;
    let creation_ts: String = row.get("creation_ts")?;
    let delta_ts: String = row.get("delta_ts")?;

    Ok(Issue {
        issue_id: row.get("issue_id")?,
        status: Status::from(status),
        assignee: row.get("assignee")?,
        reporter: row.get("reporter")?,
        summary: row.get("summary")?,
        description: row.get("description")?,
        component: row.get("component")?,
        version: row.get("version")?,
        product: row.get("product")?,
        resolution: row.get("resolution")?,
        extra,
        creation_ts: parse_ts(&creation_ts),
        delta_ts: parse_ts(&delta_ts),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

const ISSUE_COLUMNS: &str = "issue_id, status, assignee, reporter, summary, description, \
    component, version, product, resolution, extra_json, creation_ts, delta_ts";

impl SqliteStore {
    pub(crate) fn issue_impl(&self, id: i64) -> Result<Issue> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?1"),
            params![id],
            row_to_issue,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StorageError::not_found("issue", id.to_string())
            }
            other => StorageError::Query(other),
        })
    }

    /// Default the fixed classification fields (product/component/version)
    /// to the single existing distinct value in the table, if any,
    /// mirroring `new_issue`'s "supplied defaults when a single candidate
    /// exists" behavior.
    fn default_classification_field(&self, column: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let sql = format!("SELECT DISTINCT {column} FROM issues WHERE {column} != ''");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut candidate = None;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let v: String = row.get(0)?;
            candidate = Some(v);
            count += 1;
            if count > 1 {
                return Ok(None);
            }
        }
        Ok(if count == 1 { candidate } else { None })
    }

    pub(crate) fn new_issue_impl(&self, mut new: NewIssue) -> Result<Issue> {
        if new.component.is_empty() {
            if let Some(v) = self.default_classification_field("component")? {
                new.component = v;
            }
        }
        if new.version.is_empty() {
            if let Some(v) = self.default_classification_field("version")? {
                new.version = v;
            }
        }
        if new.product.is_empty() {
            if let Some(v) = self.default_classification_field("product")? {
                new.product = v;
            }
        }

        let status = new.status.unwrap_or_default();
        let now = fmt_ts(Utc::now());

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO issues (status, assignee, reporter, summary, description, component, \
             version, product, resolution, extra_json, creation_ts, delta_ts) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '', '{}', ?9, ?9)",
            params![
                status.as_str(),
                new.assignee,
                new.reporter,
                new.summary,
                new.description,
                new.component,
                new.version,
                new.product,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.append_activity(id, &new.reporter, "status", "", status.as_str(), None)?;
        self.issue_impl(id)
    }

    /// Validates and applies `updates` against the invariant policy,
    /// writes changed fields, and appends one row per changed field to
    /// the native activity log. If `mirror` is `Some((rid, sid))` the
    /// same rows are additionally appended to the replicator-owned
    /// mirror activity log within the same critical section, so a
    /// subsequent `changed_issues_since` scan recognizes this as the
    /// replicator's own write.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_impl(
        &self,
        id: i64,
        updates: &IssueUpdates,
        user: &str,
        invariants: &IssueInvariants,
        permitted: bool,
        mirror: Option<(&str, &str)>,
    ) -> Result<Issue> {
        let issue = self.issue_impl(id)?;
        let applied = invariants.check_update(&issue, updates, user, permitted)?;

        if applied.is_empty() {
            return Ok(issue);
        }

        let mut changes: Vec<(String, String, String)> = Vec::new();
        macro_rules! collect_fixed {
            ($field:ident, $name:expr, $old:expr) => {
                if let Some(new) = &applied.$field {
                    let new_str = new.to_string();
                    if &new_str != $old {
                        changes.push(($name.to_string(), $old.clone(), new_str));
                    }
                }
            };
        }
        collect_fixed!(status, "status", issue.status.as_str().to_string());
        collect_fixed!(assignee, "assignee", issue.assignee);
        collect_fixed!(reporter, "reporter", issue.reporter);
        collect_fixed!(summary, "summary", issue.summary);
        collect_fixed!(description, "description", issue.description);
        collect_fixed!(component, "component", issue.component);
        collect_fixed!(version, "version", issue.version);
        collect_fixed!(product, "product", issue.product);
        collect_fixed!(resolution, "resolution", issue.resolution);

        for (field, new_value) in &applied.extra {
            let old = issue
                .extra
                .get(field)
                .and_then(FieldValue::as_text)
                .unwrap_or("")
                .to_string();
            let new_str = new_value.as_text().unwrap_or("").to_string();
            if old != new_str {
                changes.push((field.clone(), old, new_str));
            }
        }

        if changes.is_empty() {
            return Ok(issue);
        }

        let mut merged_extra = issue.extra.clone();
        for (k, v) in &applied.extra {
            merged_extra.insert(k.clone(), v.clone());
        }
        let extra_json = serde_json::to_string(&merged_extra)?;
        let now = fmt_ts(Utc::now());

        {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE issues SET status = ?1, assignee = ?2, reporter = ?3, summary = ?4, \
                 description = ?5, component = ?6, version = ?7, product = ?8, resolution = ?9, \
                 extra_json = ?10, delta_ts = ?11 WHERE issue_id = ?12",
                params![
                    applied.status.as_ref().map(|s| s.as_str().to_string()).unwrap_or(issue.status.as_str().to_string()),
                    applied.assignee.clone().unwrap_or(issue.assignee.clone()),
                    applied.reporter.clone().unwrap_or(issue.reporter.clone()),
                    applied.summary.clone().unwrap_or(issue.summary.clone()),
                    applied.description.clone().unwrap_or(issue.description.clone()),
                    applied.component.clone().unwrap_or(issue.component.clone()),
                    applied.version.clone().unwrap_or(issue.version.clone()),
                    applied.product.clone().unwrap_or(issue.product.clone()),
                    applied.resolution.clone().unwrap_or(issue.resolution.clone()),
                    extra_json,
                    now,
                    id,
                ],
            )?;
        }

        let when = Utc::now();
        for (field, old, new) in &changes {
            self.append_activity(id, user, field, old, new, Some(when))?;
            if let Some((rid, sid)) = mirror {
                self.append_mirror_activity(id, user, field, old, new, when, rid, sid)?;
            }
        }

        self.issue_impl(id)
    }

    pub(crate) fn delete_impl(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM issues WHERE issue_id = ?1", params![id])?;
        if n == 0 {
            return Err(StorageError::not_found("issue", id.to_string()));
        }
        Ok(())
    }

    pub(crate) fn append_activity(
        &self,
        issue_id: i64,
        who: &str,
        field: &str,
        old: &str,
        new: &str,
        when: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO activity_log (issue_id, when_ts, who, field, old_value, new_value) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![issue_id, fmt_ts(when.unwrap_or_else(Utc::now)), who, field, old, new],
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn append_mirror_activity(
        &self,
        issue_id: i64,
        who: &str,
        field: &str,
        old: &str,
        new: &str,
        when: DateTime<Utc>,
        rid: &str,
        sid: &str,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO p4dti_mirror_activity_log \
             (issue_id, when_ts, who, field, old_value, new_value, rid, sid) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![issue_id, fmt_ts(when), who, field, old, new, rid, sid],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4dti_core::validation::IssueInvariants;

    fn store() -> SqliteStore {
        let s = SqliteStore::open_in_memory().unwrap();
        s.init_schema("DT", "p4.example.com").unwrap();
        s
    }

    #[test]
    fn create_and_read_round_trips() {
        let store = store();
        let issue = store
            .new_issue_impl(NewIssue {
                summary: "Widget broken".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(issue.summary, "Widget broken");
        assert_eq!(issue.status, Status::Open);

        let fetched = store.issue_impl(issue.issue_id).unwrap();
        assert_eq!(fetched, issue);
    }

    #[test]
    fn update_writes_activity_log_and_mirror() {
        let store = store();
        let issue = store
            .new_issue_impl(NewIssue {
                summary: "Widget broken".into(),
                reporter: "alice".into(),
                ..Default::default()
            })
            .unwrap();

        let mut updates = IssueUpdates::default();
        updates.assignee = Some("bob".into());
        let updated = store
            .update_impl(
                issue.issue_id,
                &updates,
                "bob",
                &IssueInvariants::default(),
                true,
                Some(("DT", "p4.example.com")),
            )
            .unwrap();
        assert_eq!(updated.assignee, "bob");

        let conn = store.lock().unwrap();
        let mirror_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM p4dti_mirror_activity_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mirror_count, 1);
    }

    #[test]
    fn delete_missing_issue_is_not_found() {
        let store = store();
        let err = store.delete_impl(999);
        assert!(matches!(err, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn classification_field_defaults_when_single_candidate() {
        let store = store();
        store
            .new_issue_impl(NewIssue {
                summary: "first".into(),
                reporter: "alice".into(),
                product: "Widgets".into(),
                ..Default::default()
            })
            .unwrap();

        let second = store
            .new_issue_impl(NewIssue {
                summary: "second".into(),
                reporter: "bob".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(second.product, "Widgets");
    }
}
