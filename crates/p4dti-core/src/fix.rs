//! Fix records: associations between an issue and a changelist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::FixStatus;

/// A fix, as held independently on each side. The replicator mirrors
/// side-1 fixes into a side-0 table keyed by `(change, issue_id, rid, sid)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub change: i64,
    pub issue_id: i64,
    pub status: FixStatus,
    pub user: String,
    #[serde(default)]
    pub client: String,
    pub date: DateTime<Utc>,
}

/// The result of diffing one side's fix set against the other's for a
/// single issue, keyed by changelist number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixDiff {
    /// Present on side 1 only -- add to side 0.
    pub add_to_issue: Vec<Fix>,
    /// Present on side 0 only -- add to side 1.
    pub add_to_job: Vec<Fix>,
    /// Present on both sides with differing status -- pairs of
    /// (job-side, issue-side) fixes to reconcile.
    pub status_mismatch: Vec<(Fix, Fix)>,
}

/// Computes the three-way diff between a job's fixes and an issue's
/// mirrored fixes, keyed by change number.
pub fn diff_fixes(job_fixes: &[Fix], issue_fixes: &[Fix]) -> FixDiff {
    use std::collections::HashMap;

    let mut by_change: HashMap<i64, (Option<&Fix>, Option<&Fix>)> = HashMap::new();
    for f in job_fixes {
        by_change.entry(f.change).or_default().0 = Some(f);
    }
    for f in issue_fixes {
        by_change.entry(f.change).or_default().1 = Some(f);
    }

    let mut diff = FixDiff::default();
    for (_, (job_fix, issue_fix)) in by_change {
        match (job_fix, issue_fix) {
            (Some(j), None) => diff.add_to_issue.push(j.clone()),
            (None, Some(i)) => diff.add_to_job.push(i.clone()),
            (Some(j), Some(i)) if j.status != i.status => {
                diff.status_mismatch.push((j.clone(), i.clone()))
            }
            _ => {}
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(change: i64, issue_id: i64, status: FixStatus) -> Fix {
        Fix {
            change,
            issue_id,
            status,
            user: "alice".into(),
            client: String::new(),
            date: Utc::now(),
        }
    }

    #[test]
    fn diff_fixes_partitions_add_and_mismatch() {
        let job_fixes = vec![
            fix(1, 10, FixStatus::Open),
            fix(2, 10, FixStatus::Closed),
        ];
        let issue_fixes = vec![fix(2, 10, FixStatus::Open), fix(3, 10, FixStatus::Open)];

        let diff = diff_fixes(&job_fixes, &issue_fixes);
        assert_eq!(diff.add_to_issue.len(), 1);
        assert_eq!(diff.add_to_issue[0].change, 1);
        assert_eq!(diff.add_to_job.len(), 1);
        assert_eq!(diff.add_to_job[0].change, 3);
        assert_eq!(diff.status_mismatch.len(), 1);
        assert_eq!(diff.status_mismatch[0].0.change, 2);
    }

    #[test]
    fn diff_fixes_empty_when_identical() {
        let fixes = vec![fix(1, 10, FixStatus::Open)];
        let diff = diff_fixes(&fixes, &fixes);
        assert!(diff.add_to_issue.is_empty());
        assert!(diff.add_to_job.is_empty());
        assert!(diff.status_mismatch.is_empty());
    }
}
