//! Pairing logic (SPEC_FULL.md 4.4.1/4.4.2): combines a poll cycle's
//! changed issue ids and changed jobs into dispatch candidates, each
//! carrying the [`ChangeClass`] that decides which direction (or both)
//! is replicated.
//!
//! A job already linked to a changed issue becomes a `Both` candidate.
//! A linked job that changed alone is `JobOnly`. An unlinked job that
//! changed is `JobOnly` with no issue yet -- the dispatch step creates
//! one. An issue that changed without a corresponding job change is
//! `IssueOnly`; its jobname is resolved via the existing link row if one
//! exists, or left `None` for the dispatch step to create a job and
//! link it.

use std::collections::{HashMap, HashSet};

use p4dti_core::enums::ChangeClass;
use p4dti_core::job::Job;

/// One (issue, job) dispatch candidate for this poll cycle.
#[derive(Debug, Clone)]
pub struct Pair {
    pub issue_id: Option<i64>,
    pub jobname: Option<String>,
    pub class: ChangeClass,
}

/// Builds this cycle's dispatch candidates.
///
/// `existing_link` resolves a changed issue id with no job-side
/// counterpart in `changed_jobs` to its already-linked jobname, if any
/// (a query against the link table; the job itself did not change this
/// cycle so it is not present in `changed_jobs`).
pub fn build_pairs(
    changed_issue_ids: &[i64],
    changed_jobs: &[Job],
    existing_link: impl Fn(i64) -> Option<String>,
) -> Vec<Pair> {
    let mut issue_changed: HashSet<i64> = changed_issue_ids.iter().copied().collect();
    let mut pairs = Vec::new();

    for job in changed_jobs {
        match job.issue_id {
            Some(issue_id) => {
                let class = if issue_changed.remove(&issue_id) {
                    ChangeClass::Both
                } else {
                    ChangeClass::JobOnly
                };
                pairs.push(Pair { issue_id: Some(issue_id), jobname: Some(job.name.clone()), class });
            }
            None => {
                pairs.push(Pair { issue_id: None, jobname: Some(job.name.clone()), class: ChangeClass::JobOnly });
            }
        }
    }

    let mut remaining: Vec<i64> = issue_changed.into_iter().collect();
    remaining.sort();
    for issue_id in remaining {
        let jobname = existing_link(issue_id);
        pairs.push(Pair { issue_id: Some(issue_id), jobname, class: ChangeClass::IssueOnly });
    }

    pairs
}

/// Keys each pair as `(class, issue_id-or-jobname)` for the "appears at
/// most once" testable property.
pub fn dedup_key(pair: &Pair) -> (u8, String) {
    let class = match pair.class {
        ChangeClass::IssueOnly => 0,
        ChangeClass::JobOnly => 1,
        ChangeClass::Both => 2,
    };
    let id = match (&pair.issue_id, &pair.jobname) {
        (Some(i), _) => i.to_string(),
        (None, Some(j)) => j.clone(),
        (None, None) => String::new(),
    };
    (class, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn job(name: &str, issue_id: Option<i64>) -> Job {
        Job { name: name.to_string(), rid: issue_id.map(|_| "DT".to_string()), issue_id, user: String::new(), fields: BTreeMap::new() }
    }

    #[test]
    fn linked_job_and_changed_issue_is_both() {
        let pairs = build_pairs(&[1], &[job("job1", Some(1))], |_| None);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].class, ChangeClass::Both);
    }

    #[test]
    fn linked_job_alone_is_job_only() {
        let pairs = build_pairs(&[], &[job("job1", Some(1))], |_| None);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].class, ChangeClass::JobOnly);
    }

    #[test]
    fn unlinked_job_is_job_only_with_no_issue() {
        let pairs = build_pairs(&[], &[job("job2", None)], |_| None);
        assert_eq!(pairs[0].issue_id, None);
        assert_eq!(pairs[0].class, ChangeClass::JobOnly);
    }

    #[test]
    fn changed_issue_without_job_change_resolves_existing_link() {
        let pairs = build_pairs(&[5], &[], |id| if id == 5 { Some("job5".to_string()) } else { None });
        assert_eq!(pairs[0].class, ChangeClass::IssueOnly);
        assert_eq!(pairs[0].jobname.as_deref(), Some("job5"));
    }

    #[test]
    fn changed_issue_with_no_link_is_issue_only_with_no_job() {
        let pairs = build_pairs(&[9], &[], |_| None);
        assert_eq!(pairs[0].class, ChangeClass::IssueOnly);
        assert_eq!(pairs[0].jobname, None);
    }

    #[test]
    fn no_pair_appears_twice() {
        let pairs = build_pairs(&[1, 2], &[job("job1", Some(1))], |id| if id == 2 { Some("job2".into()) } else { None });
        let mut keys: Vec<_> = pairs.iter().map(dedup_key).collect();
        let len_before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), len_before);
    }
}
