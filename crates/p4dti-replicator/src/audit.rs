//! Consistency audit (SPEC_FULL.md 4.4.6): a read-only pass that
//! re-translates each linked pair and reports every discrepancy it
//! finds, without writing anything to either side.

use p4dti_core::filespec::{diff_filespecs, parse_job_filespecs_field};
use p4dti_core::fix::diff_fixes;
use p4dti_core::job::FIELD_NAME_FILESPECS;
use p4dti_issuestore::IssueStore;
use p4dti_jobstore::JobStore;
use p4dti_notify::Notifier;

use crate::error::Result;
use crate::replicator::Replicator;

/// One discrepancy found by the audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// An issue should be replicated (it is not excluded by the
    /// predicate) but carries no link row.
    UnlinkedIssue { issue_id: i64 },
    /// The link row names a job that no longer exists.
    LinkedToNonexistentJob { issue_id: i64, jobname: String },
    /// The job's own link field disagrees with the issue-side link row.
    AsymmetricLink { issue_id: i64, jobname: String, job_says_issue_id: Option<i64> },
    /// Translating the current job would produce a non-empty issue
    /// changeset (or vice versa): the two sides have drifted.
    FieldDivergence { issue_id: i64, jobname: String },
    /// The issue and job fix sets differ.
    FixMismatch { issue_id: i64, jobname: String },
    /// The issue and job filespec sets differ.
    FilespecMismatch { issue_id: i64, jobname: String },
    /// A job is marked with this rid but its issue counterpart does not
    /// link back to it.
    OrphanJob { jobname: String },
}

/// The audit's complete findings, plus the discrepancy tally named by
/// the spec's "terminates with a tally of `n` discrepancies".
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub discrepancies: Vec<Discrepancy>,
}

impl AuditReport {
    pub fn tally(&self) -> usize {
        self.discrepancies.len()
    }
}

impl<I: IssueStore, J: JobStore, N: Notifier> Replicator<I, J, N> {
    pub fn audit(&self) -> Result<AuditReport> {
        let rid = self.config().rid.clone();
        let sid = self.config().sid.clone();
        let user = self.build_user_translator()?;

        let mut report = AuditReport::default();
        let issue_ids = self.issue_store().all_issues()?;

        for issue_id in &issue_ids {
            let Some(link) = self.issue_store().link_by_issue(*issue_id, &rid, &sid)? else {
                report.discrepancies.push(Discrepancy::UnlinkedIssue { issue_id: *issue_id });
                continue;
            };

            let Ok(job) = self.job_store().job(&link.jobname) else {
                report
                    .discrepancies
                    .push(Discrepancy::LinkedToNonexistentJob { issue_id: *issue_id, jobname: link.jobname.clone() });
                continue;
            };

            if job.issue_id != Some(*issue_id) {
                report.discrepancies.push(Discrepancy::AsymmetricLink {
                    issue_id: *issue_id,
                    jobname: link.jobname.clone(),
                    job_says_issue_id: job.issue_id,
                });
            }

            let issue = self.issue_store().issue(*issue_id)?;
            let target_fields = self.translators(&user).issue_to_job_fields(&issue)?;
            let diverged = target_fields.iter().any(|(k, v)| job.field(k) != Some(v.as_str()));
            if diverged {
                report
                    .discrepancies
                    .push(Discrepancy::FieldDivergence { issue_id: *issue_id, jobname: link.jobname.clone() });
            }

            if self.config().features.fixes {
                let job_fixes = self.job_store().fixes_for_job(&link.jobname)?;
                let issue_fixes = self.issue_store().fixes_for_issue(*issue_id, &rid, &sid)?;
                let diff = diff_fixes(&job_fixes, &issue_fixes);
                if !diff.add_to_issue.is_empty() || !diff.add_to_job.is_empty() || !diff.status_mismatch.is_empty() {
                    report
                        .discrepancies
                        .push(Discrepancy::FixMismatch { issue_id: *issue_id, jobname: link.jobname.clone() });
                }
            }

            if self.config().features.filespecs {
                let job_filespecs = parse_job_filespecs_field(job.field(FIELD_NAME_FILESPECS).unwrap_or(""));
                let issue_filespecs = self.issue_store().filespecs_for_issue(*issue_id, &rid, &sid)?;
                let diff = diff_filespecs(&job_filespecs, &issue_filespecs);
                if !diff.add_to_issue.is_empty() || !diff.add_to_job.is_empty() {
                    report
                        .discrepancies
                        .push(Discrepancy::FilespecMismatch { issue_id: *issue_id, jobname: link.jobname.clone() });
                }
            }
        }

        for job in self.job_store().all_jobs()? {
            if job.rid.as_deref() != Some(rid.as_str()) {
                continue;
            }
            let linked_back = match job.issue_id {
                Some(issue_id) => self
                    .issue_store()
                    .link_by_issue(issue_id, &rid, &sid)?
                    .is_some_and(|l| l.jobname == job.name),
                None => false,
            };
            if !linked_back {
                report.discrepancies.push(Discrepancy::OrphanJob { jobname: job.name });
            }
        }

        Ok(report)
    }

    /// Re-reads every job the store currently holds, reporting any that
    /// can't be fetched (e.g. a job whose record no longer matches the
    /// installed jobspec).
    pub fn check_jobs(&self) -> Result<JobComplianceReport> {
        let mut report = JobComplianceReport::default();
        for job in self.job_store().all_jobs()? {
            match self.job_store().job(&job.name) {
                Ok(_) => {}
                Err(e) => report.failures.push((job.name, e.to_string())),
            }
        }
        Ok(report)
    }
}

/// Findings of a [`Replicator::check_jobs`] run.
#[derive(Debug, Clone, Default)]
pub struct JobComplianceReport {
    pub failures: Vec<(String, String)>,
}
