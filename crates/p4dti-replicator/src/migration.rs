//! Migration mode (SPEC_FULL.md 4.4.4): a one-shot job->issue import of
//! pre-existing side-1 jobs. Unlike the poll cycle this never writes
//! job field contents back -- only the link row, filespecs, and fixes
//! are replicated from the freshly created issue, so a job can be
//! migrated even before a subsequent poll brings the jobspec's
//! non-reserved fields up to date.

use p4dti_core::filespec::parse_job_filespecs_field;
use p4dti_core::job::{Job, FIELD_NAME_FILESPECS};
use p4dti_issuestore::{IssueStore, NewIssue};
use p4dti_jobstore::JobStore;
use p4dti_notify::Notifier;
use tracing::info;

use crate::error::Result;
use crate::replicator::Replicator;

/// Tally of one `migrate` invocation.
#[derive(Debug, Default, Clone)]
pub struct MigrationSummary {
    pub migrated: usize,
    pub skipped_already_linked: usize,
    pub skipped_by_predicate: usize,
}

/// Tally of one `migrate_users` invocation.
#[derive(Debug, Default, Clone)]
pub struct UserMigrationSummary {
    pub added: usize,
}

impl<I: IssueStore, J: JobStore, N: Notifier> Replicator<I, J, N> {
    /// Copies every job-store user account onto the issue side, adding
    /// one an administrator would otherwise have to create by hand
    /// before the first poll against a job store with pre-existing
    /// users.
    pub fn migrate_users(&mut self) -> Result<UserMigrationSummary> {
        let mut summary = UserMigrationSummary::default();
        for user in self.job_store().all_users()? {
            self.issue_store().upsert_user(&user.name, &user.email)?;
            summary.added += 1;
        }
        Ok(summary)
    }

    /// Migrates every unlinked job accepted by the predicate into a new
    /// issue, starting from `start` if given (jobs are processed in the
    /// order the job store returns them; `start` skips every job before
    /// the named one, inclusive of it). The jobspec is not reinstalled
    /// here -- a subsequent `poll` or `extend-jobspec` handles that once
    /// all issues exist.
    pub fn migrate(&mut self, start: Option<&str>) -> Result<MigrationSummary> {
        let rid = self.config().rid.clone();
        let sid = self.config().sid.clone();
        let user = self.build_user_translator()?;

        let mut jobs = self.job_store().all_jobs()?;
        if let Some(start) = start {
            let from = jobs.iter().position(|j| j.name == start).unwrap_or(0);
            jobs.drain(..from);
        }

        let accept_new = self.config().issue_store.accept_product_pattern.clone();
        let mut summary = MigrationSummary::default();

        for job in jobs {
            if job.is_linked() {
                summary.skipped_already_linked += 1;
                continue;
            }
            if !crate::pattern::matches(&accept_new, job.field(crate::fields::FIELD_PRODUCT).unwrap_or("")) {
                summary.skipped_by_predicate += 1;
                continue;
            }

            self.migrate_one(&job, &user, &rid, &sid)?;
            summary.migrated += 1;
        }

        Ok(summary)
    }

    fn migrate_one(&mut self, job: &Job, user: &p4dti_translate::user::UserTranslator, rid: &str, sid: &str) -> Result<()> {
        let updates = self.translators(user).job_to_issue_updates(job)?;
        let new_issue = NewIssue {
            summary: updates.summary.clone().unwrap_or_default(),
            reporter: updates.reporter.clone().unwrap_or_default(),
            assignee: updates.assignee.clone().unwrap_or_default(),
            status: updates.status.clone(),
            description: updates.description.clone().unwrap_or_default(),
            component: updates.component.clone().unwrap_or_default(),
            version: updates.version.clone().unwrap_or_default(),
            product: updates.product.clone().unwrap_or_default(),
        };

        let issue = self.issue_store().new_issue(new_issue)?;
        self.issue_store().set_link(issue.issue_id, rid, sid, &job.name)?;
        self.issue_store().mark_migrated(issue.issue_id, rid, sid, &job.name)?;

        if self.config().features.fixes {
            for fix in self.job_store().fixes_for_job(&job.name)? {
                self.issue_store().set_fix(&fix, rid, sid)?;
            }
        }
        if self.config().features.filespecs {
            for fs in parse_job_filespecs_field(job.field(FIELD_NAME_FILESPECS).unwrap_or("")) {
                self.issue_store().add_filespec(issue.issue_id, rid, sid, &fs)?;
            }
        }

        info!(job = %job.name, issue_id = issue.issue_id, "migrated job to new issue");
        Ok(())
    }
}
