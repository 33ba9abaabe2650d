//! Startup checks (SPEC_FULL.md 4.4.7), run once before the first poll
//! of a `run`/`poll` invocation (and by the standalone `check-jobspec`/
//! `extend-jobspec` CLI commands).

use p4dti_issuestore::IssueStore;
use p4dti_jobstore::JobStore;
use p4dti_notify::{report, Notifier};

use crate::error::{Error, Result};
use crate::replicator::Replicator;

impl<I: IssueStore, J: JobStore, N: Notifier> Replicator<I, J, N> {
    /// Runs the full startup sequence: link-field precondition, jobspec
    /// install/extend (unless `keep_jobspec`), jobspec validation,
    /// idempotent event-log counter initialization, and a startup
    /// report mailed to the administrator.
    pub fn startup_checks(&mut self) -> Result<()> {
        let target = self.target_jobspec();

        let installed = self.job_store().read_jobspec()?;
        if !installed.has_link_fields() && self.job_store().any_jobs_exist()? {
            return Err(Error::PreExistingJobsWithoutLinkFields);
        }

        if !self.config().job_store.keep_jobspec {
            self.job_store().extend_jobspec(&target, false)?;
        }

        let issues = self.job_store().validate_jobspec(&target)?;
        p4dti_jobstore::jobspec::require_no_errors(&issues)?;

        let counter_name = format!("P4DTI-{}", self.config().rid);
        self.job_store().counter_init_if_missing(&counter_name, 0)?;
        self.job_store().counter_init_if_missing("logger", 0)?;

        let user = self.build_user_translator()?;
        let (subject, body) = report::startup_report(&self.config().rid, user.unmatched_side0(), user.unmatched_side1());
        self.notifier().send_admin_report(&subject, &body)?;

        Ok(())
    }
}
