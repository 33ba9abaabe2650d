//! Refresh mode (SPEC_FULL.md 4.4.5): an administrator-triggered forced
//! one-way push from side 0 to side 1 of every replicable issue. Jobs
//! are never deleted; the event-log counter is cleared at the end so
//! the next normal poll sees a clean slate instead of replaying every
//! write this mode just made.

use p4dti_issuestore::IssueStore;
use p4dti_jobstore::JobStore;
use p4dti_notify::Notifier;
use tracing::info;

use crate::error::Result;
use crate::replicator::Replicator;

/// Tally of one `refresh` invocation.
#[derive(Debug, Default, Clone)]
pub struct RefreshSummary {
    pub pushed: usize,
}

impl<I: IssueStore, J: JobStore, N: Notifier> Replicator<I, J, N> {
    pub fn refresh(&mut self) -> Result<RefreshSummary> {
        let rid = self.config().rid.clone();
        let sid = self.config().sid.clone();
        let user = self.build_user_translator()?;

        let issue_ids = self.issue_store().all_issues()?;
        let mut summary = RefreshSummary::default();

        for issue_id in issue_ids {
            let jobname = match self.issue_store().link_by_issue(issue_id, &rid, &sid)? {
                Some(link) => link.jobname,
                None => self.requested_job_name(issue_id),
            };

            let saved = self.write_job_from_issue(issue_id, &jobname, &user, true)?;
            self.issue_store().set_link(issue_id, &rid, &sid, &saved.name)?;

            if self.config().features.fixes {
                for fix in self.issue_store().fixes_for_issue(issue_id, &rid, &sid)? {
                    self.job_store().add_fix(&saved.name, &fix)?;
                }
            }
            if self.config().features.filespecs {
                let filespecs = self.issue_store().filespecs_for_issue(issue_id, &rid, &sid)?;
                if !filespecs.is_empty() {
                    let mut job = self.job_store().job(&saved.name)?;
                    job.fields.insert(
                        p4dti_core::job::FIELD_NAME_FILESPECS.to_string(),
                        p4dti_core::filespec::render_job_filespecs_field(&filespecs),
                    );
                    self.job_store().write_job(&job, true)?;
                }
            }

            summary.pushed += 1;
        }

        let counter_name = format!("P4DTI-{rid}");
        self.job_store().counter_set(&counter_name, 0)?;
        info!(pushed = summary.pushed, "refresh complete, event-log counter cleared");
        Ok(summary)
    }
}
