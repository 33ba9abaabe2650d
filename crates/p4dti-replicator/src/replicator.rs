//! The replicator core: one poll cycle's detect -> translate -> dispatch
//! -> acknowledge pass, built on the [`IssueStore`] and [`JobStore`]
//! adapter traits so it stays storage-agnostic.

use std::collections::HashMap;

use p4dti_config::ReplicatorConfig;
use p4dti_core::enums::{ChangeClass, ConflictPolicy, JobAckKind};
use p4dti_core::filespec::{diff_filespecs, parse_job_filespecs_field, render_job_filespecs_field};
use p4dti_core::fix::diff_fixes;
use p4dti_core::issue::Issue;
use p4dti_core::job::{Job, FIELD_NAME_FILESPECS};
use p4dti_core::validation::IssueInvariants;
use p4dti_issuestore::{IssueStore, NewIssue};
use p4dti_jobstore::JobStore;
use p4dti_notify::{report, Notifier};
use p4dti_translate::status::StatusTranslator;
use p4dti_translate::user::{Mode as UserMode, Side0User, Side1User, UserTranslator};
use tracing::warn;

use crate::error::{Error, Result};
use crate::fields::{self, FieldTranslators, FIELD_PRODUCT};
use crate::invariants::{build_invariants, known_side0_statuses};
use crate::pairing::{self, Pair};
use crate::pattern;

/// The replicator's owned, process-wide state: the pair of adapters,
/// the notifier, the status translator (built once at construction),
/// invariant policy, and the cross-cycle `job_updates` self-echo map.
pub struct Replicator<I, J, N> {
    config: ReplicatorConfig,
    issue_store: I,
    job_store: J,
    notifier: N,
    status: StatusTranslator,
    invariants: IssueInvariants,
    job_updates: HashMap<String, i32>,
}

/// Outcome of a single poll cycle, for CLI reporting.
#[derive(Debug, Default, Clone)]
pub struct PollSummary {
    pub pairs_dispatched: usize,
    pub conflicts: usize,
    pub reverts: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct DispatchOutcome {
    conflict: bool,
    reverted: bool,
}

impl<I: IssueStore, J: JobStore, N: Notifier> Replicator<I, J, N> {
    pub fn new(config: ReplicatorConfig, issue_store: I, job_store: J, notifier: N) -> Self {
        let status = StatusTranslator::build(
            &known_side0_statuses(&config.invariants, &config.status_translation),
            &config.status_translation.closed_states,
            &config.status_translation.prohibited_name_prefix,
        );
        let invariants = build_invariants(&config.invariants);
        Self { config, issue_store, job_store, notifier, status, invariants, job_updates: HashMap::new() }
    }

    pub fn config(&self) -> &ReplicatorConfig {
        &self.config
    }

    pub fn issue_store(&self) -> &I {
        &self.issue_store
    }

    pub fn job_store(&self) -> &J {
        &self.job_store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// The target jobspec this replicator requires: the reserved
    /// P4DTI-* fields plus the fixed set of replicated issue fields.
    pub fn target_jobspec(&self) -> p4dti_core::job::Jobspec {
        let descriptors = fields::known_field_descriptors(&self.status.side1_values());
        p4dti_jobstore::jobspec::target_jobspec(&descriptors)
    }

    fn counter_name(&self) -> String {
        format!("P4DTI-{}", self.config.rid)
    }

    /// Builds the user translator fresh for this cycle: user lists can
    /// change between polls, so unlike the status translator this is
    /// never cached across cycles.
    pub(crate) fn build_user_translator(&self) -> Result<UserTranslator> {
        let side0_users: Vec<Side0User> = self
            .issue_store
            .all_users()?
            .into_iter()
            .map(|u| Side0User { id: u.name, email: u.email })
            .collect();
        let side1_users: Vec<Side1User> = self
            .job_store
            .all_users()?
            .into_iter()
            .map(|u| Side1User { name: u.name, email: u.email })
            .collect();
        Ok(UserTranslator::build(
            &side0_users,
            &side1_users,
            &self.config.bookkeeping_user_side0,
            &self.config.bookkeeping_user_side1,
        )?)
    }

    fn user_mode(&self) -> UserMode {
        match self.config.user_translation_mode {
            p4dti_config::UserTranslationMode::Strict => UserMode::Strict,
            p4dti_config::UserTranslationMode::Lax => UserMode::Lax,
        }
    }

    pub(crate) fn translators<'a>(&'a self, user: &'a UserTranslator) -> FieldTranslators<'a> {
        FieldTranslators { status: &self.status, user, user_mode: self.user_mode() }
    }

    fn conflict_policy(&self) -> ConflictPolicy {
        match self.config.conflict_policy {
            p4dti_config::ConflictPolicy::Dt => ConflictPolicy::Dt,
            p4dti_config::ConflictPolicy::P4 => ConflictPolicy::P4,
            p4dti_config::ConflictPolicy::NoAction => ConflictPolicy::NoAction,
        }
    }

    fn note_write(&mut self, name: &str, ack: JobAckKind) {
        if ack == JobAckKind::Saved {
            *self.job_updates.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    /// Runs a single poll cycle: detect changes on both sides, dispatch
    /// each pair, and advance the event-log counter. Always calls
    /// `poll_end`, even when the cycle fails partway through.
    pub fn poll(&mut self) -> Result<PollSummary> {
        let rid = self.config.rid.clone();
        let sid = self.config.sid.clone();
        let (poll_id, fence) = self.issue_store.poll_start(&rid, &sid)?;

        let result = self.run_cycle(fence, &rid, &sid);

        match self.issue_store.poll_end(poll_id, result.is_ok()) {
            Ok(mail) => {
                for m in mail {
                    if let Err(e) = self.notifier.send_report(&m.to, &m.subject, &m.body) {
                        warn!(to = %m.to, error = %e, "failed to deliver queued notification");
                    }
                }
            }
            Err(e) => warn!(error = %e, "poll_end failed after cycle completion"),
        }

        result
    }

    fn run_cycle(&mut self, fence: Option<chrono::DateTime<chrono::Utc>>, rid: &str, sid: &str) -> Result<PollSummary> {
        let user = self.build_user_translator()?;

        let changed = self.issue_store.changed_issues_since(fence, rid, sid)?;
        let changed_issue_ids: Vec<i64> = changed.new.iter().chain(changed.changed.iter()).copied().collect();

        let counter_name = self.counter_name();
        let pattern = self.config.issue_store.accept_product_pattern.clone();
        let accept_new = |job: &Job| pattern::matches(&pattern, job.field(FIELD_PRODUCT).unwrap_or(""));
        let changed_jobs = self.job_store.changed_jobs(&counter_name, &mut self.job_updates, &accept_new)?;

        let pairs = pairing::build_pairs(&changed_issue_ids, &changed_jobs.jobs, |id| {
            self.issue_store.link_by_issue(id, rid, sid).ok().flatten().map(|l| l.jobname)
        });

        let mut summary = PollSummary::default();
        for pair in &pairs {
            match self.dispatch_pair(pair, &user, rid, sid) {
                Ok(outcome) => {
                    summary.pairs_dispatched += 1;
                    if outcome.conflict {
                        summary.conflicts += 1;
                    }
                    if outcome.reverted {
                        summary.reverts += 1;
                    }
                }
                Err(e) if !e.is_fatal() => {
                    warn!(error = %e, issue_id = ?pair.issue_id, jobname = ?pair.jobname, "skipping pair after dispatch error");
                }
                Err(e) => return Err(e),
            }
        }

        self.job_updates.retain(|_, count| *count != 0);
        self.job_store.counter_set(&counter_name, changed_jobs.next_entry)?;

        Ok(summary)
    }

    fn dispatch_pair(&mut self, pair: &Pair, user: &UserTranslator, rid: &str, sid: &str) -> Result<DispatchOutcome> {
        match pair.class {
            ChangeClass::IssueOnly => self.dispatch_issue_only(pair, user, rid, sid),
            ChangeClass::JobOnly => self.dispatch_job_only(pair, user, rid, sid),
            ChangeClass::Both => self.dispatch_both(pair, user, rid, sid),
        }
    }

    pub(crate) fn requested_job_name(&self, issue_id: i64) -> String {
        if self.config.job_store.use_job_store_names {
            p4dti_core::job::NEW_JOB_NAME.to_string()
        } else {
            issue_id.to_string()
        }
    }

    /// Translates `issue_id`'s current state into job fields and writes
    /// it to `jobname`, maintaining the self-echo counter on success.
    pub(crate) fn write_job_from_issue(&mut self, issue_id: i64, jobname: &str, user: &UserTranslator, force: bool) -> Result<Job> {
        let issue = self.issue_store.issue(issue_id)?;
        let fields = self.translators(user).issue_to_job_fields(&issue)?;
        let owner = self.translators(user).user.to_1(&issue.reporter, self.user_mode())?;
        let job = Job {
            name: jobname.to_string(),
            rid: Some(self.config.rid.clone()),
            issue_id: Some(issue_id),
            user: owner,
            fields,
        };
        let (saved, ack) = self.job_store.write_job(&job, force)?;
        self.note_write(&saved.name, ack);
        Ok(saved)
    }

    /// Translates `jobname`'s current state into an issue update and
    /// applies it to `issue_id`, stamping the write as this
    /// replicator's own for self-echo detection.
    fn update_issue_from_job(&mut self, issue_id: i64, jobname: &str, user: &UserTranslator, rid: &str, sid: &str) -> Result<Issue> {
        let job = self.job_store.job(jobname)?;
        let updates = self.translators(user).job_to_issue_updates(&job)?;
        let permitted = self
            .issue_store
            .user_permitted_for_product(&job.user, &updates.product.clone().unwrap_or_default())?;
        Ok(self
            .issue_store
            .update_issue(issue_id, &updates, &job.user, &self.invariants, permitted, Some((rid, sid)))?)
    }

    fn dispatch_issue_only(&mut self, pair: &Pair, user: &UserTranslator, rid: &str, sid: &str) -> Result<DispatchOutcome> {
        let issue_id = pair.issue_id.expect("issue-only pair always carries an issue id");

        let (jobname, is_new_job) = match &pair.jobname {
            Some(name) => (name.clone(), false),
            None => (self.requested_job_name(issue_id), true),
        };

        let saved = self.write_job_from_issue(issue_id, &jobname, user, false)?;

        if is_new_job {
            self.issue_store.set_link(issue_id, rid, sid, &saved.name)?;
        }

        self.replicate_fixes_and_filespecs(issue_id, &saved.name)?;
        Ok(DispatchOutcome::default())
    }

    fn dispatch_job_only(&mut self, pair: &Pair, user: &UserTranslator, rid: &str, sid: &str) -> Result<DispatchOutcome> {
        let jobname = pair.jobname.clone().expect("job-only pair always carries a jobname");

        let Some(issue_id) = pair.issue_id else {
            let job = self.job_store.job(&jobname)?;
            let updates = self.translators(user).job_to_issue_updates(&job)?;
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
            let issue = self.issue_store.new_issue(new_issue)?;
            self.issue_store.set_link(issue.issue_id, rid, sid, &jobname)?;
            self.replicate_fixes_and_filespecs(issue.issue_id, &jobname)?;
            return Ok(DispatchOutcome::default());
        };

        match self.update_issue_from_job(issue_id, &jobname, user, rid, sid) {
            Ok(updated) => {
                self.replicate_fixes_and_filespecs(issue_id, &jobname)?;
                self.sync_back_if_diverged(&updated, &jobname, user)?;
                Ok(DispatchOutcome::default())
            }
            Err(write_error) => self.revert_job(issue_id, &jobname, &write_error, user),
        }
    }

    fn dispatch_both(&mut self, pair: &Pair, user: &UserTranslator, rid: &str, sid: &str) -> Result<DispatchOutcome> {
        let issue_id = pair.issue_id.expect("both-sides pair always carries an issue id");
        let jobname = pair.jobname.clone().expect("both-sides pair always carries a jobname");
        let pair_id = format!("{issue_id}/{jobname}");

        match self.conflict_policy() {
            ConflictPolicy::Dt => {
                self.write_job_from_issue(issue_id, &jobname, user, true)?;
                self.replicate_fixes_and_filespecs(issue_id, &jobname)?;
                self.notify_conflict(&pair_id, 0, &["status", "summary", "description"])?;
                Ok(DispatchOutcome { conflict: true, reverted: false })
            }
            ConflictPolicy::P4 => {
                self.update_issue_from_job(issue_id, &jobname, user, rid, sid)?;
                self.replicate_fixes_and_filespecs(issue_id, &jobname)?;
                self.notify_conflict(&pair_id, 1, &["status", "summary", "description"])?;
                Ok(DispatchOutcome { conflict: true, reverted: false })
            }
            ConflictPolicy::NoAction => Ok(DispatchOutcome { conflict: true, reverted: false }),
        }
    }

    fn notify_conflict(&self, pair_id: &str, winner_side: u8, fields: &[&str]) -> Result<()> {
        let fields: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
        let (subject, body) = report::conflict_overwrite(&self.config.rid, pair_id, winner_side, &fields);
        self.notifier.send_admin_report(&subject, &body)?;
        Ok(())
    }

    /// After a job->issue write, the issue-side adapter may have applied
    /// a side effect (e.g. synthesised resolution); re-read and push any
    /// resulting delta back to the job so the two sides don't stay
    /// silently divergent on a field the job write never touched.
    fn sync_back_if_diverged(&mut self, issue: &Issue, jobname: &str, user: &UserTranslator) -> Result<()> {
        let target_fields = self.translators(user).issue_to_job_fields(issue)?;
        let current = self.job_store.job(jobname)?;
        let diverged = target_fields.iter().any(|(k, v)| current.field(k) != Some(v.as_str()));
        if diverged {
            self.write_job_from_issue(issue.issue_id, jobname, user, false)?;
        }
        Ok(())
    }

    /// A side-1 write failed after a local edit: re-read the issue and
    /// force-write the job from it, rolling back the user's edit, and
    /// mail them the pre-overwrite snapshot. If the revert also fails,
    /// both tracebacks are mailed and the pair is abandoned this cycle.
    fn revert_job(&mut self, issue_id: i64, jobname: &str, write_error: &Error, user: &UserTranslator) -> Result<DispatchOutcome> {
        let pair_id = format!("{issue_id}/{jobname}");
        let pre_overwrite = self.job_store.job(jobname).ok();

        match self.write_job_from_issue(issue_id, jobname, user, true) {
            Ok(_) => {
                let snapshot = pre_overwrite.map(|j| format!("{:?}", j.fields)).unwrap_or_default();
                let (subject, body) = report::revert_notice(&self.config.rid, &pair_id, &snapshot);
                self.notifier.send_report(&self.config.bookkeeping_user_side0, &subject, &body)?;
                Ok(DispatchOutcome { conflict: false, reverted: true })
            }
            Err(revert_error) => {
                let (subject, body) =
                    report::revert_failure(&self.config.rid, &pair_id, &write_error.to_string(), &revert_error.to_string());
                self.notifier.send_admin_report(&subject, &body)?;
                Err(Error::RevertFailed {
                    pair: pair_id,
                    write_error: write_error.to_string(),
                    revert_error: revert_error.to_string(),
                })
            }
        }
    }

    /// Shared by every dispatch path: diffs and replicates fixes, then
    /// filespecs, between the issue and its paired job.
    fn replicate_fixes_and_filespecs(&mut self, issue_id: i64, jobname: &str) -> Result<()> {
        let rid = self.config.rid.clone();
        let sid = self.config.sid.clone();

        if self.config.features.fixes {
            let job_fixes = self.job_store.fixes_for_job(jobname)?;
            let issue_fixes = self.issue_store.fixes_for_issue(issue_id, &rid, &sid)?;
            let diff = diff_fixes(&job_fixes, &issue_fixes);
            for fix in &diff.add_to_issue {
                self.issue_store.set_fix(fix, &rid, &sid)?;
            }
            for fix in &diff.add_to_job {
                self.job_store.add_fix(jobname, fix)?;
            }
            for (job_fix, _issue_fix) in &diff.status_mismatch {
                self.issue_store.set_fix(job_fix, &rid, &sid)?;
            }
        }

        if self.config.features.filespecs {
            let job = self.job_store.job(jobname)?;
            let job_filespecs = parse_job_filespecs_field(job.field(FIELD_NAME_FILESPECS).unwrap_or(""));
            let issue_filespecs = self.issue_store.filespecs_for_issue(issue_id, &rid, &sid)?;
            let diff = diff_filespecs(&job_filespecs, &issue_filespecs);

            for fs in &diff.add_to_issue {
                self.issue_store.add_filespec(issue_id, &rid, &sid, fs)?;
            }
            if !diff.add_to_job.is_empty() {
                let mut merged = issue_filespecs;
                for fs in diff.add_to_job {
                    if !merged.contains(&fs) {
                        merged.push(fs);
                    }
                }
                let mut job = job;
                job.fields.insert(FIELD_NAME_FILESPECS.to_string(), render_job_filespecs_field(&merged));
                let (saved, ack) = self.job_store.write_job(&job, true)?;
                self.note_write(&saved.name, ack);
            }
        }

        Ok(())
    }
}
