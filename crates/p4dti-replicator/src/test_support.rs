//! In-memory fakes for [`IssueStore`], [`JobStore`] and [`Notifier`],
//! used only by this crate's own integration tests. Each fake keeps
//! its state behind a `Mutex` so it can be shared behind a `&self`
//! trait object the way the real SQLite/subprocess adapters are.
#![cfg(test)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use p4dti_core::changelist::Changelist;
use p4dti_core::enums::FixStatus;
use p4dti_core::fix::Fix;
use p4dti_core::issue::{Issue, IssueUpdates};
use p4dti_core::job::{Job, Jobspec};
use p4dti_core::validation::IssueInvariants;
use p4dti_issuestore::{ChangedIssues, DeferredMail, IssueStore, Link, NewIssue, StorageError, User};
use p4dti_jobstore::jobspec::JobspecIssue;
use p4dti_jobstore::store::{ChangedJobs, JobStore, JobStoreUser};
use p4dti_jobstore::JobStoreError;
use p4dti_notify::{NotifyError, Notifier};

#[derive(Default)]
struct IssueState {
    next_id: i64,
    issues: HashMap<i64, Issue>,
    links: HashMap<(i64, String, String), Link>,
    fixes: HashMap<i64, Vec<Fix>>,
    filespecs: HashMap<i64, Vec<String>>,
    changelists: HashMap<i64, Changelist>,
    config: HashMap<(String, String, String), String>,
    users: Vec<User>,
    permitted: bool,
    in_flight: bool,
    report_new: Vec<i64>,
    report_changed: Vec<i64>,
}

/// An in-memory stand-in for `SqliteStore`, sufficient to drive the
/// replicator core's dispatch logic in a test without a real database.
pub struct FakeIssueStore {
    state: Mutex<IssueState>,
}

impl FakeIssueStore {
    pub fn new() -> Self {
        Self { state: Mutex::new(IssueState { permitted: true, ..Default::default() }) }
    }

    pub fn seed_issue(&self, issue: Issue) {
        let mut s = self.state.lock().unwrap();
        if issue.issue_id >= s.next_id {
            s.next_id = issue.issue_id + 1;
        }
        s.issues.insert(issue.issue_id, issue);
    }

    pub fn seed_link(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) {
        let mut s = self.state.lock().unwrap();
        s.links.insert(
            (issue_id, rid.to_string(), sid.to_string()),
            Link { issue_id, rid: rid.to_string(), sid: sid.to_string(), jobname: jobname.to_string(), migrated: None },
        );
    }

    pub fn seed_user(&self, name: &str, email: &str) {
        self.state.lock().unwrap().users.push(User { name: name.to_string(), email: email.to_string() });
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.state.lock().unwrap().permitted = permitted;
    }

    /// Marks `issue_id` as touched since the last fence, as if its
    /// creation timestamp postdated the poll fence. Drives
    /// `changed_issues_since`'s `new` bucket for the next poll.
    pub fn report_as_new(&self, issue_id: i64) {
        self.state.lock().unwrap().report_new.push(issue_id);
    }

    /// Marks `issue_id` as externally changed since the last fence.
    /// Drives `changed_issues_since`'s `changed` bucket for the next poll.
    pub fn report_as_changed(&self, issue_id: i64) {
        self.state.lock().unwrap().report_changed.push(issue_id);
    }

    pub fn issue_snapshot(&self, id: i64) -> Issue {
        self.state.lock().unwrap().issues.get(&id).cloned().unwrap()
    }
}

impl IssueStore for FakeIssueStore {
    fn init_schema(&self, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<()> {
        Ok(())
    }

    fn issue(&self, id: i64) -> p4dti_issuestore::error::Result<Issue> {
        self.state
            .lock()
            .unwrap()
            .issues
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("issue", id.to_string()))
    }

    fn new_issue(&self, new: NewIssue) -> p4dti_issuestore::error::Result<Issue> {
        let mut s = self.state.lock().unwrap();
        let id = s.next_id;
        s.next_id += 1;
        let now = Utc::now();
        let issue = Issue {
            issue_id: id,
            status: new.status.unwrap_or_default(),
            assignee: new.assignee,
            reporter: new.reporter,
            summary: new.summary,
            description: new.description,
            component: new.component,
            version: new.version,
            product: new.product,
            resolution: String::new(),
            extra: BTreeMap::new(),
            creation_ts: now,
            delta_ts: now,
        };
        s.issues.insert(id, issue.clone());
        Ok(issue)
    }

    fn delete_issue(&self, id: i64) -> p4dti_issuestore::error::Result<()> {
        self.state.lock().unwrap().issues.remove(&id);
        Ok(())
    }

    fn update_issue(
        &self,
        id: i64,
        updates: &IssueUpdates,
        user: &str,
        invariants: &IssueInvariants,
        permitted: bool,
        _mirror: Option<(&str, &str)>,
    ) -> p4dti_issuestore::error::Result<Issue> {
        let mut s = self.state.lock().unwrap();
        let issue = s.issues.get(&id).cloned().ok_or_else(|| StorageError::not_found("issue", id.to_string()))?;
        let applied = invariants.check_update(&issue, updates, user, permitted)?;

        let mut updated = issue.clone();
        if let Some(v) = applied.status {
            updated.status = v;
        }
        if let Some(v) = applied.assignee {
            updated.assignee = v;
        }
        if let Some(v) = applied.reporter {
            updated.reporter = v;
        }
        if let Some(v) = applied.summary {
            updated.summary = v;
        }
        if let Some(v) = applied.description {
            updated.description = v;
        }
        if let Some(v) = applied.component {
            updated.component = v;
        }
        if let Some(v) = applied.version {
            updated.version = v;
        }
        if let Some(v) = applied.product {
            updated.product = v;
        }
        if let Some(v) = applied.resolution {
            updated.resolution = v;
        }
        for (k, v) in applied.extra {
            updated.extra.insert(k, v);
        }
        updated.delta_ts = Utc::now();

        s.issues.insert(id, updated.clone());
        Ok(updated)
    }

    fn changed_issues_since(&self, _fence: Option<DateTime<Utc>>, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<ChangedIssues> {
        let s = self.state.lock().unwrap();
        Ok(ChangedIssues { new: s.report_new.clone(), changed: s.report_changed.clone() })
    }

    fn all_issues(&self) -> p4dti_issuestore::error::Result<Vec<i64>> {
        let mut ids: Vec<i64> = self.state.lock().unwrap().issues.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn link_by_issue(&self, issue_id: i64, rid: &str, sid: &str) -> p4dti_issuestore::error::Result<Option<Link>> {
        Ok(self.state.lock().unwrap().links.get(&(issue_id, rid.to_string(), sid.to_string())).cloned())
    }

    fn link_by_jobname(&self, jobname: &str, rid: &str, sid: &str) -> p4dti_issuestore::error::Result<Option<Link>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .links
            .values()
            .find(|l| l.jobname == jobname && l.rid == rid && l.sid == sid)
            .cloned())
    }

    fn set_link(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> p4dti_issuestore::error::Result<()> {
        self.state.lock().unwrap().links.insert(
            (issue_id, rid.to_string(), sid.to_string()),
            Link { issue_id, rid: rid.to_string(), sid: sid.to_string(), jobname: jobname.to_string(), migrated: None },
        );
        Ok(())
    }

    fn mark_migrated(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> p4dti_issuestore::error::Result<()> {
        let mut s = self.state.lock().unwrap();
        s.links.insert(
            (issue_id, rid.to_string(), sid.to_string()),
            Link {
                issue_id,
                rid: rid.to_string(),
                sid: sid.to_string(),
                jobname: jobname.to_string(),
                migrated: Some(Utc::now().to_rfc3339()),
            },
        );
        Ok(())
    }

    fn fixes_for_issue(&self, issue_id: i64, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<Vec<Fix>> {
        Ok(self.state.lock().unwrap().fixes.get(&issue_id).cloned().unwrap_or_default())
    }

    fn set_fix(&self, fix: &Fix, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<()> {
        let mut s = self.state.lock().unwrap();
        let entry = s.fixes.entry(fix.issue_id).or_default();
        entry.retain(|f| f.change != fix.change);
        entry.push(fix.clone());
        Ok(())
    }

    fn delete_fix(&self, change: i64, issue_id: i64, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<()> {
        if let Some(v) = self.state.lock().unwrap().fixes.get_mut(&issue_id) {
            v.retain(|f| f.change != change);
        }
        Ok(())
    }

    fn filespecs_for_issue(&self, issue_id: i64, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<Vec<String>> {
        Ok(self.state.lock().unwrap().filespecs.get(&issue_id).cloned().unwrap_or_default())
    }

    fn add_filespec(&self, issue_id: i64, _rid: &str, _sid: &str, filespec: &str) -> p4dti_issuestore::error::Result<()> {
        let mut s = self.state.lock().unwrap();
        let entry = s.filespecs.entry(issue_id).or_default();
        if !entry.iter().any(|f| f == filespec) {
            entry.push(filespec.to_string());
        }
        Ok(())
    }

    fn remove_filespec(&self, issue_id: i64, _rid: &str, _sid: &str, filespec: &str) -> p4dti_issuestore::error::Result<()> {
        if let Some(v) = self.state.lock().unwrap().filespecs.get_mut(&issue_id) {
            v.retain(|f| f != filespec);
        }
        Ok(())
    }

    fn changelist(&self, change: i64, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<Option<Changelist>> {
        Ok(self.state.lock().unwrap().changelists.get(&change).cloned())
    }

    fn set_changelist(&self, cl: &Changelist, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<()> {
        self.state.lock().unwrap().changelists.insert(cl.change, cl.clone());
        Ok(())
    }

    fn config_get(&self, rid: &str, sid: &str, key: &str) -> p4dti_issuestore::error::Result<Option<String>> {
        Ok(self.state.lock().unwrap().config.get(&(rid.to_string(), sid.to_string(), key.to_string())).cloned())
    }

    fn config_set(&self, rid: &str, sid: &str, key: &str, value: &str) -> p4dti_issuestore::error::Result<()> {
        self.state.lock().unwrap().config.insert((rid.to_string(), sid.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn poll_start(&self, _rid: &str, _sid: &str) -> p4dti_issuestore::error::Result<(i64, Option<DateTime<Utc>>)> {
        let mut s = self.state.lock().unwrap();
        s.in_flight = true;
        Ok((1, None))
    }

    fn poll_end(&self, _id: i64, _completed: bool) -> p4dti_issuestore::error::Result<Vec<DeferredMail>> {
        self.state.lock().unwrap().in_flight = false;
        Ok(Vec::new())
    }

    fn queue_mail(&self, _to: &str, _subject: &str, _body: &str) -> p4dti_issuestore::error::Result<()> {
        Ok(())
    }

    fn user_by_name(&self, name: &str) -> p4dti_issuestore::error::Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.iter().find(|u| u.name == name).cloned())
    }

    fn user_by_email(&self, email: &str) -> p4dti_issuestore::error::Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.iter().find(|u| u.email == email).cloned())
    }

    fn upsert_user(&self, name: &str, email: &str) -> p4dti_issuestore::error::Result<()> {
        let mut s = self.state.lock().unwrap();
        if let Some(u) = s.users.iter_mut().find(|u| u.name == name) {
            u.email = email.to_string();
        } else {
            s.users.push(User { name: name.to_string(), email: email.to_string() });
        }
        Ok(())
    }

    fn all_users(&self) -> p4dti_issuestore::error::Result<Vec<User>> {
        Ok(self.state.lock().unwrap().users.clone())
    }

    fn user_permitted_for_product(&self, _user: &str, _product: &str) -> p4dti_issuestore::error::Result<bool> {
        Ok(self.state.lock().unwrap().permitted)
    }
}

#[derive(Default)]
struct JobState {
    jobs: HashMap<String, Job>,
    fixes: HashMap<String, Vec<Fix>>,
    counters: HashMap<String, i64>,
    users: Vec<JobStoreUser>,
    jobspec: Jobspec,
    saved: Vec<String>,
    next_autoname: i64,
    pending_changes: Vec<String>,
}

/// An in-memory stand-in for `ProcessJobStore`.
pub struct FakeJobStore {
    state: Mutex<JobState>,
}

impl FakeJobStore {
    pub fn new() -> Self {
        Self { state: Mutex::new(JobState { next_autoname: 1, ..Default::default() }) }
    }

    pub fn seed_job(&self, job: Job) {
        self.state.lock().unwrap().jobs.insert(job.name.clone(), job);
    }

    pub fn seed_user(&self, name: &str, email: &str) {
        self.state.lock().unwrap().users.push(JobStoreUser { name: name.to_string(), email: email.to_string() });
    }

    pub fn job_snapshot(&self, name: &str) -> Job {
        self.state.lock().unwrap().jobs.get(name).cloned().unwrap()
    }

    pub fn saved_names(&self) -> Vec<String> {
        self.state.lock().unwrap().saved.clone()
    }

    /// Marks `name` (already seeded via [`Self::seed_job`]) as touched
    /// since the last event-log position, as a real server's event log
    /// would surface it to `changed_jobs`.
    pub fn report_job_as_changed(&self, name: &str) {
        self.state.lock().unwrap().pending_changes.push(name.to_string());
    }
}

impl JobStore for FakeJobStore {
    fn read_jobspec(&self) -> p4dti_jobstore::error::Result<Jobspec> {
        Ok(self.state.lock().unwrap().jobspec.clone())
    }

    fn write_jobspec(&self, spec: &Jobspec) -> p4dti_jobstore::error::Result<()> {
        self.state.lock().unwrap().jobspec = spec.clone();
        Ok(())
    }

    fn validate_jobspec(&self, target: &Jobspec) -> p4dti_jobstore::error::Result<Vec<JobspecIssue>> {
        let installed = self.state.lock().unwrap().jobspec.clone();
        Ok(p4dti_jobstore::jobspec::validate_against_target(&installed, target))
    }

    fn extend_jobspec(&self, target: &Jobspec, force: bool) -> p4dti_jobstore::error::Result<Jobspec> {
        let mut s = self.state.lock().unwrap();
        let extended = p4dti_jobstore::jobspec::extend_jobspec(&s.jobspec, target, force);
        s.jobspec = extended.clone();
        Ok(extended)
    }

    fn job(&self, name: &str) -> p4dti_jobstore::error::Result<Job> {
        self.state.lock().unwrap().jobs.get(name).cloned().ok_or_else(|| JobStoreError::NotFound(name.to_string()))
    }

    fn write_job(&self, job: &Job, _force: bool) -> p4dti_jobstore::error::Result<(Job, p4dti_core::enums::JobAckKind)> {
        let mut s = self.state.lock().unwrap();
        let mut saved = job.clone();
        if saved.name == p4dti_core::job::NEW_JOB_NAME {
            let n = s.next_autoname;
            s.next_autoname += 1;
            saved.name = format!("job{n:04}");
        }
        s.jobs.insert(saved.name.clone(), saved.clone());
        s.saved.push(saved.name.clone());
        Ok((saved, p4dti_core::enums::JobAckKind::Saved))
    }

    fn changed_jobs(
        &self,
        _counter_name: &str,
        job_updates: &mut HashMap<String, i32>,
        accept_new: &dyn Fn(&Job) -> bool,
    ) -> p4dti_jobstore::error::Result<ChangedJobs> {
        let mut s = self.state.lock().unwrap();
        let pending = std::mem::take(&mut s.pending_changes);
        let mut jobs = Vec::new();
        for name in pending {
            let pending_count = job_updates.entry(name.clone()).or_insert(0);
            if *pending_count > 0 {
                *pending_count -= 1;
                continue;
            }
            let Some(job) = s.jobs.get(&name).cloned() else { continue };
            let owned_by_self = job.rid.is_some();
            if owned_by_self || accept_new(&job) {
                jobs.push(job);
            }
        }
        Ok(ChangedJobs { jobs, changelists: Vec::new(), next_entry: 0 })
    }

    fn counter_get(&self, name: &str) -> p4dti_jobstore::error::Result<i64> {
        Ok(self.state.lock().unwrap().counters.get(name).copied().unwrap_or(0))
    }

    fn counter_set(&self, name: &str, value: i64) -> p4dti_jobstore::error::Result<()> {
        self.state.lock().unwrap().counters.insert(name.to_string(), value);
        Ok(())
    }

    fn counter_init_if_missing(&self, name: &str, value: i64) -> p4dti_jobstore::error::Result<()> {
        self.state.lock().unwrap().counters.entry(name.to_string()).or_insert(value);
        Ok(())
    }

    fn changelist(&self, _change: i64) -> p4dti_jobstore::error::Result<Option<Changelist>> {
        Ok(None)
    }

    fn fixes_for_job(&self, name: &str) -> p4dti_jobstore::error::Result<Vec<Fix>> {
        Ok(self.state.lock().unwrap().fixes.get(name).cloned().unwrap_or_default())
    }

    fn add_fix(&self, name: &str, fix: &Fix) -> p4dti_jobstore::error::Result<()> {
        let mut s = self.state.lock().unwrap();
        let entry = s.fixes.entry(name.to_string()).or_default();
        entry.retain(|f| f.change != fix.change);
        entry.push(fix.clone());
        Ok(())
    }

    fn remove_fix(&self, name: &str, change: i64) -> p4dti_jobstore::error::Result<()> {
        if let Some(v) = self.state.lock().unwrap().fixes.get_mut(name) {
            v.retain(|f| f.change != change);
        }
        Ok(())
    }

    fn ensure_client(&self, _name: &str) -> p4dti_jobstore::error::Result<()> {
        Ok(())
    }

    fn user_by_name(&self, name: &str) -> p4dti_jobstore::error::Result<Option<JobStoreUser>> {
        Ok(self.state.lock().unwrap().users.iter().find(|u| u.name == name).cloned())
    }

    fn all_users(&self) -> p4dti_jobstore::error::Result<Vec<JobStoreUser>> {
        Ok(self.state.lock().unwrap().users.clone())
    }

    fn any_jobs_exist(&self) -> p4dti_jobstore::error::Result<bool> {
        Ok(!self.state.lock().unwrap().jobs.is_empty())
    }

    fn all_jobs(&self) -> p4dti_jobstore::error::Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.state.lock().unwrap().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }
}

/// A [`Notifier`] that records every report sent instead of delivering
/// it, so tests can assert on notification content.
#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for FakeNotifier {
    fn send_report(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }

    fn send_admin_report(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(("admin".to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub fn issue(id: i64, status: p4dti_core::enums::Status, summary: &str) -> Issue {
    let now = Utc::now();
    Issue {
        issue_id: id,
        status,
        assignee: "alice".to_string(),
        reporter: "alice".to_string(),
        summary: summary.to_string(),
        description: String::new(),
        component: String::new(),
        version: String::new(),
        product: "widgets".to_string(),
        resolution: String::new(),
        extra: BTreeMap::new(),
        creation_ts: now,
        delta_ts: now,
    }
}

pub fn job(name: &str, rid: Option<&str>, issue_id: Option<i64>) -> Job {
    let mut fields = BTreeMap::new();
    fields.insert("Status".to_string(), "open".to_string());
    fields.insert("Summary".to_string(), "A_summary".to_string());
    fields.insert("Product".to_string(), "widgets".to_string());
    Job { name: name.to_string(), rid: rid.map(str::to_string), issue_id, user: "alice".to_string(), fields }
}

pub fn fix(change: i64, issue_id: i64, status: FixStatus) -> Fix {
    Fix { change, issue_id, status, user: "alice".to_string(), client: "client1".to_string(), date: Utc::now() }
}
