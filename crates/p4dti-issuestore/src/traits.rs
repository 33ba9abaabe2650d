//! The issue-side adapter contract the replicator core polls against.

use chrono::{DateTime, Utc};

use p4dti_core::changelist::Changelist;
use p4dti_core::fix::Fix;
use p4dti_core::issue::{Issue, IssueUpdates};
use p4dti_core::validation::IssueInvariants;

use crate::error::Result;
use crate::sqlite::{ChangedIssues, Link, NewIssue, User};

/// Everything the replicator core needs from the issue side, independent
/// of the concrete storage engine. `SqliteStore` is the only
/// implementation shipped, but the boundary is kept as a trait so the
/// replicator core stays storage-agnostic and unit-testable against an
/// in-memory fake.
pub trait IssueStore: Send + Sync {
    fn init_schema(&self, rid: &str, sid: &str) -> Result<()>;

    fn issue(&self, id: i64) -> Result<Issue>;
    fn new_issue(&self, new: NewIssue) -> Result<Issue>;
    fn delete_issue(&self, id: i64) -> Result<()>;

    /// Applies `updates` under `invariants`, stamping the write as the
    /// replicator's own (so a later poll's self-echo detection
    /// recognizes it) when `mirror` is supplied.
    fn update_issue(
        &self,
        id: i64,
        updates: &IssueUpdates,
        user: &str,
        invariants: &IssueInvariants,
        permitted: bool,
        mirror: Option<(&str, &str)>,
    ) -> Result<Issue>;

    fn changed_issues_since(&self, fence: Option<DateTime<Utc>>, rid: &str, sid: &str) -> Result<ChangedIssues>;
    fn all_issues(&self) -> Result<Vec<i64>>;

    fn link_by_issue(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Option<Link>>;
    fn link_by_jobname(&self, jobname: &str, rid: &str, sid: &str) -> Result<Option<Link>>;
    fn set_link(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> Result<()>;
    fn mark_migrated(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> Result<()>;

    fn fixes_for_issue(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Vec<Fix>>;
    fn set_fix(&self, fix: &Fix, rid: &str, sid: &str) -> Result<()>;
    fn delete_fix(&self, change: i64, issue_id: i64, rid: &str, sid: &str) -> Result<()>;

    fn filespecs_for_issue(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Vec<String>>;
    fn add_filespec(&self, issue_id: i64, rid: &str, sid: &str, filespec: &str) -> Result<()>;
    fn remove_filespec(&self, issue_id: i64, rid: &str, sid: &str, filespec: &str) -> Result<()>;

    fn changelist(&self, change: i64, rid: &str, sid: &str) -> Result<Option<Changelist>>;
    fn set_changelist(&self, cl: &Changelist, rid: &str, sid: &str) -> Result<()>;

    fn config_get(&self, rid: &str, sid: &str, key: &str) -> Result<Option<String>>;
    fn config_set(&self, rid: &str, sid: &str, key: &str, value: &str) -> Result<()>;

    fn poll_start(&self, rid: &str, sid: &str) -> Result<(i64, Option<DateTime<Utc>>)>;
    fn poll_end(&self, id: i64, completed: bool) -> Result<Vec<crate::sqlite::DeferredMail>>;
    fn queue_mail(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    fn user_by_name(&self, name: &str) -> Result<Option<User>>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn upsert_user(&self, name: &str, email: &str) -> Result<()>;
    fn all_users(&self) -> Result<Vec<User>>;
    fn user_permitted_for_product(&self, user: &str, product: &str) -> Result<bool>;
}

impl IssueStore for crate::sqlite::SqliteStore {
    fn init_schema(&self, rid: &str, sid: &str) -> Result<()> {
        crate::sqlite::SqliteStore::init_schema(self, rid, sid)
    }

    fn issue(&self, id: i64) -> Result<Issue> {
        self.issue_impl(id)
    }

    fn new_issue(&self, new: NewIssue) -> Result<Issue> {
        self.new_issue_impl(new)
    }

    fn delete_issue(&self, id: i64) -> Result<()> {
        self.delete_impl(id)
    }

    fn update_issue(
        &self,
        id: i64,
        updates: &IssueUpdates,
        user: &str,
        invariants: &IssueInvariants,
        permitted: bool,
        mirror: Option<(&str, &str)>,
    ) -> Result<Issue> {
        self.update_impl(id, updates, user, invariants, permitted, mirror)
    }

    fn changed_issues_since(&self, fence: Option<DateTime<Utc>>, rid: &str, sid: &str) -> Result<ChangedIssues> {
        self.changed_issues_since_impl(fence, rid, sid)
    }

    fn all_issues(&self) -> Result<Vec<i64>> {
        self.all_issues_impl()
    }

    fn link_by_issue(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Option<Link>> {
        self.link_by_issue_impl(issue_id, rid, sid)
    }

    fn link_by_jobname(&self, jobname: &str, rid: &str, sid: &str) -> Result<Option<Link>> {
        self.link_by_jobname_impl(jobname, rid, sid)
    }

    fn set_link(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> Result<()> {
        self.set_link_impl(issue_id, rid, sid, jobname)
    }

    fn mark_migrated(&self, issue_id: i64, rid: &str, sid: &str, jobname: &str) -> Result<()> {
        self.mark_migrated_impl(issue_id, rid, sid, jobname)
    }

    fn fixes_for_issue(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Vec<Fix>> {
        self.fixes_for_issue_impl(issue_id, rid, sid)
    }

    fn set_fix(&self, fix: &Fix, rid: &str, sid: &str) -> Result<()> {
        self.set_fix_impl(fix, rid, sid)
    }

    fn delete_fix(&self, change: i64, issue_id: i64, rid: &str, sid: &str) -> Result<()> {
        self.delete_fix_impl(change, issue_id, rid, sid)
    }

    fn filespecs_for_issue(&self, issue_id: i64, rid: &str, sid: &str) -> Result<Vec<String>> {
        self.filespecs_for_issue_impl(issue_id, rid, sid)
    }

    fn add_filespec(&self, issue_id: i64, rid: &str, sid: &str, filespec: &str) -> Result<()> {
        self.add_filespec_impl(issue_id, rid, sid, filespec)
    }

    fn remove_filespec(&self, issue_id: i64, rid: &str, sid: &str, filespec: &str) -> Result<()> {
        self.remove_filespec_impl(issue_id, rid, sid, filespec)
    }

    fn changelist(&self, change: i64, rid: &str, sid: &str) -> Result<Option<Changelist>> {
        self.changelist_impl(change, rid, sid)
    }

    fn set_changelist(&self, cl: &Changelist, rid: &str, sid: &str) -> Result<()> {
        self.set_changelist_impl(cl, rid, sid)
    }

    fn config_get(&self, rid: &str, sid: &str, key: &str) -> Result<Option<String>> {
        self.config_get_impl(rid, sid, key)
    }

    fn config_set(&self, rid: &str, sid: &str, key: &str, value: &str) -> Result<()> {
        self.config_set_impl(rid, sid, key, value)
    }

    fn poll_start(&self, rid: &str, sid: &str) -> Result<(i64, Option<DateTime<Utc>>)> {
        crate::sqlite::SqliteStore::poll_start(self, rid, sid)
    }

    fn poll_end(&self, id: i64, completed: bool) -> Result<Vec<crate::sqlite::DeferredMail>> {
        crate::sqlite::SqliteStore::poll_end(self, id, completed)
    }

    fn queue_mail(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        crate::sqlite::SqliteStore::queue_mail(self, to, subject, body)
    }

    fn user_by_name(&self, name: &str) -> Result<Option<User>> {
        self.user_by_name_impl(name)
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_by_email_impl(email)
    }

    fn upsert_user(&self, name: &str, email: &str) -> Result<()> {
        self.upsert_user_impl(name, email)
    }

    fn all_users(&self) -> Result<Vec<User>> {
        self.all_users_impl()
    }

    fn user_permitted_for_product(&self, user: &str, product: &str) -> Result<bool> {
        self.user_permitted_for_product_impl(user, product)
    }
}
