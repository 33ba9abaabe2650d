//! Integration tests driving [`Replicator`] end to end against the
//! in-memory fakes in [`crate::test_support`].

use p4dti_config::ReplicatorConfig;
use p4dti_core::enums::Status;
use p4dti_issuestore::IssueStore;
use p4dti_jobstore::JobStore;

use crate::replicator::Replicator;
use crate::test_support::{fix, issue, job, FakeIssueStore, FakeJobStore, FakeNotifier};

fn config() -> ReplicatorConfig {
    let mut config = ReplicatorConfig::bootstrap("DT", "p4.example.com", ":memory:");
    config.invariants.unresolved_states = vec!["open".to_string()];
    config.invariants.resolved_states = vec!["resolved".to_string()];
    config.invariants.transitions.insert("open".to_string(), vec!["resolved".to_string()]);
    config.invariants.transitions.insert("resolved".to_string(), vec!["closed".to_string(), "open".to_string()]);
    config.bookkeeping_user_side0 = "dt-bookkeeping".to_string();
    config.bookkeeping_user_side1 = "dt-bookkeeping".to_string();
    config
}

fn replicator() -> Replicator<FakeIssueStore, FakeJobStore, FakeNotifier> {
    Replicator::new(config(), FakeIssueStore::new(), FakeJobStore::new(), FakeNotifier::new())
}

fn replicator_with(config: ReplicatorConfig) -> Replicator<FakeIssueStore, FakeJobStore, FakeNotifier> {
    Replicator::new(config, FakeIssueStore::new(), FakeJobStore::new(), FakeNotifier::new())
}

#[test]
fn issue_only_change_creates_and_links_a_job() {
    let mut r = replicator();
    r.issue_store().seed_issue(issue(1, Status::Open, "Widget is broken"));
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_user("alice", "alice@example.com");
    r.issue_store().report_as_new(1);

    let summary = r.poll().unwrap();
    assert_eq!(summary.pairs_dispatched, 1);
    assert_eq!(summary.conflicts, 0);

    let link = r.issue_store().link_by_issue(1, "DT", "p4.example.com").unwrap().unwrap();
    let saved = r.job_store().job_snapshot(&link.jobname);
    assert_eq!(saved.rid.as_deref(), Some("DT"));
    assert_eq!(saved.issue_id, Some(1));
    assert_eq!(saved.field("Summary"), Some("Widget_is_broken"));
}

#[test]
fn job_only_change_on_unlinked_job_creates_an_issue() {
    let mut r = replicator();
    r.job_store().seed_user("alice", "alice@example.com");
    r.issue_store().seed_user("alice", "alice@example.com");

    let mut new_job = job("job0001", None, None);
    new_job.fields.insert("Summary".to_string(), "Imported_from_job_store".to_string());
    r.job_store().seed_job(new_job);
    r.job_store().report_job_as_changed("job0001");

    let summary = r.poll().unwrap();
    assert_eq!(summary.pairs_dispatched, 1);

    let link = r.issue_store().link_by_jobname("job0001", "DT", "p4.example.com").unwrap().unwrap();
    let saved_issue = r.issue_store().issue_snapshot(link.issue_id);
    assert_eq!(saved_issue.summary, "Imported_from_job_store");
}

#[test]
fn conflict_dt_policy_overwrites_job_and_notifies_admin() {
    let mut r = replicator();
    r.issue_store().seed_issue(issue(2, Status::Open, "Both sides changed"));
    r.issue_store().seed_link(2, "DT", "p4.example.com", "job0002");
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_user("alice", "alice@example.com");
    let mut edited_job = job("job0002", Some("DT"), Some(2));
    edited_job.fields.insert("Summary".to_string(), "Job_side_edit".to_string());
    r.job_store().seed_job(edited_job);
    r.issue_store().report_as_changed(2);
    r.job_store().report_job_as_changed("job0002");

    let summary = r.poll().unwrap();
    assert_eq!(summary.pairs_dispatched, 1);
    assert_eq!(summary.conflicts, 1);

    let saved = r.job_store().job_snapshot("job0002");
    assert_eq!(saved.field("Summary"), Some("Both_sides_changed"));
    assert!(!r.notifier().sent().is_empty());
}

#[test]
fn migrate_skips_already_linked_jobs() {
    let mut r = replicator();
    r.job_store().seed_user("alice", "alice@example.com");
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_job(job("job0003", Some("DT"), Some(9)));

    let summary = r.migrate(None).unwrap();
    assert_eq!(summary.migrated, 0);
    assert_eq!(summary.skipped_already_linked, 1);
}

#[test]
fn migrate_respects_accept_product_pattern() {
    let mut cfg = config();
    cfg.issue_store.accept_product_pattern = "gadgets*".to_string();
    let mut r = replicator_with(cfg);
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_user("alice", "alice@example.com");

    r.job_store().seed_job(job("job0004", None, None));
    let summary = r.migrate(None).unwrap();
    assert_eq!(summary.migrated, 0);
    assert_eq!(summary.skipped_by_predicate, 1);
}

#[test]
fn refresh_pushes_every_issue_and_clears_event_counter() {
    let mut r = replicator();
    r.issue_store().seed_issue(issue(5, Status::Open, "Needs a push"));
    r.issue_store().seed_link(5, "DT", "p4.example.com", "job0005");
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_job(job("job0005", Some("DT"), Some(5)));
    r.job_store().counter_set("P4DTI-DT", 42).unwrap();

    let summary = r.refresh().unwrap();
    assert_eq!(summary.pushed, 1);
    assert_eq!(r.job_store().counter_get("P4DTI-DT").unwrap(), 0);

    let saved = r.job_store().job_snapshot("job0005");
    assert_eq!(saved.field("Summary"), Some("Needs_a_push"));
}

#[test]
fn audit_reports_unlinked_issue_and_orphan_job() {
    let mut r = replicator();
    r.issue_store().seed_issue(issue(6, Status::Open, "No link row"));
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_user("alice", "alice@example.com");

    let mut orphan = job("job0006", Some("DT"), None);
    orphan.rid = Some("DT".to_string());
    r.job_store().seed_job(orphan);

    let report = r.audit().unwrap();
    assert!(report.discrepancies.iter().any(|d| matches!(d, crate::audit::Discrepancy::UnlinkedIssue { issue_id: 6 })));
    assert!(report.discrepancies.iter().any(|d| matches!(d, crate::audit::Discrepancy::OrphanJob { jobname } if jobname == "job0006")));
    assert!(report.tally() >= 2);
}

#[test]
fn audit_is_clean_when_every_linked_pair_agrees() {
    let mut r = replicator();
    r.issue_store().seed_issue(issue(7, Status::Open, "In sync"));
    r.issue_store().seed_link(7, "DT", "p4.example.com", "job0007");
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_user("alice", "alice@example.com");

    let mut in_sync = job("job0007", Some("DT"), Some(7));
    in_sync.fields.insert("Summary".to_string(), "In_sync".to_string());
    in_sync.fields.insert("Owner".to_string(), "alice".to_string());
    in_sync.fields.insert("ReportedBy".to_string(), "alice".to_string());
    in_sync.fields.insert("Component".to_string(), "".to_string());
    in_sync.fields.insert("Version".to_string(), "".to_string());
    in_sync.fields.insert("Product".to_string(), "widgets".to_string());
    in_sync.fields.insert("Resolution".to_string(), "".to_string());
    in_sync.fields.insert("Description".to_string(), "".to_string());
    r.job_store().seed_job(in_sync);

    let report = r.audit().unwrap();
    assert!(report.discrepancies.is_empty(), "unexpected discrepancies: {:?}", report.discrepancies);
}

#[test]
fn startup_fails_fast_on_pre_existing_jobs_without_link_fields() {
    let mut r = replicator();
    r.job_store().seed_job(job("job0008", None, None));

    let err = r.startup_checks();
    assert!(matches!(err, Err(crate::error::Error::PreExistingJobsWithoutLinkFields)));
}

#[test]
fn startup_installs_jobspec_and_mails_admin_report() {
    let mut r = replicator();
    let result = r.startup_checks();
    assert!(result.is_ok(), "startup failed: {result:?}");

    let installed = r.job_store().read_jobspec().unwrap();
    assert!(installed.has_link_fields());
    assert!(!r.notifier().sent().is_empty());
}

#[test]
fn fix_replication_mirrors_job_fixes_onto_the_issue() {
    let mut r = replicator();
    r.issue_store().seed_issue(issue(8, Status::Open, "Has a fix"));
    r.issue_store().seed_link(8, "DT", "p4.example.com", "job0009");
    r.issue_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_user("alice", "alice@example.com");
    r.job_store().seed_job(job("job0009", Some("DT"), Some(8)));
    r.job_store().add_fix("job0009", &fix(100, 8, p4dti_core::enums::FixStatus::Closed)).unwrap();
    r.issue_store().report_as_changed(8);

    r.poll().unwrap();

    let mirrored = r.issue_store().fixes_for_issue(8, "DT", "p4.example.com").unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].change, 100);
}
