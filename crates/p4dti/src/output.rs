//! Output formatting for command results: human-readable text by
//! default, pretty-printed JSON under `--json`.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::json;

use p4dti_replicator::{AuditReport, Discrepancy, MigrationSummary, PollSummary, RefreshSummary, UserMigrationSummary};

/// Prints a value as pretty-printed JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let _ = writeln!(handle, "{text}");
        }
        Err(e) => eprintln!("failed to serialize JSON: {e}"),
    }
}

pub fn print_poll_summary(summary: &PollSummary, json: bool) {
    if json {
        print_json(&json!({
            "pairs_dispatched": summary.pairs_dispatched,
            "conflicts": summary.conflicts,
            "reverts": summary.reverts,
        }));
        return;
    }
    println!(
        "poll complete: {} pair(s) dispatched, {} conflict(s), {} revert(s)",
        summary.pairs_dispatched, summary.conflicts, summary.reverts
    );
}

pub fn print_migration_summary(summary: &MigrationSummary, json: bool) {
    if json {
        print_json(&json!({
            "migrated": summary.migrated,
            "skipped_already_linked": summary.skipped_already_linked,
            "skipped_by_predicate": summary.skipped_by_predicate,
        }));
        return;
    }
    println!(
        "migrated {} job(s); skipped {} already linked, {} rejected by predicate",
        summary.migrated, summary.skipped_already_linked, summary.skipped_by_predicate
    );
}

pub fn print_refresh_summary(summary: &RefreshSummary, json: bool) {
    if json {
        print_json(&json!({ "pushed": summary.pushed }));
        return;
    }
    println!("refreshed {} issue(s) onto their linked jobs", summary.pushed);
}

pub fn print_audit_report(report: &AuditReport, json: bool) {
    if json {
        let items: Vec<String> = report.discrepancies.iter().map(discrepancy_text).collect();
        print_json(&json!({ "tally": report.tally(), "discrepancies": items }));
        return;
    }
    if report.discrepancies.is_empty() {
        println!("audit clean: no discrepancies found");
        return;
    }
    println!("audit found {} discrepancy(ies):", report.tally());
    for d in &report.discrepancies {
        println!("  - {}", discrepancy_text(d));
    }
}

pub fn print_user_migration_summary(summary: &UserMigrationSummary, json: bool) {
    if json {
        print_json(&json!({ "added": summary.added }));
        return;
    }
    println!("added/updated {} user account(s) from the job store", summary.added);
}

fn discrepancy_text(d: &Discrepancy) -> String {
    match d {
        Discrepancy::UnlinkedIssue { issue_id } => format!("issue {issue_id} has no link row"),
        Discrepancy::LinkedToNonexistentJob { issue_id, jobname } => {
            format!("issue {issue_id} links to nonexistent job {jobname}")
        }
        Discrepancy::AsymmetricLink { issue_id, jobname, job_says_issue_id } => {
            format!("issue {issue_id} links to {jobname}, which claims issue {job_says_issue_id:?}")
        }
        Discrepancy::FieldDivergence { issue_id, jobname } => {
            format!("issue {issue_id} and job {jobname} have diverged fields")
        }
        Discrepancy::FixMismatch { issue_id, jobname } => {
            format!("issue {issue_id} and job {jobname} have mismatched fixes")
        }
        Discrepancy::FilespecMismatch { issue_id, jobname } => {
            format!("issue {issue_id} and job {jobname} have mismatched filespecs")
        }
        Discrepancy::OrphanJob { jobname } => format!("job {jobname} is owned by this replicator but links to no issue"),
    }
}
