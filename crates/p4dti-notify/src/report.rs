//! Composes the standard report bodies: conflict overwrites, startup
//! summaries, and top-level poll failures. Each builder returns a
//! `(subject, body)` pair ready for [`crate::smtp::Notifier::send_admin_report`]
//! or [`crate::smtp::Notifier::send_report`].

/// A conflict was resolved by overwriting one side; both a user and the
/// administrator hear about it.
pub fn conflict_overwrite(rid: &str, pair_id: &str, winner_side: u8, fields: &[String]) -> (String, String) {
    let subject = format!("[{rid}] conflict resolved for {pair_id}");
    let body = format!(
        "A field conflict was detected for {pair_id} during replication {rid}.\n\n\
         Side {winner_side} won; the following fields were overwritten on the \
         losing side:\n\n{}",
        fields.join(", ")
    );
    (subject, body)
}

/// A side-1 write failed after a local edit and the pair was reverted
/// from the side-0 record.
pub fn revert_notice(rid: &str, pair_id: &str, pre_overwrite_snapshot: &str) -> (String, String) {
    let subject = format!("[{rid}] your edit to {pair_id} was reverted");
    let body = format!(
        "Your change to {pair_id} could not be written back and has been \
         reverted to match the tracker record.\n\n\
         Snapshot of your edit before it was overwritten:\n\n{pre_overwrite_snapshot}"
    );
    (subject, body)
}

/// Both the forward write and its revert failed; give up on the pair
/// for this cycle and report both tracebacks.
pub fn revert_failure(rid: &str, pair_id: &str, write_error: &str, revert_error: &str) -> (String, String) {
    let subject = format!("[{rid}] {pair_id} could not be replicated or reverted");
    let body = format!(
        "Replication of {pair_id} failed, and the attempt to revert the \
         failed write also failed. This pair has been skipped for the \
         current cycle.\n\n\
         Write error:\n{write_error}\n\n\
         Revert error:\n{revert_error}"
    );
    (subject, body)
}

/// Startup summary: unmatched and duplicate-email users found while
/// building the user translator.
pub fn startup_report(rid: &str, unmatched_side0: &[String], unmatched_side1: &[String]) -> (String, String) {
    let subject = format!("[{rid}] replicator startup report");
    let mut body = String::from("Replicator startup completed.\n\n");
    if unmatched_side0.is_empty() && unmatched_side1.is_empty() {
        body.push_str("All users matched by email on both sides.");
    } else {
        if !unmatched_side0.is_empty() {
            body.push_str(&format!("Unmatched side-0 users: {}\n\n", unmatched_side0.join(", ")));
        }
        if !unmatched_side1.is_empty() {
            body.push_str(&format!("Unmatched side-1 users: {}\n\n", unmatched_side1.join(", ")));
        }
    }
    (subject, body)
}

/// A poll cycle failed and unwound to the top-level handler.
pub fn poll_failure(rid: &str, error_text: &str, next_poll_period_secs: u64) -> (String, String) {
    let subject = format!("[{rid}] poll cycle failed");
    let body = format!(
        "A poll cycle failed with the following error and has been \
         abandoned:\n\n{error_text}\n\n\
         The poll period has been doubled to {next_poll_period_secs} seconds."
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_overwrite_names_the_winning_side() {
        let (subject, body) = conflict_overwrite("dt-main", "ISSUE-7/job0007", 1, &["priority".to_string()]);
        assert!(subject.contains("ISSUE-7/job0007"));
        assert!(body.contains("Side 1 won"));
        assert!(body.contains("priority"));
    }

    #[test]
    fn startup_report_notes_a_clean_match() {
        let (_, body) = startup_report("dt-main", &[], &[]);
        assert!(body.contains("All users matched"));
    }

    #[test]
    fn startup_report_lists_unmatched_users() {
        let (_, body) = startup_report("dt-main", &["alice".to_string()], &["bob".to_string()]);
        assert!(body.contains("alice"));
        assert!(body.contains("bob"));
    }
}
