//! Invariant enforcement for issue updates.
//!
//! Mirrors the order the issue-side adapter applies before any write
//! reaches the database: read-only-field check, append-only-field check,
//! transition-allowed check, resolution-field reconciliation, and finally
//! the user-permission check. Each failure is a distinct [`UpdateError`]
//! variant so the replicator core can decide whether to revert a failed
//! job-to-issue write or simply propagate the error.

use std::collections::{HashMap, HashSet};

use crate::issue::{Issue, IssueUpdates};

/// A single invariant violation encountered while checking a proposed
/// update against an issue's current state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("field '{field}' is read-only and cannot be changed")]
    ReadOnlyField { field: String },

    #[error("field '{field}' is append-only; new value must extend the old value")]
    AppendOnlyViolation { field: String },

    #[error("transition from '{from}' to '{to}' is not allowed")]
    TransitionNotAllowed { from: String, to: String },

    #[error("status '{status}' requires a non-empty resolution")]
    ResolutionRequired { status: String },

    #[error("status '{status}' must not carry a resolution")]
    ResolutionMustBeEmpty { status: String },

    #[error("user '{user}' is not permitted to make this change")]
    PermissionDenied { user: String },
}

/// The configured invariant policy for issue updates. Built once at
/// startup from site configuration (state-transition table, closed-state
/// convention, read-only/append-only field sets).
#[derive(Debug, Clone, Default)]
pub struct IssueInvariants {
    /// Fields that may never be changed by an update once set.
    pub read_only_fields: HashSet<String>,
    /// Fields whose new value must extend the old value by exact prefix
    /// match (e.g. a description that only grows).
    pub append_only_fields: HashSet<String>,
    /// Allowed next-states per current status. A status absent from this
    /// map has no restriction (any transition is allowed).
    pub transitions: HashMap<String, HashSet<String>>,
    /// Statuses that require a non-empty resolution.
    pub resolved_states: HashSet<String>,
    /// Statuses that must carry an empty resolution.
    pub unresolved_states: HashSet<String>,
    /// Resolution synthesised when a resolved state is entered without
    /// one supplied.
    pub default_resolution: String,
}

impl IssueInvariants {
    /// Checks and reconciles `updates` against `issue`'s current state,
    /// in the order the issue-side adapter applies them. Returns a
    /// possibly-adjusted copy of `updates` (resolution may be
    /// synthesised) on success.
    ///
    /// `permitted` is the caller's precomputed bug-group/product-group
    /// permission check; it is consulted last, matching the source's
    /// ordering, even though the caller evaluates it eagerly.
    pub fn check_update(
        &self,
        issue: &Issue,
        updates: &IssueUpdates,
        user: &str,
        permitted: bool,
    ) -> Result<IssueUpdates, UpdateError> {
        let mut updates = updates.clone();

        self.check_read_only(issue, &updates)?;
        self.check_append_only(issue, &updates)?;
        self.check_transition(issue, &updates)?;
        self.reconcile_resolution(issue, &mut updates)?;

        if !permitted {
            return Err(UpdateError::PermissionDenied {
                user: user.to_owned(),
            });
        }

        Ok(updates)
    }

    fn check_read_only(&self, issue: &Issue, updates: &IssueUpdates) -> Result<(), UpdateError> {
        for field in &self.read_only_fields {
            if let Some(new) = updates.get(field) {
                if issue.differs(field, new) {
                    return Err(UpdateError::ReadOnlyField {
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_append_only(&self, issue: &Issue, updates: &IssueUpdates) -> Result<(), UpdateError> {
        for field in &self.append_only_fields {
            if let Some(new) = updates.get(field) {
                let old = issue.field_value(field).unwrap_or_default();
                if !new.starts_with(old.as_str()) {
                    return Err(UpdateError::AppendOnlyViolation {
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_transition(&self, issue: &Issue, updates: &IssueUpdates) -> Result<(), UpdateError> {
        let Some(new_status) = updates.status.as_ref() else {
            return Ok(());
        };
        let from = issue.status.as_str();
        let to = new_status.as_str();
        if from == to {
            return Ok(());
        }
        if let Some(allowed) = self.transitions.get(from) {
            if !allowed.contains(to) {
                return Err(UpdateError::TransitionNotAllowed {
                    from: from.to_owned(),
                    to: to.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Reconciles the `resolution` field against the target status:
    /// resolved states require a non-empty resolution (synthesising
    /// [`Self::default_resolution`] if none was supplied), unresolved
    /// states require an empty one.
    fn reconcile_resolution(
        &self,
        issue: &Issue,
        updates: &mut IssueUpdates,
    ) -> Result<(), UpdateError> {
        let target_status = updates
            .status
            .as_ref()
            .map(|s| s.as_str())
            .unwrap_or_else(|| issue.status.as_str());

        let target_resolution = updates
            .resolution
            .clone()
            .unwrap_or_else(|| issue.resolution.clone());

        if self.resolved_states.contains(target_status) {
            if target_resolution.is_empty() {
                updates.resolution = Some(self.default_resolution.clone());
            }
        } else if self.unresolved_states.contains(target_status) && !target_resolution.is_empty() {
            return Err(UpdateError::ResolutionMustBeEmpty {
                status: target_status.to_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Status;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn issue() -> Issue {
        Issue {
            issue_id: 1,
            status: Status::Open,
            assignee: "alice".into(),
            reporter: "bob".into(),
            summary: "Widget broken".into(),
            description: "it broke".into(),
            component: String::new(),
            version: String::new(),
            product: String::new(),
            resolution: String::new(),
            extra: BTreeMap::new(),
            creation_ts: Utc::now(),
            delta_ts: Utc::now(),
        }
    }

    fn invariants() -> IssueInvariants {
        let mut transitions = HashMap::new();
        transitions.insert(
            "open".to_string(),
            ["in_progress", "resolved"].iter().map(|s| s.to_string()).collect(),
        );
        transitions.insert(
            "in_progress".to_string(),
            ["resolved", "open"].iter().map(|s| s.to_string()).collect(),
        );
        transitions.insert(
            "resolved".to_string(),
            ["closed", "open"].iter().map(|s| s.to_string()).collect(),
        );

        IssueInvariants {
            read_only_fields: ["reporter".to_string()].into_iter().collect(),
            append_only_fields: ["description".to_string()].into_iter().collect(),
            transitions,
            resolved_states: ["resolved", "closed"].iter().map(|s| s.to_string()).collect(),
            unresolved_states: ["open", "in_progress"].iter().map(|s| s.to_string()).collect(),
            default_resolution: "FIXED".to_string(),
        }
    }

    #[test]
    fn read_only_field_change_rejected() {
        let mut updates = IssueUpdates::default();
        updates.reporter = Some("carol".into());
        let err = invariants().check_update(&issue(), &updates, "alice", true);
        assert!(matches!(err, Err(UpdateError::ReadOnlyField { .. })));
    }

    #[test]
    fn read_only_field_same_value_accepted() {
        let mut updates = IssueUpdates::default();
        updates.reporter = Some("bob".into());
        assert!(invariants().check_update(&issue(), &updates, "alice", true).is_ok());
    }

    #[test]
    fn append_only_field_must_extend_old_value() {
        let mut updates = IssueUpdates::default();
        updates.description = Some("it broke badly".into());
        assert!(invariants().check_update(&issue(), &updates, "alice", true).is_ok());

        let mut bad = IssueUpdates::default();
        bad.description = Some("completely different".into());
        let err = invariants().check_update(&issue(), &bad, "alice", true);
        assert!(matches!(err, Err(UpdateError::AppendOnlyViolation { .. })));
    }

    #[test]
    fn transition_not_in_table_rejected() {
        // open -> closed is not in the transitions table directly.
        let mut updates = IssueUpdates::default();
        updates.status = Some(Status::Closed);
        let err = invariants().check_update(&issue(), &updates, "alice", true);
        assert!(matches!(err, Err(UpdateError::TransitionNotAllowed { .. })));
    }

    #[test]
    fn transition_through_resolved_allowed() {
        let mut issue = issue();
        issue.status = Status::Resolved;
        let mut updates = IssueUpdates::default();
        updates.status = Some(Status::Closed);
        assert!(invariants().check_update(&issue, &updates, "alice", true).is_ok());
    }

    #[test]
    fn resolution_synthesised_on_resolve() {
        let mut updates = IssueUpdates::default();
        updates.status = Some(Status::Resolved);
        let applied = invariants().check_update(&issue(), &updates, "alice", true).unwrap();
        assert_eq!(applied.resolution.as_deref(), Some("FIXED"));
    }

    #[test]
    fn resolution_rejected_on_reopen() {
        let mut issue = issue();
        issue.status = Status::Resolved;
        issue.resolution = "FIXED".into();
        let mut updates = IssueUpdates::default();
        updates.status = Some(Status::Open);
        let err = invariants().check_update(&issue, &updates, "alice", true);
        assert!(matches!(err, Err(UpdateError::ResolutionMustBeEmpty { .. })));
    }

    #[test]
    fn explicit_resolution_on_resolve_is_kept() {
        let mut updates = IssueUpdates::default();
        updates.status = Some(Status::Resolved);
        updates.resolution = Some("WONTFIX".into());
        let applied = invariants().check_update(&issue(), &updates, "alice", true).unwrap();
        assert_eq!(applied.resolution.as_deref(), Some("WONTFIX"));
    }

    #[test]
    fn permission_denied_checked_last() {
        // Would also fail read-only, but permission denial is what the
        // caller should see when *only* permission fails.
        let updates = IssueUpdates::default();
        let err = invariants().check_update(&issue(), &updates, "mallory", false);
        assert!(matches!(err, Err(UpdateError::PermissionDenied { .. })));
    }
}
