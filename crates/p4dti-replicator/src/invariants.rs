//! Converts the site's configured invariant policy into
//! [`p4dti_core::validation::IssueInvariants`], and derives the fixed
//! set of side-0 statuses the status translator is built from.
//!
//! The status translator is built once at startup, not re-derived per
//! poll from whatever statuses happen to be in use; its domain is the
//! union of every status name mentioned anywhere
//! in the configured invariant policy plus the closed-state convention,
//! so a status that exists in the transition table but is not currently
//! held by any issue still gets a stable side-1 mapping.

use std::collections::{HashMap, HashSet};

use p4dti_config::{IssueInvariantsConfig, StatusTranslationConfig};
use p4dti_core::validation::IssueInvariants;

pub fn build_invariants(config: &IssueInvariantsConfig) -> IssueInvariants {
    let transitions: HashMap<String, HashSet<String>> = config
        .transitions
        .iter()
        .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
        .collect();

    IssueInvariants {
        read_only_fields: config.read_only_fields.iter().cloned().collect(),
        append_only_fields: config.append_only_fields.iter().cloned().collect(),
        transitions,
        resolved_states: config.resolved_states.iter().cloned().collect(),
        unresolved_states: config.unresolved_states.iter().cloned().collect(),
        default_resolution: config.default_resolution.clone(),
    }
}

/// The full set of side-0 status names known to the configured
/// invariant policy: every transition-table key and value, plus the
/// resolved/unresolved partitions and the closed-state convention.
pub fn known_side0_statuses(invariants: &IssueInvariantsConfig, status_translation: &StatusTranslationConfig) -> Vec<String> {
    let mut statuses: HashSet<String> = HashSet::new();

    for (from, to) in &invariants.transitions {
        statuses.insert(from.clone());
        for s in to {
            statuses.insert(s.clone());
        }
    }
    for s in &invariants.resolved_states {
        statuses.insert(s.clone());
    }
    for s in &invariants.unresolved_states {
        statuses.insert(s.clone());
    }
    for s in &status_translation.closed_states {
        statuses.insert(s.clone());
    }

    let mut statuses: Vec<String> = statuses.into_iter().collect();
    statuses.sort();
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_gathers_every_source() {
        let mut invariants = IssueInvariantsConfig::default();
        invariants.transitions.insert("open".to_string(), vec!["resolved".to_string()]);
        invariants.resolved_states = vec!["resolved".to_string()];
        let status_translation = StatusTranslationConfig { closed_states: vec!["archived".to_string()], ..Default::default() };

        let statuses = known_side0_statuses(&invariants, &status_translation);
        assert_eq!(statuses, vec!["archived".to_string(), "open".to_string(), "resolved".to_string()]);
    }

    #[test]
    fn build_invariants_converts_transition_table() {
        let mut config = IssueInvariantsConfig::default();
        config.transitions.insert("open".to_string(), vec!["resolved".to_string()]);
        let invariants = build_invariants(&config);
        assert!(invariants.transitions.get("open").unwrap().contains("resolved"));
    }
}
