//! The status translator: table-driven, built once at configuration
//! time from the set of observed side-0 statuses, the closed-state
//! convention, and the prohibited-name remapping (`new`/`ignore` are
//! reserved side-1 status names used by the replicator's bookkeeping
//! and must never collide with a site status).

use std::collections::HashMap;

use crate::error::{Result, TranslateError};
use crate::keyword;

const PROHIBITED: &[&str] = &["new", "ignore"];
const CLOSED_TARGET: &str = "closed";

/// A one-to-one mapping between side-0 status names and side-1 status
/// names, guaranteed to contain `closed` on the side-1 side even if no
/// side-0 status keyword-translates to it.
#[derive(Debug, Clone)]
pub struct StatusTranslator {
    to_1: HashMap<String, String>,
    to_0: HashMap<String, String>,
}

impl StatusTranslator {
    /// Builds the table from every status observed on side 0, plus the
    /// site's closed-state convention and prohibited-name prefix.
    ///
    /// `side0_statuses` need not include "closed" -- if none of the
    /// source statuses keyword-translate to the side-1 name `closed`,
    /// one is synthesised, backed by the first entry of `closed_states`
    /// (or `closed` itself if that is also absent from the source set).
    pub fn build(side0_statuses: &[String], closed_states: &[String], prohibited_prefix: &str) -> Self {
        let mut to_1 = HashMap::new();
        let mut to_0 = HashMap::new();
        let mut used: std::collections::HashSet<String> = std::collections::HashSet::new();

        for status in side0_statuses {
            let mut candidate = keyword::to_1(status);
            if PROHIBITED.contains(&candidate.as_str()) {
                candidate = format!("{prohibited_prefix}_{candidate}");
            }
            let unique = uniquify(candidate, &used);
            used.insert(unique.clone());
            to_1.insert(status.clone(), unique.clone());
            to_0.insert(unique, status.clone());
        }

        if !used.contains(CLOSED_TARGET) {
            let backing = closed_states
                .first()
                .cloned()
                .unwrap_or_else(|| CLOSED_TARGET.to_string());
            to_1.insert(backing.clone(), CLOSED_TARGET.to_string());
            to_0.insert(CLOSED_TARGET.to_string(), backing);
        }

        Self { to_1, to_0 }
    }

    pub fn to_1(&self, status: &str) -> Result<&str> {
        self.to_1
            .get(status)
            .map(String::as_str)
            .ok_or_else(|| TranslateError::StatusNotMapped { status: status.to_string() })
    }

    pub fn to_0(&self, status: &str) -> Result<&str> {
        self.to_0
            .get(status)
            .map(String::as_str)
            .ok_or_else(|| TranslateError::StatusNotMapped { status: status.to_string() })
    }

    /// The full side-1 target status set, for jobspec `select` field
    /// construction.
    pub fn side1_values(&self) -> Vec<String> {
        let mut values: Vec<String> = self.to_0.keys().cloned().collect();
        values.sort();
        values
    }
}

fn uniquify(candidate: String, used: &std::collections::HashSet<String>) -> String {
    if !used.contains(&candidate) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let attempt = format!("{candidate}_{n}");
        if !used.contains(&attempt) {
            return attempt;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_to_one_mapping() {
        let statuses = vec!["open".to_string(), "closed".to_string()];
        let t = StatusTranslator::build(&statuses, &[], "dt");
        assert_eq!(t.to_1("open").unwrap(), "open");
        assert_eq!(t.to_1("closed").unwrap(), "closed");
        assert_eq!(t.to_0("open").unwrap(), "open");
    }

    #[test]
    fn remaps_prohibited_names() {
        let statuses = vec!["new".to_string(), "ignore".to_string()];
        let t = StatusTranslator::build(&statuses, &[], "dt");
        assert_eq!(t.to_1("new").unwrap(), "dt_new");
        assert_eq!(t.to_1("ignore").unwrap(), "dt_ignore");
    }

    #[test]
    fn synthesises_closed_when_absent_from_source() {
        let statuses = vec!["open".to_string(), "resolved".to_string()];
        let t = StatusTranslator::build(&statuses, &["resolved".to_string()], "dt");
        assert_eq!(t.to_0("closed").unwrap(), "resolved");
    }

    #[test]
    fn unmapped_status_is_an_error() {
        let t = StatusTranslator::build(&["open".to_string()], &[], "dt");
        assert!(matches!(t.to_1("unknown"), Err(TranslateError::StatusNotMapped { .. })));
    }
}
