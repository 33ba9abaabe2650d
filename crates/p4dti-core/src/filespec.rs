//! Filespec records: path-pattern associations between an issue and files.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filespec {
    pub issue_id: i64,
    pub filespec: String,
}

/// Set difference between a job's filespecs (held as a newline-separated
/// text field) and the issue's mirrored filespec rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilespecDiff {
    pub add_to_issue: Vec<String>,
    pub add_to_job: Vec<String>,
}

pub fn diff_filespecs(job_filespecs: &[String], issue_filespecs: &[String]) -> FilespecDiff {
    let job_set: HashSet<&str> = job_filespecs.iter().map(String::as_str).collect();
    let issue_set: HashSet<&str> = issue_filespecs.iter().map(String::as_str).collect();

    FilespecDiff {
        add_to_issue: job_set
            .difference(&issue_set)
            .map(|s| s.to_string())
            .collect(),
        add_to_job: issue_set
            .difference(&job_set)
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Parses a job's `P4DTI-filespecs` text field into individual filespecs.
///
/// The field's convention is one filespec per line, with a trailing
/// newline; blank lines are dropped.
pub fn parse_job_filespecs_field(text: &str) -> Vec<String> {
    text.lines().filter(|l| !l.trim().is_empty()).map(str::to_owned).collect()
}

/// Renders filespecs back into the job's text-field convention: one per
/// line, trailing newline.
pub fn render_job_filespecs_field(filespecs: &[String]) -> String {
    if filespecs.is_empty() {
        return String::new();
    }
    let mut s = filespecs.join("\n");
    s.push('\n');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_filespecs_detects_additions_both_ways() {
        let job = vec!["//depot/a/...".to_string(), "//depot/b/...".to_string()];
        let issue = vec!["//depot/b/...".to_string(), "//depot/c/...".to_string()];
        let diff = diff_filespecs(&job, &issue);
        assert_eq!(diff.add_to_issue, vec!["//depot/a/...".to_string()]);
        assert_eq!(diff.add_to_job, vec!["//depot/c/...".to_string()]);
    }

    #[test]
    fn parse_and_render_roundtrip() {
        let text = "//depot/a/...\n//depot/b/...\n";
        let parsed = parse_job_filespecs_field(text);
        assert_eq!(parsed, vec!["//depot/a/...", "//depot/b/..."]);
        assert_eq!(render_job_filespecs_field(&parsed), text);
    }

    #[test]
    fn parse_ignores_blank_lines() {
        let text = "//depot/a/...\n\n//depot/b/...\n";
        assert_eq!(
            parse_job_filespecs_field(text),
            vec!["//depot/a/...", "//depot/b/..."]
        );
    }
}
