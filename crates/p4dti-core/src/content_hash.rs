//! Deterministic content hashing for issues.
//!
//! Produces a SHA-256 hex digest over all substantive fields (excluding
//! id and timestamps) so the consistency audit can cheaply tell whether
//! a would-be changeset between a linked issue and job pair is empty
//! without materialising the full translated field set.

use sha2::{Digest, Sha256};

use crate::issue::Issue;

const SEP: u8 = 0;

pub fn compute_content_hash(issue: &Issue) -> String {
    let mut h = Sha256::new();

    write_str(&mut h, issue.status.as_str());
    write_str(&mut h, &issue.assignee);
    write_str(&mut h, &issue.reporter);
    write_str(&mut h, &issue.summary);
    write_str(&mut h, &issue.description);
    write_str(&mut h, &issue.component);
    write_str(&mut h, &issue.version);
    write_str(&mut h, &issue.product);
    write_str(&mut h, &issue.resolution);

    for (key, value) in &issue.extra {
        write_str(&mut h, key);
        match value {
            crate::issue::FieldValue::Text(s) => write_str(&mut h, s),
            crate::issue::FieldValue::Int(n) => write_str(&mut h, &n.to_string()),
            crate::issue::FieldValue::None => h.update([SEP]),
        }
    }

    format!("{:x}", h.finalize())
}

fn write_str(h: &mut Sha256, s: &str) {
    h.update(s.as_bytes());
    h.update([SEP]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Status;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample(summary: &str) -> Issue {
        Issue {
            issue_id: 1,
            status: Status::Open,
            assignee: String::new(),
            reporter: String::new(),
            summary: summary.into(),
            description: String::new(),
            component: String::new(),
            version: String::new(),
            product: String::new(),
            resolution: String::new(),
            extra: BTreeMap::new(),
            creation_ts: Utc::now(),
            delta_ts: Utc::now(),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let issue = sample("Widget broken");
        assert_eq!(compute_content_hash(&issue), compute_content_hash(&issue));
    }

    #[test]
    fn hash_ignores_id_and_timestamps() {
        let mut a = sample("Same content");
        let mut b = sample("Same content");
        a.issue_id = 1;
        b.issue_id = 2;
        a.delta_ts = Utc::now();
        b.delta_ts = a.delta_ts + chrono::Duration::days(1);
        assert_eq!(compute_content_hash(&a), compute_content_hash(&b));
    }

    #[test]
    fn hash_differs_on_content_change() {
        assert_ne!(
            compute_content_hash(&sample("A")),
            compute_content_hash(&sample("B"))
        );
    }
}
