//! The link row: the sole source of truth for issue<->job pairing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub issue_id: i64,
    pub rid: String,
    pub sid: String,
    pub jobname: String,
    /// Set when this link was created by migration (job -> issue import)
    /// rather than by ordinary replication. Used to fence migrated issues
    /// out of the next poll's `changed_issues_since`.
    #[serde(default)]
    pub migrated: Option<DateTime<Utc>>,
}
