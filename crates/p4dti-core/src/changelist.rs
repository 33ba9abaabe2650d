//! Changelist records: side-1 revisions mirrored for cross-system queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changelist {
    pub change: i64,
    pub user: String,
    #[serde(default)]
    pub client: String,
    pub description: String,
    /// `pending` or `submitted`, opaque to the replicator beyond equality.
    pub status: String,
    pub date: DateTime<Utc>,
}
