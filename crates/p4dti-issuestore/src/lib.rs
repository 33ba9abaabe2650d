//! SQLite-backed issue-side adapter for the p4dti replicator.
//!
//! [`SqliteStore`] is the concrete storage engine; [`IssueStore`] is the
//! trait boundary the replicator core polls against, so the core stays
//! storage-agnostic. `update_issue` routes every write through
//! [`p4dti_core::validation::IssueInvariants`] before it touches SQLite.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use sqlite::{ChangedIssues, DeferredMail, Link, NewIssue, SqliteStore, User};
pub use traits::IssueStore;
