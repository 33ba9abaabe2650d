//! SQLite-backed implementation of the issue-side adapter.

mod changed;
mod changelists;
mod config;
mod filespecs;
mod fixes;
mod issues;
mod links;
mod replications;
mod store;
mod users;

pub mod schema;

pub use changed::ChangedIssues;
pub use issues::NewIssue;
pub use links::Link;
pub use store::{DeferredMail, SqliteStore};
pub use users::User;
