//! Notification delivery for the p4dti replicator: administrator and
//! user reports sent over SMTP, plus the issue-side adapter's deferred
//! mail-delivery scripts flushed after `poll_end`.

pub mod deferred;
pub mod error;
pub mod log_once;
pub mod report;
pub mod smtp;
pub mod wrap;

pub use deferred::{DeferredMailer, Mail};
pub use error::{NotifyError, Result};
pub use log_once::OneShotReporter;
pub use smtp::{Notifier, SmtpNotifier};
