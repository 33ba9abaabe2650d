//! One-shot fallback for log-sink failure: a logger that itself fails
//! to write is reported once via [`Notifier::send_admin_report`], and
//! every subsequent failure from that same logger is swallowed so a
//! broken sink cannot also flood the mail relay.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::error;

use crate::smtp::Notifier;

pub struct OneShotReporter<'a> {
    notifier: &'a dyn Notifier,
    reported: AtomicBool,
}

impl<'a> OneShotReporter<'a> {
    pub fn new(notifier: &'a dyn Notifier) -> Self {
        Self { notifier, reported: AtomicBool::new(false) }
    }

    /// Records a log-sink failure. Sends an admin report for the first
    /// occurrence only; later calls are no-ops.
    pub fn report_sink_failure(&self, sink: &str, error_text: &str) {
        if self.reported.swap(true, Ordering::SeqCst) {
            return;
        }
        error!(%sink, error = %error_text, "log sink failed; reporting once and suppressing further reports");
        if let Err(e) = self.notifier.send_admin_report(
            &format!("log sink '{sink}' failed"),
            &format!("the {sink} logger failed and will be suppressed for the rest of this run:\n\n{error_text}"),
        ) {
            error!(error = %e, "failed to send log-sink failure report itself");
        }
    }
}
