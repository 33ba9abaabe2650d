//! Flushes mail queued by the issue-side adapter during its critical
//! section.
//!
//! Two candidate delivery scripts are probed, in order, inside a chosen
//! working directory: `processmail` first, then `contrib/sendbugmail.pl`.
//! The invocation prefix and stdout/stderr handling are OS-specific,
//! since the scripts this mirrors are shell scripts on Unix and need a
//! perl interpreter prefix on Windows.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::{NotifyError, Result};

/// One queued mail action: recipient, subject, and body.
#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

const CANDIDATES: &[&str] = &["processmail", "contrib/sendbugmail.pl"];

/// Delivers queued mail by invoking a probed script per item, restoring
/// the process's working directory on every path afterward.
pub struct DeferredMailer {
    working_dir: PathBuf,
}

impl DeferredMailer {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self { working_dir: working_dir.into() }
    }

    /// Flushes every queued mail action, probing for a delivery script
    /// once and reusing it for the whole batch. Returns the first error
    /// encountered but still attempts every item.
    pub fn flush(&self, mails: &[Mail]) -> Result<()> {
        let Some(script) = self.find_script() else {
            if mails.is_empty() {
                return Ok(());
            }
            return Err(NotifyError::Delivery(format!(
                "no deferred-mail script found in {}",
                self.working_dir.display()
            )));
        };

        let mut first_error = None;
        for mail in mails {
            if let Err(e) = self.deliver(&script, mail) {
                warn!(to = %mail.to, subject = %mail.subject, error = %e, "deferred mail delivery failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn find_script(&self) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|name| self.working_dir.join(name))
            .find(|path| path.exists())
    }

    fn deliver(&self, script: &Path, mail: &Mail) -> Result<()> {
        let (program, args): (&str, Vec<String>) = if cfg!(windows) {
            ("perl", vec![script.display().to_string()])
        } else {
            (script.to_str().ok_or_else(|| NotifyError::Message("non-UTF-8 script path".to_string()))?, Vec::new())
        };

        debug!(?program, ?args, to = %mail.to, "invoking deferred-mail script");

        let mut child = Command::new(program)
            .args(&args)
            .arg(&mail.to)
            .arg(&mail.subject)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| NotifyError::Transport(format!("failed to spawn deferred-mail script: {e}")))?;

        {
            use std::io::Write;
            let stdin = child.stdin.as_mut().expect("piped stdin");
            stdin
                .write_all(mail.body.as_bytes())
                .map_err(|e| NotifyError::Transport(format!("failed to write mail body: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| NotifyError::Transport(format!("failed to wait on deferred-mail script: {e}")))?;

        if !output.status.success() {
            return Err(NotifyError::Delivery(format!(
                "deferred-mail script exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}
