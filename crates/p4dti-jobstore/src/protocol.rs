//! Transport boundary to the revision-control system's subprocess client.
//!
//! The wire syntax of the client's RPC is out of scope (per the design);
//! what matters is the shape the rest of this crate consumes: a command
//! invocation returns zero or more flat string-keyed records, and the
//! transport negotiates a Unicode/non-Unicode encoding mode once at
//! startup, retrying a failed call exactly once if the failure looks
//! encoding-related.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{JobStoreError, Result};

/// A single record returned by a client command: field name -> value.
pub type Record = BTreeMap<String, String>;

/// The negotiated character encoding used to decode subprocess output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    Utf8,
    /// Platform-default decoding, falling back to Latin-1 when the
    /// platform default is unusable (ASCII-compatible single-byte).
    Latin1,
}

impl EncodingMode {
    fn charset_flag(self) -> &'static str {
        match self {
            EncodingMode::Utf8 => "utf8",
            EncodingMode::Latin1 => "iso8859-1",
        }
    }

    fn toggled(self) -> Self {
        match self {
            EncodingMode::Utf8 => EncodingMode::Latin1,
            EncodingMode::Latin1 => EncodingMode::Utf8,
        }
    }
}

/// Transport to the job store's subprocess client.
pub trait JobClient: Send + Sync {
    /// Runs one command, optionally feeding it a single input record,
    /// and returns the records it produced.
    fn run(&self, args: &[String], input: Option<&Record>) -> Result<Vec<Record>>;

    /// The encoding mode currently in effect.
    fn encoding_mode(&self) -> EncodingMode;
}

/// Spawns the configured client binary as a child process per command.
pub struct ProcessJobClient {
    binary: PathBuf,
    base_args: Vec<String>,
    mode: Mutex<EncodingMode>,
}

impl ProcessJobClient {
    pub fn new(binary: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            base_args,
            mode: Mutex::new(EncodingMode::Utf8),
        }
    }

    /// Probes the server's reported Unicode mode and adopts it as the
    /// initial encoding. Called once at startup; `run` handles the
    /// retry-on-mismatch case thereafter.
    pub fn negotiate_encoding(&self) -> Result<()> {
        let records = self.spawn(&["info".to_string()], None, EncodingMode::Utf8)?;
        let unicode = records
            .first()
            .and_then(|r| r.get("unicode"))
            .map(|v| v == "enabled")
            .unwrap_or(false);
        let mode = if unicode { EncodingMode::Utf8 } else { EncodingMode::Latin1 };
        *self.mode.lock().expect("encoding mutex poisoned") = mode;
        debug!(?mode, "negotiated job store encoding");
        Ok(())
    }

    fn spawn(&self, args: &[String], input: Option<&Record>, mode: EncodingMode) -> Result<Vec<Record>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.base_args);
        cmd.arg("-C").arg(mode.charset_flag());
        cmd.args(args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        if let Some(record) = input {
            let mut stdin = child.stdin.take().expect("stdin was piped");
            stdin.write_all(encode_record(record).as_bytes())?;
        } else {
            drop(child.stdin.take());
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = decode_bytes(&output.stderr, mode);
            return Err(JobStoreError::CommandFailed {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = decode_bytes(&output.stdout, mode);
        parse_records(&stdout)
    }

    fn is_encoding_error(stderr: &str) -> bool {
        let lower = stderr.to_ascii_lowercase();
        lower.contains("unicode") || lower.contains("charset") || lower.contains("translation of text failed")
    }
}

impl JobClient for ProcessJobClient {
    fn run(&self, args: &[String], input: Option<&Record>) -> Result<Vec<Record>> {
        let mode = *self.mode.lock().expect("encoding mutex poisoned");
        match self.spawn(args, input, mode) {
            Ok(records) => Ok(records),
            Err(JobStoreError::CommandFailed { stderr, .. }) if Self::is_encoding_error(&stderr) => {
                let retry_mode = mode.toggled();
                warn!(?mode, ?retry_mode, "job store reported an encoding error, retrying once");
                *self.mode.lock().expect("encoding mutex poisoned") = retry_mode;
                self.spawn(args, input, retry_mode)
                    .map_err(|e| JobStoreError::EncodingNegotiationFailed(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn encoding_mode(&self) -> EncodingMode {
        *self.mode.lock().expect("encoding mutex poisoned")
    }
}

fn decode_bytes(bytes: &[u8], mode: EncodingMode) -> String {
    match mode {
        EncodingMode::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        EncodingMode::Latin1 => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Encodes a single input record as `key\tvalue` lines, terminated by a
/// blank line.
fn encode_record(record: &Record) -> String {
    let mut s = String::new();
    for (k, v) in record {
        s.push_str(k);
        s.push('\t');
        s.push_str(v);
        s.push('\n');
    }
    s.push('\n');
    s
}

/// Parses client output into records: consecutive `key\tvalue` lines
/// form one record, a blank line separates records.
fn parse_records(text: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut current = Record::new();
    for line in text.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }
        let (key, value) = line
            .split_once('\t')
            .ok_or_else(|| JobStoreError::Parse(format!("malformed record line: {line:?}")))?;
        current.insert(key.to_string(), value.to_string());
    }
    if !current.is_empty() {
        records.push(current);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_records_splits_on_blank_lines() {
        let text = "job\tDT-1\nstatus\topen\n\njob\tDT-2\nstatus\tclosed\n";
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("job").unwrap(), "DT-1");
        assert_eq!(records[1].get("status").unwrap(), "closed");
    }

    #[test]
    fn parse_records_rejects_malformed_line() {
        let err = parse_records("not-a-key-value-pair\n");
        assert!(matches!(err, Err(JobStoreError::Parse(_))));
    }

    #[test]
    fn encode_record_terminates_with_blank_line() {
        let mut rec = Record::new();
        rec.insert("Job".to_string(), "new".to_string());
        let encoded = encode_record(&rec);
        assert!(encoded.ends_with("\n\n"));
    }
}
