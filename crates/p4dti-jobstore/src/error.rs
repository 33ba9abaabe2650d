//! Job-side adapter error types.

use thiserror::Error;

/// Errors that can occur on the job-side adapter.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// The client binary could not be found or spawned.
    #[error("failed to execute job store client: {0}")]
    Spawn(#[from] std::io::Error),

    /// The client exited with a non-zero status.
    #[error("job store command failed (exit code {code:?}): {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    /// A command's output could not be parsed as the expected form.
    #[error("failed to parse job store response: {0}")]
    Parse(String),

    /// The requested job does not exist.
    #[error("job not found: {0}")]
    NotFound(String),

    /// `update_job` got a server acknowledgement that matched neither
    /// `saved` nor `not changed`.
    #[error("unexpected acknowledgement for job '{job}': {text:?}")]
    UnexpectedAck { job: String, text: String },

    /// The event log referenced a job named `new`, which is reserved for
    /// server-assigned name allocation and must never survive to the
    /// event log.
    #[error("event log referenced the reserved job name 'new'")]
    ReservedJobName,

    /// The jobspec does not (or cannot be made to) satisfy the required
    /// shape: wrong datatype, missing field, incompatible select values.
    #[error("jobspec validation failed for field '{field}': {reason}")]
    JobspecInvalid { field: String, reason: String },

    /// No field code is available in the reserved range to extend the
    /// jobspec with a new P4DTI-owned field.
    #[error("no free field code available for '{field}' in range {low}..={high}")]
    NoFreeFieldCode { field: String, low: i32, high: i32 },

    /// Both encoding-negotiation attempts failed.
    #[error("job store communication failed in both unicode and non-unicode mode: {0}")]
    EncodingNegotiationFailed(String),
}

pub type Result<T> = std::result::Result<T, JobStoreError>;

impl JobStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Transient process-level errors a caller may retry next poll.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::CommandFailed { .. })
    }

    /// Errors serious enough that the whole run should abort rather than
    /// skip the affected entity.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ReservedJobName | Self::EncodingNegotiationFailed(_)
        )
    }
}
