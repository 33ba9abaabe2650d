//! The replicator core's error type: unifies every adapter's error
//! along the taxonomy the poll loop dispatches on (retryable, fatal, or
//! scoped to one pair).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] p4dti_issuestore::StorageError),

    #[error(transparent)]
    JobStore(#[from] p4dti_jobstore::JobStoreError),

    #[error(transparent)]
    Translate(#[from] p4dti_translate::TranslateError),

    #[error(transparent)]
    Notify(#[from] p4dti_notify::NotifyError),

    #[error(transparent)]
    Config(#[from] p4dti_config::ConfigError),

    /// The link fields are absent from the installed jobspec and at
    /// least one job already exists; the administrator must delete jobs
    /// first (documented first-time procedure).
    #[error(
        "jobspec has no P4DTI link fields and pre-existing jobs were found; \
         delete all jobs before first-time startup, or install the link \
         fields manually"
    )]
    PreExistingJobsWithoutLinkFields,

    /// Both the forward write and the subsequent revert failed; the
    /// pair is abandoned for this cycle.
    #[error("replication of {pair} failed and could not be reverted: write error: {write_error}; revert error: {revert_error}")]
    RevertFailed { pair: String, write_error: String, revert_error: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Transient errors a caller may retry next poll rather than
    /// abandoning the whole run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(e) => e.is_retryable(),
            Error::JobStore(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Errors serious enough that the whole run should abort.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Storage(e) => e.is_fatal(),
            Error::JobStore(e) => e.is_fatal(),
            Error::PreExistingJobsWithoutLinkFields => true,
            _ => false,
        }
    }
}
