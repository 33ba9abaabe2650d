//! Errors raised while composing or delivering a notification.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("malformed message ({0})")]
    Message(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("SMTP delivery rejected: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
