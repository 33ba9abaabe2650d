//! Errors raised by the field translators.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("'{value}' is not a valid {kind} value")]
    Malformed { kind: String, value: String },

    #[error("status '{status}' has no mapping in the configured status table")]
    StatusNotMapped { status: String },

    #[error("unknown user '{user}' on side {side} (strict mode)")]
    UnknownUser { user: String, side: u8 },

    #[error("the bookkeeping user '{user}' does not exist or is not unique on side {side}")]
    BookkeepingUserInvalid { user: String, side: u8 },
}

pub type Result<T> = std::result::Result<T, TranslateError>;
