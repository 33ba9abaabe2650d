//! Issue-side adapter error types.

use p4dti_core::validation::UpdateError;

/// Errors that can occur on the issue-side adapter.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g., "issue", "link").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The database has not been initialized.
    #[error("database not initialized: {reason}")]
    NotInitialized {
        /// Why the database is considered uninitialized.
        reason: String,
    },

    /// The database is locked by another process or another in-flight
    /// poll cycle.
    #[error("database locked: {0}")]
    DatabaseLocked(String),

    /// Failed to establish or maintain a database connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A transaction operation failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// The stored schema-extension version is unknown or newer than this
    /// build supports.
    #[error("unsupported schema-extension version {version} (known range {min}..={max})")]
    UnsupportedSchemaVersion { version: i32, min: i32, max: i32 },

    /// A schema-extension upgrade step failed.
    #[error("schema upgrade {from} -> {to} failed: {reason}")]
    SchemaUpgrade { from: i32, to: i32, reason: String },

    /// An issue update violated an invariant (read-only/append-only
    /// field, disallowed transition, resolution reconciliation, or
    /// permission).
    #[error(transparent)]
    Update(#[from] UpdateError),

    /// A raw SQLite query error.
    #[error("query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Creates a [`StorageError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns `true` if this is a [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the error is transient and the calling poll
    /// cycle may retry (database locked, connection errors). Schema and
    /// update-invariant errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseLocked(_) | Self::Connection(_) | Self::Transaction(_)
        )
    }

    /// Returns `true` if this error is fatal to the whole run rather
    /// than scoped to one entity (schema/version errors).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSchemaVersion { .. } | Self::SchemaUpgrade { .. }
        )
    }
}
