use thiserror::Error;

use crate::keyed::Kind;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested record does not exist. Callers that treat absence as
    /// "does not exist yet" match on this directly.
    #[error("record not found")]
    NotFound,

    /// A put-if-absent found the key already taken.
    #[error("record already exists")]
    AlreadyExists,

    /// A conditional write lost a race with a concurrent writer. Drives a
    /// retry inside the update loop; never escapes [`crate::Database`].
    #[error("concurrent modification")]
    VersionConflict,

    /// The update retry budget was exhausted under contention. Transient;
    /// the caller may resubmit.
    #[error("update retry budget exhausted")]
    TooManyRetries,

    /// The caller-supplied transform refused to apply. Nothing was
    /// written.
    #[error("update rejected: {0}")]
    Rejected(String),

    /// The operation is not defined for this record kind.
    #[error("operation not supported for {0:?}")]
    Unsupported(Kind),

    /// A stored value failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
