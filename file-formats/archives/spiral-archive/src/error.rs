//! Error types for the Spiral archive library

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Container or resource header unrecognized, or its tables are corrupted
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Named entry absent from the container
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Two entries with the same name inside one container
    #[error("Duplicate entry in container: {0}")]
    DuplicateEntry(String),

    /// The patch request cannot be honoured as given
    #[error("Invalid patch request: {0}")]
    InvalidRequest(String),

    /// The container holds no resource of the required kind
    #[error("No {kind} resource found in container")]
    NoCandidateResource {
        /// Extension of the missing resource kind
        kind: &'static str,
    },

    /// The named resource is absent from the structural resource table
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The caller declined to choose between ambiguous candidates
    #[error("Selection cancelled")]
    SelectionCancelled,

    /// The caller chose a name that was not one of the candidates
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Writing during an in-place patch failed; the target may be inconsistent
    #[error("In-place write to {path} failed, file may be inconsistent: {source}")]
    InPlaceWrite {
        /// The container being patched
        path: PathBuf,
        /// The underlying I/O failure
        source: io::Error,
    },

    /// Staging or committing a transaction failed; the target is untouched
    #[error("Transaction failure for {path}: {reason}")]
    TransactionFailure {
        /// The transaction target
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Two jobs in one batch target the same file
    #[error("Concurrent patch operations on the same target: {0}")]
    ConcurrentTarget(PathBuf),

    /// Resource conversion collaborator failed
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A size or offset exceeds what the format can express
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// ZIP layer error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Create a new InvalidFormat error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Create a new InvalidRequest error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRequest(msg.into())
    }

    /// Create a new TransactionFailure error
    pub fn transaction<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Error::TransactionFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error indicates the container is corrupted
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_) | Error::DuplicateEntry(_) | Error::Zip(_)
        )
    }

    /// Check if this error is recoverable by the caller without side effects
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EntryNotFound(_)
                | Error::NoCandidateResource { .. }
                | Error::ResourceNotFound(_)
                | Error::SelectionCancelled
                | Error::InvalidSelection(_)
                | Error::InvalidRequest(_)
        )
    }

    /// Check whether the target file is guaranteed byte-for-byte unchanged
    ///
    /// Only a failed in-place write can leave the target partially modified.
    pub fn target_untouched(&self) -> bool {
        !matches!(self, Error::InPlaceWrite { .. })
    }
}
