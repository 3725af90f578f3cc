//! Error kinds surfaced by the core, per the error handling design.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the core. AttributeCache never surfaces these
/// directly: a failed update returns the slot to `Invalid` and the error is
/// handed to the subscriber's continuation by the underlying [`crate::task::Task`].
///
/// Variants carry `String` detail rather than the originating error type
/// (e.g. `std::io::Error`) so that a single result can be cloned out to
/// every waiter on a cache slot that awaits one outstanding task (§9, the
/// "await the outstanding task" resolution of the stale-while-pending
/// question).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("already exists: {0}")]
    Exists(PathBuf),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(String),

    #[error("search backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("operation timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(PathBuf::new()),
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(PathBuf::new()),
            std::io::ErrorKind::AlreadyExists => Error::Exists(PathBuf::new()),
            _ => Error::Io(e.to_string()),
        }
    }
}

impl Error {
    /// `Cancelled` propagates silently; everything else is worth a log line.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
