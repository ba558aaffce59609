use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Errors that can occur in the logging library
#[derive(ThisError, Debug)]
pub enum Error {
    /// I/O operation failed while setting up the log root.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Initialization failed.
    #[error("Initialization error: {0}")]
    Init(String),
    /// A directory entry does not follow the log filename grammar.
    #[error(transparent)]
    MalformedFilename(#[from] MalformedFilenameError),
    /// Appending a line to a log file failed.
    #[error("failed to write log file {}: {source}", path.display())]
    Write {
        /// File the line was destined for.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The write handle was already closed.
    #[error("write handle is closed")]
    HandleClosed,
}

/// A filename that cannot be decoded into a
/// [`FileIdentifier`](crate::filename::FileIdentifier).
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("malformed log filename {name:?}: {reason}")]
pub struct MalformedFilenameError {
    /// The rejected name.
    pub name: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl MalformedFilenameError {
    pub(crate) fn new(name: &str, reason: &'static str) -> Self {
        Self {
            name: name.to_string(),
            reason,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
