//! Error types for the wmmcarve-core library.
//!
//! Everything that can abort an operation is an [`Error`]. Conditions that
//! only degrade a result (a footer seen before any header, an unreadable
//! subdirectory during a tree walk) are carried in the operation's report
//! instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wmmcarve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all wmmcarve operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The requested input file or folder does not exist
    #[error("path not found: '{path}'")]
    PathNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Read or write failure on a stream that has no path attached
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A signature cannot be detected reliably with the configured look-back
    #[error(
        "signature '{name}' is {length} bytes long but the look-back window only covers {max} bytes"
    )]
    SignatureTooLong {
        /// Name of the offending signature
        name: String,
        /// Length of the signature
        length: usize,
        /// Longest signature the window can detect
        max: usize,
    },

    /// Invalid scanner or component configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The XML open marker never appeared in the stream
    #[error("no MovieMaker XML data found in input")]
    NoXmlPayload,
}

impl Error {
    /// Creates a new path-not-found error
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true if the scan completed but located nothing
    pub fn is_data_not_found(&self) -> bool {
        matches!(self, Self::NoXmlPayload)
    }

    /// Returns true if this error reports a missing input path
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }
}
