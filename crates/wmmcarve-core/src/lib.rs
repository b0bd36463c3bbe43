//! # wmmcarve-core
//!
//! A library for recovering data from damaged Windows Movie Maker (`.MSWMM`)
//! project files.
//!
//! Project files are compound containers whose internal offsets can't be
//! trusted once a file has been truncated or pieced back together by a
//! recovery tool. Everything here works by scanning the raw bytes for fixed
//! signatures instead:
//!
//! - Carving the cached JFIF thumbnails
//! - Extracting the UTF-16LE project XML and re-indenting it
//! - Finding project files in a directory tree, whatever their names
//!
//! ## Architecture
//!
//! - [`scanner`]: Streaming signature matching across read boundaries
//! - [`thumbnail`]: JFIF carving on top of the scanner
//! - [`xml`]: XML payload extraction and re-indentation
//! - [`finder`]: Recursive search for project files
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use wmmcarve_core::{reindent, XmlPayloadExtractor};
//!
//! let file = File::open("holiday.MSWMM")?;
//! let payload = XmlPayloadExtractor::new().extract(file)?;
//! println!("{}", reindent(&payload.text()));
//! # Ok::<(), wmmcarve_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`ArtifactSink`]: Send carved thumbnails somewhere other than a folder
//! - [`ByteSignature`]: Scan for patterns beyond the built-in table
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod finder;
pub mod scanner;
pub mod thumbnail;
pub mod xml;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use finder::{DirectoryScanner, FindReport, FinderConfig, FoundLog, TraversalFailure};
pub use scanner::{
    ByteSignature, Lookback, MatchEvent, ScanStep, ScannerConfig, SignatureScanner,
};
pub use thumbnail::{
    ArtifactSink, CarvedThumbnail, CarverConfig, DirectorySink, ThumbnailCarver, ThumbnailReport,
};
pub use xml::{
    reindent, ExtractorConfig, ReindentConfig, XmlPayload, XmlPayloadExtractor, XmlRecovery,
    XmlReindenter,
};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
