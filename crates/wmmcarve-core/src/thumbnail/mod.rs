//! JFIF thumbnail carving.
//!
//! Movie Maker caches a JFIF thumbnail for every clip inside the project
//! file. [`ThumbnailCarver`] recovers them by watching for the JFIF header
//! and footer signatures and copying the chunks in between to an
//! [`ArtifactSink`].
//!
//! Artifact boundaries are chunk-aligned: an artifact starts at the first
//! chunk holding any byte of the header and ends with the chunk holding the
//! footer's last byte. That always covers the real image; image viewers
//! ignore the slack on either side.
//!
//! ## State machine
//!
//! - `Idle` + header: open artifact `n`, write the look-back bytes if the
//!   header began there, then the current chunk
//! - `Writing` + footer: write the current chunk if needed, close, `n += 1`
//! - `Idle` + footer: corruption warning, carry on
//! - `Writing` + end of stream: close what we have

mod sink;

use crate::error::{Error, Result};
use crate::scanner::signature::{JFIF_FOOTER, JFIF_HEADER};
use crate::scanner::{Lookback, ScannerConfig, SignatureScanner};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

pub use sink::{ArtifactSink, DirectorySink};

const HEADER: usize = 0;
const FOOTER: usize = 1;

/// Configuration for the carver
#[derive(Debug, Clone)]
pub struct CarverConfig {
    /// Bytes per read; also the granularity of artifact boundaries
    pub chunk_size: usize,
    /// Stop after this many thumbnails (0 = unlimited)
    pub max_thumbnails: u32,
}

impl Default for CarverConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            max_thumbnails: 0,
        }
    }
}

impl CarverConfig {
    /// Creates a new carver config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the maximum number of thumbnails to carve
    pub fn max_thumbnails(mut self, max: u32) -> Self {
        self.max_thumbnails = max;
        self
    }
}

/// Location of one carved thumbnail in the source stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarvedThumbnail {
    /// 1-based artifact number
    pub number: u32,
    /// Absolute offset of the first byte written
    pub start: u64,
    /// Absolute offset one past the last byte written
    pub end: u64,
}

impl CarvedThumbnail {
    /// Number of bytes written
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true if nothing was written
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Outcome of a carving run
#[derive(Debug, Clone, Default)]
pub struct ThumbnailReport {
    /// Carved thumbnails in stream order
    pub thumbnails: Vec<CarvedThumbnail>,
    /// A footer showed up while no thumbnail was open
    pub footer_before_header: bool,
    /// Offsets of those stray footers
    pub stray_footers: Vec<u64>,
}

impl ThumbnailReport {
    /// Number of thumbnails written
    pub fn count(&self) -> usize {
        self.thumbnails.len()
    }

    /// Returns true if no thumbnail was found
    pub fn is_empty(&self) -> bool {
        self.thumbnails.is_empty()
    }
}

/// Splits a stream into numbered JFIF artifacts
#[derive(Debug, Clone, Default)]
pub struct ThumbnailCarver {
    config: CarverConfig,
}

impl ThumbnailCarver {
    /// Creates a carver with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a carver with custom configuration
    pub fn with_config(config: CarverConfig) -> Self {
        Self { config }
    }

    /// Carves every thumbnail in `reader` into `sink`
    pub fn carve<R: Read, S: ArtifactSink>(&self, reader: R, sink: &mut S) -> Result<ThumbnailReport> {
        let config = ScannerConfig::new()
            .chunk_size(self.config.chunk_size)
            .lookback(Lookback::Chunk);
        let mut scanner = SignatureScanner::new(reader, vec![JFIF_HEADER, JFIF_FOOTER], config)?;

        let mut report = ThumbnailReport::default();
        let mut open: Option<CarvedThumbnail> = None;
        let mut next_number = 1u32;

        'scan: while let Some(step) = scanner.advance()? {
            let mut chunk_written = false;

            for event in step.matches {
                match (event.signature, open.is_some()) {
                    (HEADER, false) => {
                        if self.config.max_thumbnails > 0 && next_number > self.config.max_thumbnails {
                            debug!("Reached limit of {} thumbnails", self.config.max_thumbnails);
                            break 'scan;
                        }

                        info!(
                            "Found header at {} - Filename: {}.JFIF",
                            event.offset, next_number
                        );
                        sink.begin(next_number)?;
                        let mut start = step.offset;
                        if event.offset < step.offset {
                            // Header straddles the read boundary
                            sink.write_chunk(step.lookback)?;
                            start = step.window_offset();
                        }
                        sink.write_chunk(step.chunk)?;
                        chunk_written = true;
                        open = Some(CarvedThumbnail {
                            number: next_number,
                            start,
                            end: step.end(),
                        });
                    }
                    (HEADER, true) => {
                        trace!("Header at {} inside an open thumbnail", event.offset);
                    }
                    (FOOTER, true) => {
                        if !chunk_written {
                            sink.write_chunk(step.chunk)?;
                            chunk_written = true;
                        }
                        sink.finish()?;
                        if let Some(mut done) = open.take() {
                            done.end = step.end();
                            debug!(
                                "Closed {}.JFIF at footer {} ({} bytes)",
                                done.number,
                                event.offset,
                                done.len()
                            );
                            report.thumbnails.push(done);
                        }
                        next_number += 1;
                    }
                    (FOOTER, false) => {
                        warn!(
                            "JFIF footer at {} found before header - file may be severely corrupted",
                            event.offset
                        );
                        report.footer_before_header = true;
                        report.stray_footers.push(event.offset);
                    }
                    _ => {}
                }
            }

            if let Some(current) = open.as_mut() {
                if !chunk_written {
                    sink.write_chunk(step.chunk)?;
                }
                current.end = step.end();
            }
        }

        if let Some(done) = open.take() {
            debug!(
                "Stream ended inside {}.JFIF, keeping {} bytes",
                done.number,
                done.len()
            );
            sink.finish()?;
            report.thumbnails.push(done);
        }

        debug!(
            "Carving complete: {} thumbnails, footer-before-header: {}",
            report.count(),
            report.footer_before_header
        );
        Ok(report)
    }
}

/// Default thumbnail folder for a project: `{sourceDir}/{baseName}`
pub fn default_output_dir(source: &Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default();
    match source.parent() {
        Some(parent) => parent.join(stem),
        None => PathBuf::from(stem),
    }
}

/// Carves the thumbnails of a project file into `output_dir/{n}.JFIF`
pub fn carve_file(
    path: impl AsRef<Path>,
    output_dir: impl Into<PathBuf>,
    config: CarverConfig,
) -> Result<ThumbnailReport> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::path_not_found(path));
    }
    let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
    let mut sink = DirectorySink::create(output_dir)?;
    info!(
        "Extracted files will be saved as {}",
        sink.artifact_path(0).with_file_name("[X].JFIF").display()
    );
    ThumbnailCarver::with_config(config).carve(file, &mut sink)
}
