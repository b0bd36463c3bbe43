//! Streaming byte-signature scanner.
//!
//! [`SignatureScanner`] reads its source in fixed-size chunks and looks for a
//! set of [`ByteSignature`]s in each chunk. Container offsets inside damaged
//! project files cannot be trusted, so nothing here parses structure: the
//! scanner only reports where each signature starts.
//!
//! ## Algorithm Overview
//!
//! 1. Read up to `chunk_size` bytes from the source
//! 2. Prepend the look-back bytes kept from the previous search window
//! 3. Search the combined window for every configured signature
//! 4. Report an occurrence only if its last byte lies in the new chunk
//! 5. Keep the tail of the window as the next look-back
//!
//! Step 4 means an occurrence is reported by exactly one read: the one that
//! delivered its final byte. As long as the look-back holds at least
//! `len - 1` bytes, the start of that occurrence is still in the window, so
//! nothing is missed either.
//!
//! Offsets never decrease across a scan. When the window ends in a partial
//! occurrence of one signature, completed occurrences of others starting at
//! or after it are held back until that prefix is settled, or the stream
//! ends. The built-in signature pairs never overlap this way.
//!
//! ```no_run
//! use std::fs::File;
//! use wmmcarve_core::scanner::{signature, ScannerConfig, SignatureScanner};
//!
//! let file = File::open("project.MSWMM")?;
//! let config = ScannerConfig::new().chunk_size(4096);
//! let mut scanner = SignatureScanner::new(file, vec![signature::JFIF_HEADER], config)?;
//!
//! while let Some(step) = scanner.advance()? {
//!     for event in step.matches {
//!         println!("header at {}", event.offset);
//!     }
//! }
//! # Ok::<(), wmmcarve_core::Error>(())
//! ```

pub mod signature;

use crate::error::{Error, Result};
use bytes::{Buf, BytesMut};
use memchr::memmem::Finder;
use std::io::{ErrorKind, Read};
use tracing::trace;

pub use signature::ByteSignature;

/// How many bytes of the previous window are carried into the next search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookback {
    /// `longest signature - 1` bytes, the least that still catches every split
    #[default]
    Minimal,
    /// One whole previous chunk, widened to [`Lookback::Minimal`] if smaller
    Chunk,
    /// Exactly this many bytes; longer signatures are a configuration error
    Bytes(usize),
}

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Number of bytes requested from the source per read
    pub chunk_size: usize,
    /// Look-back policy
    pub lookback: Lookback,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            lookback: Lookback::Minimal,
        }
    }
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the look-back policy
    pub fn lookback(mut self, lookback: Lookback) -> Self {
        self.lookback = lookback;
        self
    }
}

/// One signature occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEvent {
    /// Index of the signature in the scanner's signature list
    pub signature: usize,
    /// Absolute stream offset of the signature's first byte
    pub offset: u64,
}

/// Everything learned from a single read
#[derive(Debug)]
pub struct ScanStep<'a> {
    /// Absolute offset of the first byte of `chunk`
    pub offset: u64,
    /// Bytes delivered by this read
    pub chunk: &'a [u8],
    /// Retained bytes that immediately precede `chunk` in the stream
    pub lookback: &'a [u8],
    /// Occurrences released by this read, in ascending offset order
    pub matches: &'a [MatchEvent],
}

impl ScanStep<'_> {
    /// Absolute offset of the first look-back byte
    pub fn window_offset(&self) -> u64 {
        self.offset - self.lookback.len() as u64
    }

    /// Absolute offset one past the last byte of `chunk`
    pub fn end(&self) -> u64 {
        self.offset + self.chunk.len() as u64
    }
}

/// Incremental matcher over a byte stream
#[derive(Debug)]
pub struct SignatureScanner<R> {
    reader: R,
    signatures: Vec<ByteSignature>,
    /// One substring finder per signature, same order
    finders: Vec<Finder<'static>>,
    chunk_size: usize,
    lookback: usize,
    /// Look-back bytes followed by the most recent chunk
    window: BytesMut,
    /// Absolute offset of the next unread byte
    position: u64,
    events: Vec<MatchEvent>,
    /// Completed occurrences waiting on an earlier, still partial one
    held: Vec<MatchEvent>,
    exhausted: bool,
}

impl<R: Read> SignatureScanner<R> {
    /// Creates a scanner over `reader` looking for `signatures`
    pub fn new(reader: R, signatures: Vec<ByteSignature>, config: ScannerConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must be greater than zero"));
        }
        if signatures.is_empty() {
            return Err(Error::invalid_config("at least one signature is required"));
        }
        if let Some(empty) = signatures.iter().find(|s| s.is_empty()) {
            return Err(Error::invalid_config(format!(
                "signature '{}' is empty",
                empty.name()
            )));
        }

        let longest = signatures.iter().map(ByteSignature::len).max().unwrap_or(1);
        let lookback = match config.lookback {
            Lookback::Minimal => longest - 1,
            Lookback::Chunk => config.chunk_size.max(longest - 1),
            Lookback::Bytes(n) => {
                if let Some(sig) = signatures.iter().find(|s| s.len() > n + 1) {
                    return Err(Error::SignatureTooLong {
                        name: sig.name().to_string(),
                        length: sig.len(),
                        max: n + 1,
                    });
                }
                n
            }
        };

        trace!(
            "Scanner ready: {} signatures, chunk {} bytes, look-back {} bytes",
            signatures.len(),
            config.chunk_size,
            lookback
        );

        let finders = signatures
            .iter()
            .map(|sig| Finder::new(sig.as_bytes()).into_owned())
            .collect();

        Ok(Self {
            reader,
            signatures,
            finders,
            chunk_size: config.chunk_size,
            lookback,
            window: BytesMut::with_capacity(lookback + config.chunk_size),
            position: 0,
            events: Vec::new(),
            held: Vec::new(),
            exhausted: false,
        })
    }

    /// Performs one read and reports the signatures it completed.
    ///
    /// Returns `Ok(None)` once the source is exhausted. A read error leaves
    /// the scanner where it was; steps returned earlier stay valid.
    pub fn advance(&mut self) -> Result<Option<ScanStep<'_>>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.window.len() > self.lookback {
            let excess = self.window.len() - self.lookback;
            self.window.advance(excess);
        }
        let retained = self.window.len();
        self.window.resize(retained + self.chunk_size, 0);

        let read = loop {
            match self.reader.read(&mut self.window[retained..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.window.truncate(retained);
                    return Err(Error::Io(e));
                }
            }
        };
        self.window.truncate(retained + read);

        if read == 0 {
            trace!("End of stream at offset {}", self.position);
            self.exhausted = true;
            if self.held.is_empty() {
                return Ok(None);
            }
            self.events.clear();
            self.events.append(&mut self.held);
            return Ok(Some(ScanStep {
                offset: self.position,
                chunk: &self.window[retained..],
                lookback: &self.window[..retained],
                matches: &self.events,
            }));
        }

        let chunk_offset = self.position;
        let window_offset = chunk_offset - retained as u64;
        self.position += read as u64;

        let hold_from = self
            .partial_start()
            .map(|start| window_offset + start as u64);

        self.events.clear();
        self.events.append(&mut self.held);
        for (index, (signature, finder)) in self.signatures.iter().zip(&self.finders).enumerate() {
            for start in signature::find_all(&self.window, finder) {
                // Occurrences ending inside the look-back belong to an earlier read
                if start + signature.len() > retained {
                    let offset = window_offset + start as u64;
                    trace!("Found {} at offset {}", signature.name(), offset);
                    self.events.push(MatchEvent {
                        signature: index,
                        offset,
                    });
                }
            }
        }
        self.events.sort_by_key(|event| (event.offset, event.signature));

        if let Some(limit) = hold_from {
            let split = self.events.partition_point(|event| event.offset < limit);
            self.held = self.events.split_off(split);
        }

        Ok(Some(ScanStep {
            offset: chunk_offset,
            chunk: &self.window[retained..],
            lookback: &self.window[..retained],
            matches: &self.events,
        }))
    }

    /// Earliest window position where the remaining bytes are a proper
    /// prefix of some signature
    fn partial_start(&self) -> Option<usize> {
        let end = self.window.len();
        self.signatures
            .iter()
            .filter_map(|sig| {
                let from = end.saturating_sub(sig.len() - 1);
                (from..end).find(|&start| sig.as_bytes().starts_with(&self.window[start..]))
            })
            .min()
    }

    /// Drains the stream and returns every occurrence in order
    pub fn collect_matches(mut self) -> Result<Vec<MatchEvent>> {
        let mut all = Vec::new();
        while let Some(step) = self.advance()? {
            all.extend_from_slice(step.matches);
        }
        Ok(all)
    }
}

impl<R> SignatureScanner<R> {
    /// Returns the signature behind [`MatchEvent::signature`]
    pub fn signature(&self, index: usize) -> Option<&ByteSignature> {
        self.signatures.get(index)
    }

    /// Returns all configured signatures
    pub fn signatures(&self) -> &[ByteSignature] {
        &self.signatures
    }

    /// Number of bytes consumed from the source so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Effective look-back size in bytes
    pub fn lookback_len(&self) -> usize {
        self.lookback
    }

    /// Read size in bytes
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Gives back the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}
