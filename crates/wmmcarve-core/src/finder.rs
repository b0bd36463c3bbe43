//! Find mode: locating project files anywhere in a directory tree.
//!
//! Recovery tools such as PhotoRec hand back thousands of files with made-up
//! names and extensions. [`DirectoryScanner`] walks such a tree and flags
//! every file containing the UTF-16LE `<MovieMaker` marker, whatever it is
//! called. Each hit is appended to a [`FoundLog`] as soon as it is found.
//!
//! Symbolic links and junctions are never followed, so link cycles cannot
//! trap the walk. Unreadable directories and files are logged, recorded in
//! the [`FindReport`] and skipped; the rest of the tree is still searched.

use crate::error::{Error, Result};
use crate::scanner::signature::MSWMM_MARKER;
use crate::scanner::{ByteSignature, Lookback, ScannerConfig, SignatureScanner};
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Default name of the find-mode log
pub const DEFAULT_LOG_NAME: &str = "search.log";

/// Configuration for find mode
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Bytes per read
    pub chunk_size: usize,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2048,
            max_depth: None,
        }
    }
}

impl FinderConfig {
    /// Creates a new finder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Limits how deep the walk descends
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Append-only record of project files found
#[derive(Debug, Clone)]
pub struct FoundLog {
    path: PathBuf,
}

impl FoundLog {
    /// Uses `path` as the log file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the log left by a previous search
    pub fn reset(&self) -> Result<()> {
        if self.path.exists() {
            info!("Deleting existing log file {}", self.path.display());
            fs::remove_file(&self.path).map_err(|e| Error::file_write(&self.path, e))?;
        }
        Ok(())
    }

    /// Appends one found-record
    pub fn append(&self, dir: &Path, file_name: &OsStr) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::file_write(&self.path, e))?;
        file.write_all(record_line(dir, file_name).as_bytes())
            .map_err(|e| Error::file_write(&self.path, e))
    }
}

/// One log record, CRLF included
pub fn record_line(dir: &Path, file_name: &OsStr) -> String {
    format!(
        "{}\\{} - MSWMM XML header found!\r\n",
        dir.display(),
        file_name.to_string_lossy()
    )
}

/// A part of the tree that could not be searched
#[derive(Debug, Clone)]
pub struct TraversalFailure {
    /// Offending path, when known
    pub path: Option<PathBuf>,
    /// What went wrong
    pub message: String,
}

/// Outcome of a find run
#[derive(Debug, Clone, Default)]
pub struct FindReport {
    /// Files holding the marker, in walk order
    pub found: Vec<PathBuf>,
    /// Directories or files that could not be read
    pub failures: Vec<TraversalFailure>,
    /// Number of regular files examined
    pub files_scanned: usize,
}

impl FindReport {
    /// Returns true if no file held the marker
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

/// Recursive, link-safe search for project files
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    config: FinderConfig,
    signature: ByteSignature,
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryScanner {
    /// Creates a scanner looking for the MSWMM marker
    pub fn new() -> Self {
        Self::with_config(FinderConfig::default())
    }

    /// Creates a scanner with custom configuration
    pub fn with_config(config: FinderConfig) -> Self {
        Self {
            config,
            signature: MSWMM_MARKER,
        }
    }

    /// Looks for a different marker
    pub fn signature(mut self, signature: ByteSignature) -> Self {
        self.signature = signature;
        self
    }

    /// Offset of the first marker in `reader`, stopping as soon as it is seen
    pub fn find_marker<R: Read>(&self, reader: R) -> Result<Option<u64>> {
        let config = ScannerConfig::new()
            .chunk_size(self.config.chunk_size)
            .lookback(Lookback::Chunk);
        let mut scanner = SignatureScanner::new(reader, vec![self.signature.clone()], config)?;

        while let Some(step) = scanner.advance()? {
            if let Some(event) = step.matches.first() {
                return Ok(Some(event.offset));
            }
        }
        Ok(None)
    }

    /// [`find_marker`](Self::find_marker) over a file on disk
    pub fn scan_file(&self, path: &Path) -> Result<Option<u64>> {
        let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        self.find_marker(file).map_err(|e| match e {
            Error::Io(source) => Error::file_read(path, source),
            other => other,
        })
    }

    /// Walks `root` and records every project file in `log`
    pub fn run(&self, root: &Path, log: Option<&FoundLog>) -> Result<FindReport> {
        if !root.is_dir() {
            return Err(Error::path_not_found(root));
        }
        // Records name full folder paths, whatever form the root was given in
        let root: &Path = &std::path::absolute(root).map_err(|e| Error::file_read(root, e))?;
        info!("Search has been initiated in {}", root.display());

        let mut walker = WalkDir::new(root).follow_links(false).sort_by(dirs_first);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut report = FindReport::default();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf);
                    warn!(
                        "Unable to scan \"{}\" - {}",
                        path.as_deref().unwrap_or(root).display(),
                        err
                    );
                    report.failures.push(TraversalFailure {
                        path,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            if entry.path_is_symlink() {
                trace!("Skipping link {}", entry.path().display());
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            report.files_scanned += 1;
            let path = entry.path();

            match self.scan_file(path) {
                Ok(Some(offset)) => {
                    let dir = path.parent().unwrap_or(root);
                    info!(
                        "{}\\{} - MSWMM XML header found! (offset {})",
                        dir.display(),
                        entry.file_name().to_string_lossy(),
                        offset
                    );
                    if let Some(log) = log {
                        log.append(dir, entry.file_name())?;
                    }
                    report.found.push(path.to_path_buf());
                }
                Ok(None) => trace!("No marker in {}", path.display()),
                Err(err) => {
                    warn!("Unable to scan \"{}\" - {}", path.display(), err);
                    report.failures.push(TraversalFailure {
                        path: Some(path.to_path_buf()),
                        message: err.to_string(),
                    });
                }
            }
        }

        debug!(
            "Search complete: {} of {} files matched, {} failures",
            report.found.len(),
            report.files_scanned,
            report.failures.len()
        );
        Ok(report)
    }
}

/// Subdirectories before files, then by name
fn dirs_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    b_dir
        .cmp(&a_dir)
        .then_with(|| a.file_name().cmp(b.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn project_bytes(marker_at: usize) -> Vec<u8> {
        let mut data = vec![0x11u8; marker_at];
        data.extend_from_slice(MSWMM_MARKER.as_bytes());
        data.extend(vec![0x11u8; 100]);
        data
    }

    #[test]
    fn test_find_marker_across_chunk_boundary() {
        let scanner = DirectoryScanner::new();
        for at in [0, 1, 2030, 2040, 2047, 2048, 5000] {
            let found = scanner.find_marker(Cursor::new(project_bytes(at))).unwrap();
            assert_eq!(found, Some(at as u64));
        }
        assert_eq!(scanner.find_marker(Cursor::new(vec![0u8; 9000])).unwrap(), None);
        assert_eq!(scanner.find_marker(Cursor::new(Vec::new())).unwrap(), None);
    }

    #[test]
    fn test_record_line_format() {
        let line = record_line(Path::new("D:/recup_dir.1"), OsStr::new("f123.bin"));
        assert_eq!(line, "D:/recup_dir.1\\f123.bin - MSWMM XML header found!\r\n");
    }

    #[test]
    fn test_run_finds_nested_files_and_logs_them() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("recovered");
        fs::create_dir_all(root.join("recup_dir.1/deeper")).unwrap();
        fs::create_dir_all(root.join("recup_dir.2")).unwrap();

        fs::write(root.join("top.mswmm"), project_bytes(10)).unwrap();
        fs::write(root.join("notes.txt"), b"nothing here").unwrap();
        fs::write(root.join("recup_dir.1/f0001.jpg"), vec![0xFFu8; 4096]).unwrap();
        fs::write(root.join("recup_dir.1/deeper/f0002.doc"), project_bytes(2045)).unwrap();
        fs::write(root.join("recup_dir.2/empty"), b"").unwrap();

        let log = FoundLog::new(temp.path().join(DEFAULT_LOG_NAME));
        log.reset().unwrap();
        let report = DirectoryScanner::new().run(&root, Some(&log)).unwrap();

        assert_eq!(report.files_scanned, 5);
        assert!(report.failures.is_empty());
        assert_eq!(
            report.found,
            vec![
                root.join("recup_dir.1/deeper/f0002.doc"),
                root.join("top.mswmm"),
            ]
        );

        let contents = fs::read_to_string(log.path()).unwrap();
        let expected = format!(
            "{}{}",
            record_line(&root.join("recup_dir.1/deeper"), OsStr::new("f0002.doc")),
            record_line(&root, OsStr::new("top.mswmm"))
        );
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_records_use_absolute_folder() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("recovered");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.mswmm"), project_bytes(0)).unwrap();

        let log = FoundLog::new(temp.path().join(DEFAULT_LOG_NAME));
        let dotted = temp.path().join(".").join("recovered").join(".");
        let report = DirectoryScanner::new().run(&dotted, Some(&log)).unwrap();

        assert_eq!(report.found, vec![root.join("a.mswmm")]);
        assert!(report.found[0].is_absolute());
        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, record_line(&root, OsStr::new("a.mswmm")));
    }

    #[test]
    fn test_reset_clears_previous_log() {
        let temp = TempDir::new().unwrap();
        let log = FoundLog::new(temp.path().join("search.log"));
        fs::write(log.path(), b"old run\r\n").unwrap();
        log.reset().unwrap();
        assert!(!log.path().exists());
        log.reset().unwrap();
    }

    #[test]
    fn test_nothing_found() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.bin"), vec![0u8; 10]).unwrap();
        let report = DirectoryScanner::new().run(temp.path(), None).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.files_scanned, 1);
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = DirectoryScanner::new()
            .run(&temp.path().join("absent"), None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_max_depth() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/deep.mswmm"), project_bytes(0)).unwrap();
        fs::write(temp.path().join("shallow.mswmm"), project_bytes(0)).unwrap();

        let scanner = DirectoryScanner::with_config(FinderConfig::new().max_depth(1));
        let report = scanner.run(temp.path(), None).unwrap();
        assert_eq!(report.found, vec![temp.path().join("shallow.mswmm")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_not_followed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/project.mswmm"), project_bytes(4)).unwrap();
        std::os::unix::fs::symlink(&root, root.join("sub/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("sub/project.mswmm"), root.join("alias.mswmm"))
            .unwrap();

        let report = DirectoryScanner::new().run(&root, None).unwrap();
        assert_eq!(report.found, vec![root.join("sub/project.mswmm")]);
        assert_eq!(report.files_scanned, 1);
    }
}
