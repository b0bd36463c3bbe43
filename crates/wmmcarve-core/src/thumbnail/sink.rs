//! Destinations for carved artifacts.
//!
//! The carver never touches the filesystem itself: it drives an
//! [`ArtifactSink`], one artifact at a time.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Receives carved artifacts, one at a time.
///
/// `begin` is always followed by zero or more `write_chunk` calls and then
/// `finish` before the next `begin`.
pub trait ArtifactSink {
    /// Start artifact number `number` (1-based)
    fn begin(&mut self, number: u32) -> Result<()>;

    /// Append bytes to the artifact currently open
    fn write_chunk(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the artifact currently open
    fn finish(&mut self) -> Result<()>;
}

/// Collects every artifact in memory, mostly useful for tests and previews
impl ArtifactSink for Vec<Vec<u8>> {
    fn begin(&mut self, _number: u32) -> Result<()> {
        self.push(Vec::new());
        Ok(())
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(current) = self.last_mut() {
            current.extend_from_slice(bytes);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes artifacts as `{dir}/{n}.JFIF`
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    extension: String,
    current: Option<(PathBuf, BufWriter<File>)>,
}

impl DirectorySink {
    /// Creates the output directory if needed
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::directory_create(&dir, e))?;
        Ok(Self {
            dir,
            extension: "JFIF".to_string(),
            current: None,
        })
    }

    /// Overrides the file extension (default `JFIF`)
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path that artifact `number` is written to
    pub fn artifact_path(&self, number: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", number, self.extension))
    }
}

impl ArtifactSink for DirectorySink {
    fn begin(&mut self, number: u32) -> Result<()> {
        // A previous artifact left open is closed first
        self.finish()?;

        let path = self.artifact_path(number);
        debug!("Writing {}", path.display());
        let file = File::create(&path).map_err(|e| Error::file_write(&path, e))?;
        self.current = Some((path, BufWriter::new(file)));
        Ok(())
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        match self.current.as_mut() {
            Some((path, writer)) => writer
                .write_all(bytes)
                .map_err(|e| Error::file_write(path.as_path(), e)),
            None => Err(Error::invalid_config("write_chunk called with no open artifact")),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some((path, mut writer)) = self.current.take() {
            writer.flush().map_err(|e| Error::file_write(&path, e))?;
        }
        Ok(())
    }
}

impl Drop for DirectorySink {
    fn drop(&mut self) {
        // Error paths skip `finish`; don't lose buffered bytes
        let _ = self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_sink() {
        let mut sink: Vec<Vec<u8>> = Vec::new();
        sink.begin(1).unwrap();
        sink.write_chunk(b"ab").unwrap();
        sink.write_chunk(b"cd").unwrap();
        sink.finish().unwrap();
        sink.begin(2).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink, vec![b"abcd".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_directory_sink_writes_numbered_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("project");
        let mut sink = DirectorySink::create(&dir).unwrap();

        sink.begin(1).unwrap();
        sink.write_chunk(&[1, 2, 3]).unwrap();
        sink.finish().unwrap();
        sink.begin(2).unwrap();
        sink.write_chunk(&[4]).unwrap();
        sink.finish().unwrap();

        assert_eq!(fs::read(dir.join("1.JFIF")).unwrap(), vec![1, 2, 3]);
        assert_eq!(fs::read(dir.join("2.JFIF")).unwrap(), vec![4]);
    }

    #[test]
    fn test_directory_sink_flushes_on_drop() {
        let temp = TempDir::new().unwrap();
        {
            let mut sink = DirectorySink::create(temp.path()).unwrap();
            sink.begin(7).unwrap();
            sink.write_chunk(b"partial").unwrap();
        }
        assert_eq!(fs::read(temp.path().join("7.JFIF")).unwrap(), b"partial");
    }

    #[test]
    fn test_write_without_begin_fails() {
        let temp = TempDir::new().unwrap();
        let mut sink = DirectorySink::create(temp.path()).unwrap();
        assert!(sink.write_chunk(b"x").is_err());
    }

    #[test]
    fn test_artifact_path() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::create(temp.path().join("out"))
            .unwrap()
            .extension("jpg");
        assert!(sink.artifact_path(12).ends_with("12.jpg"));
    }
}
