//! Extraction of the project XML.
//!
//! A Movie Maker project keeps its storyboard and timeline as one UTF-16LE
//! XML document rooted at `<MovieMaker`. [`XmlPayloadExtractor`] finds it by
//! signature, copies whole chunks from the one holding the opening marker
//! through the one holding `ieMaker>`, and [`XmlPayload::text`] decodes the
//! result. [`reindent`] makes it readable.

pub mod reindent;

use crate::error::{Error, Result};
use crate::scanner::signature::{XML_CLOSE, XML_OPEN};
use crate::scanner::{Lookback, ScannerConfig, SignatureScanner};
use encoding_rs::UTF_16LE;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use reindent::{reindent, ReindentConfig, TagKind, XmlReindenter};

const OPEN: usize = 0;
const CLOSE: usize = 1;

/// UTF-16LE byte-order mark written ahead of the rendition
const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];

/// Configuration for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Bytes per read
    pub chunk_size: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self { chunk_size: 32 }
    }
}

impl ExtractorConfig {
    /// Creates a new extractor config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }
}

/// Raw XML bytes lifted out of a project file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlPayload {
    /// Chunk-aligned bytes covering the document
    pub bytes: Vec<u8>,
    /// Absolute offset of `bytes[0]`
    pub start: u64,
    /// Absolute offset of the opening marker
    pub open_offset: u64,
    /// The closing marker was never seen
    pub truncated: bool,
}

impl XmlPayload {
    /// Decodes the payload as UTF-16LE.
    ///
    /// Decoding starts on the opening marker's byte parity. Ill-formed
    /// sequences become U+FFFD rather than failing.
    pub fn text(&self) -> String {
        let skew = ((self.open_offset - self.start) % 2) as usize;
        let bytes = self.bytes.get(skew..).unwrap_or_default();
        let (text, had_errors) = UTF_16LE.decode_without_bom_handling(bytes);
        if had_errors {
            debug!("Payload contained ill-formed UTF-16, replaced with U+FFFD");
        }
        text.into_owned()
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for an empty payload
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Pulls the `<MovieMaker` document out of a byte stream
#[derive(Debug, Clone, Default)]
pub struct XmlPayloadExtractor {
    config: ExtractorConfig,
}

impl XmlPayloadExtractor {
    /// Creates an extractor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extracts the first XML document found in `reader`.
    ///
    /// Returns [`Error::NoXmlPayload`] if the opening marker never appears.
    /// A document without a closing marker is returned with `truncated` set.
    pub fn extract<R: Read>(&self, reader: R) -> Result<XmlPayload> {
        let config = ScannerConfig::new()
            .chunk_size(self.config.chunk_size)
            .lookback(Lookback::Chunk);
        let mut scanner = SignatureScanner::new(reader, vec![XML_OPEN, XML_CLOSE], config)?;
        let mut payload: Option<XmlPayload> = None;

        while let Some(step) = scanner.advance()? {
            if payload.is_none() {
                let Some(open) = step.matches.iter().find(|e| e.signature == OPEN) else {
                    continue;
                };
                info!("XML data found at offset {}", open.offset);

                let mut found = XmlPayload {
                    bytes: Vec::new(),
                    start: step.offset,
                    open_offset: open.offset,
                    truncated: true,
                };
                if open.offset < step.offset {
                    // Marker straddles the read boundary
                    found.bytes.extend_from_slice(step.lookback);
                    found.start = step.window_offset();
                }
                payload = Some(found);
            }

            let Some(current) = payload.as_mut() else {
                continue;
            };
            current.bytes.extend_from_slice(step.chunk);

            // `ieMaker>` inside the opening tag itself (`<MovieMaker>`) is not the end
            let earliest_close = current.open_offset + XML_OPEN.len() as u64;
            if step
                .matches
                .iter()
                .any(|e| e.signature == CLOSE && e.offset >= earliest_close)
            {
                current.truncated = false;
                debug!("Finished processing XML data at offset {}", step.end());
                break;
            }
        }

        let payload = payload.ok_or(Error::NoXmlPayload)?;
        if payload.truncated {
            warn!(
                "XML closing marker not found, keeping {} bytes of truncated data",
                payload.len()
            );
        }
        Ok(payload)
    }
}

/// Default rendition path for a project: `{sourceDir}/{baseName}.XML`
pub fn default_output_path(source: &Path) -> PathBuf {
    let mut name = source.file_stem().unwrap_or_default().to_os_string();
    name.push(".XML");
    source.with_file_name(name)
}

/// Writes `text` as UTF-16LE with a byte-order mark, replacing `path`
pub fn write_utf16le(path: &Path, text: &str) -> Result<()> {
    if path.exists() {
        debug!("Deleting existing file {}", path.display());
        fs::remove_file(path).map_err(|e| Error::file_write(path, e))?;
    }

    let file = File::create(path).map_err(|e| Error::file_write(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut encoded = Vec::with_capacity(UTF16LE_BOM.len() + text.len() * 2);
    encoded.extend_from_slice(&UTF16LE_BOM);
    encoded.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
    writer
        .write_all(&encoded)
        .map_err(|e| Error::file_write(path, e))?;
    writer.flush().map_err(|e| Error::file_write(path, e))
}

/// Summary of a full XML recovery
#[derive(Debug, Clone)]
pub struct XmlRecovery {
    /// Where the rendition was written
    pub output: PathBuf,
    /// Size of the raw payload in bytes
    pub payload_len: usize,
    /// Number of lines in the rendition
    pub lines: usize,
    /// The closing marker was never seen
    pub truncated: bool,
}

/// Extracts, re-indents and writes the XML of a project file.
///
/// Without a reindenter the decoded payload is written as found.
pub fn recover_file(
    source: impl AsRef<Path>,
    output: impl Into<PathBuf>,
    extractor: &XmlPayloadExtractor,
    reindenter: Option<&XmlReindenter>,
) -> Result<XmlRecovery> {
    let source = source.as_ref();
    if !source.is_file() {
        return Err(Error::path_not_found(source));
    }
    let output = output.into();

    info!("Searching for XML data in {}", source.display());
    let file = File::open(source).map_err(|e| Error::file_read(source, e))?;
    let payload = extractor.extract(file)?;

    debug!("Converting {} bytes from UTF-16LE", payload.len());
    let text = payload.text();
    let rendition = match reindenter {
        Some(reindenter) => reindenter.reindent(&text),
        None => text,
    };
    write_utf16le(&output, &rendition)?;

    Ok(XmlRecovery {
        output,
        payload_len: payload.len(),
        lines: if rendition.is_empty() {
            0
        } else {
            rendition.matches('\n').count() + 1
        },
        truncated: payload.truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::TempDir;

    const DOCUMENT: &str = concat!(
        "<MovieMaker Version=\"2.1\"><Project><Name>Summer</Name>",
        "<Clip Id=\"1\" Src=\"C:/video/beach.avi\"/><Clip Id=\"2\"/></Project></MovieMaker>"
    );

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn extract(data: Vec<u8>, chunk_size: usize) -> Result<XmlPayload> {
        XmlPayloadExtractor::with_config(ExtractorConfig::new().chunk_size(chunk_size))
            .extract(Cursor::new(data))
    }

    #[test]
    fn test_chunk_size_independence() {
        let data = utf16le(DOCUMENT);
        let payloads: Vec<XmlPayload> = [4, 16, 64, 4096]
            .into_iter()
            .map(|size| extract(data.clone(), size).unwrap())
            .collect();

        for payload in &payloads {
            assert!(!payload.truncated);
            assert_eq!(payload.bytes, data);
            assert_eq!(payload.text(), DOCUMENT);
        }
    }

    #[test]
    fn test_embedded_document_recovers_same_text() {
        let mut data = vec![0x20u8; 1000];
        data.extend(utf16le(DOCUMENT));
        data.extend(vec![0x20u8; 777]);

        let expected = reindent(DOCUMENT);
        for size in [4, 16, 32, 64, 4096] {
            let payload = extract(data.clone(), size).unwrap();
            assert!(!payload.truncated);
            assert!(payload.start <= 1000);
            assert!(payload.start + payload.len() as u64 >= (1000 + DOCUMENT.len() * 2) as u64);
            assert_eq!(reindent(&payload.text()), expected, "chunk {}", size);
        }
    }

    #[test]
    fn test_marker_straddling_reads_includes_lookback() {
        let mut data = vec![0x20u8; 26];
        data.extend(utf16le(DOCUMENT));

        let payload = extract(data, 32).unwrap();
        assert_eq!(payload.open_offset, 26);
        assert_eq!(payload.start, 0);
        assert!(payload.text().ends_with("</MovieMaker>"));
    }

    #[test]
    fn test_odd_offset_is_decoded_on_marker_parity() {
        let mut data = vec![0x20u8; 3];
        data.extend(utf16le(DOCUMENT));

        let payload = extract(data, 16).unwrap();
        assert_eq!(payload.open_offset, 3);
        assert!(payload.text().ends_with(DOCUMENT));
    }

    #[test]
    fn test_missing_open_marker() {
        let err = extract(utf16le("<Project></Project>"), 32).unwrap_err();
        assert!(matches!(err, Error::NoXmlPayload));
        assert!(err.is_data_not_found());
    }

    #[test]
    fn test_missing_close_marker_is_truncated() {
        let document = &DOCUMENT[..60];
        let payload = extract(utf16le(document), 32).unwrap();
        assert!(payload.truncated);
        assert_eq!(payload.text(), document);
    }

    #[test]
    fn test_bare_root_tag_does_not_close() {
        let document = "<MovieMaker><Clip/></MovieMaker>";
        let payload = extract(utf16le(document), 8).unwrap();
        assert!(!payload.truncated);
        assert_eq!(payload.text(), document);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/cases/wedding.final.MSWMM")),
            PathBuf::from("/cases/wedding.final.XML")
        );
    }

    #[test]
    fn test_write_utf16le_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.XML");
        fs::write(&path, b"stale content that is longer than the new one").unwrap();

        write_utf16le(&path, "<A>\r\n</A>").unwrap();
        let written = fs::read(&path).unwrap();
        assert_eq!(&written[..2], &UTF16LE_BOM);
        assert_eq!(&written[2..], utf16le("<A>\r\n</A>").as_slice());
    }

    #[test]
    fn test_recover_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("summer.MSWMM");
        let mut data = vec![0u8; 512];
        data.extend(utf16le(DOCUMENT));
        data.extend(vec![0u8; 512]);
        fs::write(&source, &data).unwrap();

        let output = default_output_path(&source);
        let recovery = recover_file(
            &source,
            &output,
            &XmlPayloadExtractor::new(),
            Some(&XmlReindenter::new()),
        )
        .unwrap();

        assert!(!recovery.truncated);
        assert_eq!(recovery.lines, 8);

        let written = fs::read(&output).unwrap();
        let (text, _) = UTF_16LE.decode_without_bom_handling(&written[2..]);
        assert_eq!(
            text,
            concat!(
                "<MovieMaker Version=\"2.1\">\r\n",
                "\t<Project>\r\n",
                "\t\t<Name>Summer\r\n",
                "\t</Name>\r\n",
                "\t<Clip Id=\"1\" Src=\"C:/video/beach.avi\"/>\r\n",
                "\t<Clip Id=\"2\"/>\r\n",
                "</Project>\r\n",
                "</MovieMaker>"
            )
        );
    }

    #[test]
    fn test_recover_file_raw() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("raw.MSWMM");
        let mut data = vec![0u8; 512];
        data.extend(utf16le(DOCUMENT));
        fs::write(&source, &data).unwrap();

        let output = temp.path().join("raw.XML");
        let recovery =
            recover_file(&source, &output, &XmlPayloadExtractor::new(), None).unwrap();
        assert_eq!(recovery.lines, 1);

        let written = fs::read(&output).unwrap();
        assert_eq!(&written[..2], &UTF16LE_BOM);
        let (text, _) = UTF_16LE.decode_without_bom_handling(&written[2..]);
        assert_eq!(text, DOCUMENT);
    }

    #[test]
    fn test_recover_file_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = recover_file(
            temp.path().join("gone.MSWMM"),
            temp.path().join("gone.XML"),
            &XmlPayloadExtractor::new(),
            Some(&XmlReindenter::new()),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
