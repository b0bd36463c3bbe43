//! Fixed byte signatures recognised inside Movie Maker project files.
//!
//! The built-in table:
//!
//! | Signature        | Bytes                                   |
//! |------------------|-----------------------------------------|
//! | [`JFIF_HEADER`]  | `FF D8 FF E0 00 10 4A 46 49 46`         |
//! | [`JFIF_FOOTER`]  | `FF D9 00 00`                           |
//! | [`XML_OPEN`]     | UTF-16LE `<MovieMaker`, last NUL dropped |
//! | [`XML_CLOSE`]    | UTF-16LE `ieMaker>`                     |
//! | [`MSWMM_MARKER`] | UTF-16LE `<MovieMaker`                  |

use memchr::memmem::Finder;
use std::borrow::Cow;

/// JFIF start-of-image marker followed by the APP0 `JFIF` identifier
pub const JFIF_HEADER: ByteSignature = ByteSignature::from_static(
    "jfif-header",
    &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46],
);

/// JFIF end-of-image marker as it appears padded inside the container
pub const JFIF_FOOTER: ByteSignature =
    ByteSignature::from_static("jfif-footer", &[0xFF, 0xD9, 0x00, 0x00]);

/// Opening of the `<MovieMaker` root element.
///
/// The trailing NUL of the final UTF-16 code unit is left off, so this is a
/// prefix match on the element name.
pub const XML_OPEN: ByteSignature = ByteSignature::from_static(
    "xml-open",
    &[
        0x3C, 0x00, 0x4D, 0x00, 0x6F, 0x00, 0x76, 0x00, 0x69, 0x00, 0x65, 0x00, 0x4D, 0x00, 0x61,
        0x00, 0x6B, 0x00, 0x65, 0x00, 0x72,
    ],
);

/// Tail of the `</MovieMaker>` closing element
pub const XML_CLOSE: ByteSignature = ByteSignature::from_static(
    "xml-close",
    &[
        0x69, 0x00, 0x65, 0x00, 0x4D, 0x00, 0x61, 0x00, 0x6B, 0x00, 0x65, 0x00, 0x72, 0x00, 0x3E,
        0x00,
    ],
);

/// Full UTF-16LE `<MovieMaker`, used to decide whether a file is a project
pub const MSWMM_MARKER: ByteSignature = ByteSignature::from_static(
    "mswmm-marker",
    &[
        0x3C, 0x00, 0x4D, 0x00, 0x6F, 0x00, 0x76, 0x00, 0x69, 0x00, 0x65, 0x00, 0x4D, 0x00, 0x61,
        0x00, 0x6B, 0x00, 0x65, 0x00, 0x72, 0x00,
    ],
);

/// A named, fixed-length byte pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSignature {
    name: Cow<'static, str>,
    bytes: Cow<'static, [u8]>,
}

impl ByteSignature {
    /// Creates a signature from static data, usable in `const` items
    pub const fn from_static(name: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            bytes: Cow::Borrowed(bytes),
        }
    }

    /// Creates a signature from arbitrary bytes
    pub fn new(name: impl Into<Cow<'static, str>>, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Creates a signature matching the UTF-16LE encoding of `text`
    pub fn utf16le(name: impl Into<Cow<'static, str>>, text: &str) -> Self {
        let bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        Self::new(name, bytes)
    }

    /// Returns the signature's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw pattern
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pattern length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for a zero-length pattern
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Every start position of the finder's needle inside `haystack`, overlaps
/// included
pub(crate) fn find_all<'a>(
    haystack: &'a [u8],
    finder: &'a Finder<'a>,
) -> impl Iterator<Item = usize> + 'a {
    let mut from = 0;
    std::iter::from_fn(move || {
        if finder.needle().is_empty() {
            return None;
        }
        let found = from + finder.find(haystack.get(from..)?)?;
        from = found + 1;
        Some(found)
    })
}
