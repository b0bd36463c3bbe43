//! Tag-boundary re-indentation of single-line XML.
//!
//! Project XML is stored as one long line. [`XmlReindenter`] splits it at
//! every `<` and puts each tag on its own indented line. There is no parser
//! behind this: the input may be truncated or malformed, and every tag is
//! classified purely by its spelling.

use std::fmt::{self, Write as FmtWrite};

/// Configuration for re-indentation
#[derive(Debug, Clone)]
pub struct ReindentConfig {
    /// Indentation unit (default: one tab)
    pub indent: String,
    /// Line terminator placed between lines (default: CRLF)
    pub line_ending: String,
}

impl Default for ReindentConfig {
    fn default() -> Self {
        Self {
            indent: "\t".to_string(),
            line_ending: "\r\n".to_string(),
        }
    }
}

impl ReindentConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation unit
    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Sets the line terminator
    pub fn line_ending(mut self, line_ending: impl Into<String>) -> Self {
        self.line_ending = line_ending.into();
        self
    }
}

/// How a tag moves the indentation depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<x/>`: depth unchanged
    SelfClosing,
    /// `</x>`: depth drops by one before the line is written
    Closing,
    /// `<x ...>`: depth grows by one after the line is written
    Opening,
    /// `<x>text`: element content follows the tag, depth unchanged
    Text,
}

impl TagKind {
    /// Classifies a tag body, i.e. the text following its `<`
    pub fn of(token: &str) -> Self {
        if token.ends_with("/>") {
            TagKind::SelfClosing
        } else if token.contains('/') && token.ends_with('>') && !token.contains('=') {
            TagKind::Closing
        } else if token.ends_with('>') {
            TagKind::Opening
        } else {
            TagKind::Text
        }
    }
}

/// Turns single-line XML into one indented tag per line
#[derive(Debug, Clone, Default)]
pub struct XmlReindenter {
    config: ReindentConfig,
}

impl XmlReindenter {
    /// Creates a reindenter with tab indentation and CRLF line endings
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reindenter with custom configuration
    pub fn with_config(config: ReindentConfig) -> Self {
        Self { config }
    }

    /// Re-indents `xml` into a new string
    pub fn reindent(&self, xml: &str) -> String {
        let mut output = String::with_capacity(xml.len() + xml.len() / 4);
        self.write_to(xml, &mut output).expect("String write cannot fail");
        output
    }

    /// Writes the re-indented rendition of `xml` to `w`.
    ///
    /// Everything after the last `>` and before the first `<` is dropped.
    /// No terminator follows the final line.
    pub fn write_to(&self, xml: &str, w: &mut impl FmtWrite) -> fmt::Result {
        let Some(last) = xml.rfind('>') else {
            return Ok(());
        };
        let xml = &xml[..=last];

        let mut depth = 0usize;
        let mut first_line = true;

        for token in xml.split('<').skip(1) {
            let token = token.trim_end();
            if !token.contains('>') {
                continue;
            }

            let kind = TagKind::of(token);
            if kind == TagKind::Closing {
                depth = depth.saturating_sub(1);
            }

            if !first_line {
                w.write_str(&self.config.line_ending)?;
            }
            first_line = false;

            for _ in 0..depth {
                w.write_str(&self.config.indent)?;
            }
            w.write_char('<')?;
            w.write_str(token)?;

            if kind == TagKind::Opening {
                depth += 1;
            }
        }

        Ok(())
    }
}

/// Re-indents with the default tab/CRLF configuration
pub fn reindent(xml: &str) -> String {
    XmlReindenter::new().reindent(xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strip_indentation(text: &str) -> String {
        text.split("\r\n")
            .map(|line| line.trim_start_matches('\t'))
            .collect::<Vec<_>>()
            .join("\r\n")
    }

    #[test]
    fn test_nested_and_self_closing() {
        assert_eq!(
            reindent("<A><B/><C></C></A>"),
            "<A>\r\n\t<B/>\r\n\t<C>\r\n\t</C>\r\n</A>"
        );
    }

    #[test]
    fn test_tag_kinds() {
        assert_eq!(TagKind::of("B/>"), TagKind::SelfClosing);
        assert_eq!(TagKind::of("Clip src=\"a\"/>"), TagKind::SelfClosing);
        assert_eq!(TagKind::of("/C>"), TagKind::Closing);
        assert_eq!(TagKind::of("C>"), TagKind::Opening);
        // Slashes inside attribute values don't make a closing tag
        assert_eq!(TagKind::of("Clip Path=\"C:/media/a.avi\">"), TagKind::Opening);
        assert_eq!(TagKind::of("Title>AC/DC"), TagKind::Text);
        assert_eq!(TagKind::of("Name>Summer"), TagKind::Text);
    }

    #[test]
    fn test_prelude_and_trailer_dropped() {
        assert_eq!(reindent("junk>more<A><B/></A>tail<C"), "<A>\r\n\t<B/>\r\n</A>");
    }

    #[test]
    fn test_no_tags() {
        assert_eq!(reindent(""), "");
        assert_eq!(reindent("no markup at all"), "");
        assert_eq!(reindent("only > here"), "");
    }

    #[test]
    fn test_text_content_stays_with_its_tag() {
        assert_eq!(
            reindent("<Project><Name>My holiday</Name></Project>"),
            "<Project>\r\n\t<Name>My holiday\r\n</Name>\r\n</Project>"
        );
    }

    #[test]
    fn test_text_content_leaves_depth_unchanged() {
        assert_eq!(
            reindent("<Project><Name>Summer</Name><Clips><Clip/></Clips></Project>"),
            "<Project>\r\n\t<Name>Summer\r\n</Name>\r\n<Clips>\r\n\t<Clip/>\r\n</Clips>\r\n</Project>"
        );
    }

    #[test]
    fn test_depth_never_negative() {
        assert_eq!(reindent("</X></Y><Z>"), "</X>\r\n</Y>\r\n<Z>");
    }

    #[test]
    fn test_line_wrapped_input() {
        let wrapped = "<A>\n  <B x=\"1\">\r\n    <C/>\n  </B>\n</A>\n";
        assert_eq!(
            reindent(wrapped),
            "<A>\r\n\t<B x=\"1\">\r\n\t\t<C/>\r\n\t</B>\r\n</A>"
        );
    }

    #[test]
    fn test_idempotent() {
        let input = concat!(
            "<MovieMaker Version=\"2\"><Storyboard><Clip Id=\"1\" Path=\"C:/a.avi\"/>",
            "<Clip Id=\"2\"><Effect Name=\"fade\"/></Clip></Storyboard>",
            "<Timeline><Track></Track></Timeline></MovieMaker>"
        );
        let once = reindent(input);
        let twice = reindent(&strip_indentation(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_custom_config() {
        let reindenter =
            XmlReindenter::with_config(ReindentConfig::new().indent("  ").line_ending("\n"));
        assert_eq!(reindenter.reindent("<A><B/></A>"), "<A>\n  <B/>\n</A>");
    }
}
