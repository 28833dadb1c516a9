//! Source files and spans into them.

use log::warn;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// A span in a source file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    /// Starting byte index of the span.
    pub lo: usize,
    /// Byte index one past the end of the span.
    pub hi: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(lo: usize, hi: usize) -> Span {
        Span { lo, hi }
    }

    /// Merge two spans.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    /// Does this span contain `other`?
    pub fn contains(&self, other: &Span) -> bool {
        self.lo <= other.lo && other.hi <= self.hi
    }
}

/// A source file, read once and never mutated.
///
/// # Examples
///
/// ```
/// use surface_area::source::{SourceFile, Span};
///
/// let file = SourceFile::new("Foo.cs", "class Foo {\n  int Bar;\n}");
/// assert_eq!(file.location(14), (1, 2));
/// assert_eq!(file.text_of(Span::new(14, 21)), "int Bar");
/// ```
#[derive(Clone, Debug)]
pub struct SourceFile {
    path: String,
    text: String,
    /// Starting byte of every line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Wrap already-read text. A leading byte-order mark is dropped.
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> SourceFile {
        let mut text = text.into();
        if text.starts_with(BYTE_ORDER_MARK) {
            text.replace_range(..BYTE_ORDER_MARK.len_utf8(), "");
        }
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        SourceFile {
            path: path.into(),
            text,
            line_starts,
        }
    }

    /// Read a file from disk. The handle is released before returning.
    /// Invalid UTF-8 is replaced, with a warning.
    pub fn read(path: &Path) -> Result<SourceFile> {
        let mut buf = Vec::new();
        {
            let mut fp = File::open(path).map_err(|source| Error::Io {
                path: path.display().to_string(),
                source,
            })?;
            fp.read_to_end(&mut buf).map_err(|source| Error::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        let text = match String::from_utf8(buf) {
            Ok(text) => text,
            Err(err) => {
                warn!("{} is not valid UTF-8, decoding lossily", path.display());
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        Ok(SourceFile::new(path.display().to_string(), text))
    }

    /// Path of the file, as given when it was loaded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whole text of the file.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Get the text contained in the span.
    pub fn text_of(&self, span: Span) -> &str {
        self.text
            .get(span.lo.min(self.text.len())..span.hi.min(self.text.len()))
            .unwrap_or("")
    }

    /// Zero-based (line, column) of a byte offset. Columns count characters.
    pub fn location(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start);
        (line, column)
    }
}
