//! Error types.

use std::fmt;

use thiserror::Error;

use crate::source::SourceFile;
use crate::symbols::SymbolId;

/// Malformed source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// Path of the file which failed to parse.
    pub path: String,
    /// Zero-based line of the error.
    pub line: usize,
    /// Zero-based column of the error.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

impl ParseError {
    /// Create an error pointing at byte `offset` of `file`.
    pub fn at(file: &SourceFile, offset: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = file.location(offset);
        ParseError {
            path: file.path().to_string(),
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{},{}: {}",
            self.path, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Errors which abort an analysis run.
#[derive(Debug, Error)]
pub enum Error {
    /// A project or source file could not be read.
    #[error("{path}: {source}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Walking the project directory failed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Malformed source text.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Malformed match pattern.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Two symbols were given the same identity. This is a bug, not bad input.
    #[error("internal error: symbol identity {id} assigned twice (second: {name})")]
    DuplicateIdentity {
        /// The reused identity.
        id: SymbolId,
        /// Fully-qualified name of the second symbol.
        name: String,
    },
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_points_at_location() {
        let file = SourceFile::new("Foo.cs", "class Foo {\n  int ?\n}");
        let err = ParseError::at(&file, 18, "expected identifier");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 6);
        assert_eq!(err.to_string(), "Foo.cs:1,6: expected identifier");
    }

    #[test]
    fn pattern_errors_convert() {
        let err: Error = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, Error::InvalidPattern(_)));
        assert!(err.to_string().starts_with("invalid pattern: "));
    }
}
