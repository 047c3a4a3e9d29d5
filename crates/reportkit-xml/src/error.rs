//! Error types for XML parsing with source positions.

use crate::Span;
use thiserror::Error;

/// Result type alias for reportkit-xml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building an XML tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Syntax error reported by quick-xml.
    #[error("XML syntax error: {message}")]
    XmlSyntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<usize>,
    },

    /// Input ended while an element was still open.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, location: Option<Span> },

    /// End tag does not match the innermost open element.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        location: Option<Span>,
    },

    /// Structurally invalid XML that quick-xml accepted.
    #[error("Invalid XML structure: {message}")]
    InvalidStructure { message: String, location: Option<Span> },

    /// No root element.
    #[error("Empty XML document: no root element found")]
    EmptyDocument,

    /// More than one root element.
    #[error("Invalid XML: multiple root elements")]
    MultipleRoots { location: Option<Span> },
}

impl Error {
    /// Stable short code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::XmlSyntax { .. } => "X-1",
            Error::UnexpectedEof { .. } => "X-2",
            Error::MismatchedEndTag { .. } => "X-3",
            Error::InvalidStructure { .. } => "X-4",
            Error::EmptyDocument => "X-5",
            Error::MultipleRoots { .. } => "X-6",
        }
    }

    /// Byte offset of the problem, when known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::XmlSyntax { position, .. } => *position,
            Error::UnexpectedEof { location, .. }
            | Error::MismatchedEndTag { location, .. }
            | Error::InvalidStructure { location, .. }
            | Error::MultipleRoots { location } => location.map(|span| span.start),
            Error::EmptyDocument => None,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlSyntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlSyntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            Error::XmlSyntax {
                message: "x".into(),
                position: None,
            },
            Error::UnexpectedEof {
                expected: "x".into(),
                location: None,
            },
            Error::MismatchedEndTag {
                expected: "a".into(),
                found: "b".into(),
                location: None,
            },
            Error::InvalidStructure {
                message: "x".into(),
                location: None,
            },
            Error::EmptyDocument,
            Error::MultipleRoots { location: None },
        ];
        let mut codes: Vec<_> = errors.iter().map(Error::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_offset_from_location() {
        let err = Error::MultipleRoots {
            location: Some(Span::new(7, 17)),
        };
        assert_eq!(err.offset(), Some(7));
        assert_eq!(Error::EmptyDocument.offset(), None);
    }

    #[test]
    fn test_mismatched_display() {
        let err = Error::MismatchedEndTag {
            expected: "dataSets".into(),
            found: "dataSet".into(),
            location: None,
        };
        assert_eq!(
            err.to_string(),
            "Mismatched end tag: expected </dataSets>, found </dataSet>"
        );
    }
}
