//! Error types for the parsing and interpreter layers.
//!
//! [`ContentStreamError`] describes what is wrong with a content stream;
//! [`BackendError`] adds the operator context and wraps document-level
//! failures. Both convert into [`PdfError`] at the public API boundary.

use pdfsift_core::PdfError;
use thiserror::Error;

/// A content stream that breaks operator nesting or operand rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContentStreamError {
    /// `Q` with only the base graphics state left.
    #[error("graphics state stack underflow (Q without matching q)")]
    StateStackUnderflow,

    /// `EMC` with no open context, or a result requested while contexts
    /// are still open.
    #[error("unbalanced marked content: {open} context(s) open")]
    UnbalancedContext { open: usize },

    /// A text operator outside `BT`/`ET`.
    #[error("'{operator}' outside a BT/ET text object")]
    TextObjectNotOpen { operator: String },

    /// `BT` while a text object is already open.
    #[error("BT inside an open text object")]
    NestedTextObject,

    /// A `TJ` array whose strings and numbers do not alternate.
    #[error("malformed TJ array: {reason}")]
    MalformedTextArray { reason: String },

    /// Text shown before any `Tf`.
    #[error("'{operator}' shows text with no font selected")]
    NoFontSelected { operator: String },

    /// An operand has the wrong type.
    #[error("'{operator}' operand {index}: expected {expected}")]
    OperandType {
        operator: String,
        index: usize,
        expected: &'static str,
    },

    /// Fewer operands than the operator needs.
    #[error("'{operator}' is missing operand {index}")]
    MissingOperand { operator: String, index: usize },

    /// A named resource is absent from the resource dictionary.
    #[error("{kind} resource '{name}' not found")]
    MissingResource { kind: &'static str, name: String },

    /// Forms or marked content nested beyond the configured limit.
    #[error("nesting deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    /// A form XObject stream could not be decoded.
    #[error("unreadable stream: {0}")]
    Stream(String),
}

/// Error type for PDF parsing backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error from PDF parsing (structure, syntax, object resolution).
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// Error reading PDF data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error resolving font or encoding information.
    #[error("font error: {0}")]
    Font(String),

    /// An operator failed while interpreting a content stream.
    #[error("operator #{index} '{operator}': {source}")]
    ContentStream {
        operator: String,
        index: usize,
        #[source]
        source: ContentStreamError,
    },

    /// A content stream failure not tied to one operator.
    #[error(transparent)]
    Malformed(#[from] ContentStreamError),

    /// Two operators registered under one name.
    #[error("content operator '{0}' already registered")]
    DuplicateOperator(String),

    /// A core library error.
    #[error(transparent)]
    Core(#[from] PdfError),
}

impl BackendError {
    /// The underlying content stream error, if this is one.
    pub fn content_stream_error(&self) -> Option<&ContentStreamError> {
        match self {
            BackendError::ContentStream { source, .. } => Some(source),
            BackendError::Malformed(source) => Some(source),
            _ => None,
        }
    }
}

impl From<BackendError> for PdfError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Parse(msg) => PdfError::ParseError(msg),
            BackendError::Io(e) => PdfError::IoError(e.to_string()),
            BackendError::Font(msg) => PdfError::FontError(msg),
            e @ (BackendError::ContentStream { .. } | BackendError::Malformed(_)) => {
                PdfError::MalformedContent {
                    page: None,
                    message: e.to_string(),
                }
            }
            e @ BackendError::DuplicateOperator(_) => PdfError::InterpreterError(e.to_string()),
            BackendError::Core(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_parse() {
        let err = BackendError::Parse("invalid xref table".to_string());
        assert_eq!(err.to_string(), "PDF parse error: invalid xref table");
    }

    #[test]
    fn backend_error_io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: BackendError = io_err.into();
        assert!(matches!(err, BackendError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn content_stream_error_carries_operator_context() {
        let err = BackendError::ContentStream {
            operator: "Tj".to_string(),
            index: 4,
            source: ContentStreamError::TextObjectNotOpen {
                operator: "Tj".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "operator #4 'Tj': 'Tj' outside a BT/ET text object"
        );
        assert_eq!(
            err.content_stream_error(),
            Some(&ContentStreamError::TextObjectNotOpen {
                operator: "Tj".to_string()
            })
        );
    }

    #[test]
    fn malformed_from_content_stream_error() {
        let err: BackendError = ContentStreamError::UnbalancedContext { open: 2 }.into();
        assert_eq!(
            err.to_string(),
            "unbalanced marked content: 2 context(s) open"
        );
    }

    #[test]
    fn operand_type_message() {
        let err = ContentStreamError::OperandType {
            operator: "Tf".to_string(),
            index: 1,
            expected: "number",
        };
        assert_eq!(err.to_string(), "'Tf' operand 1: expected number");
    }

    #[test]
    fn duplicate_operator_message() {
        let err = BackendError::DuplicateOperator("Tj".to_string());
        assert_eq!(err.to_string(), "content operator 'Tj' already registered");
        assert!(err.content_stream_error().is_none());
    }

    #[test]
    fn backend_error_to_pdf_error_malformed() {
        let backend = BackendError::ContentStream {
            operator: "Q".to_string(),
            index: 0,
            source: ContentStreamError::StateStackUnderflow,
        };
        let pdf_err: PdfError = backend.into();
        assert!(matches!(pdf_err, PdfError::MalformedContent { page: None, .. }));
        assert!(pdf_err.to_string().contains("underflow"));
    }

    #[test]
    fn backend_error_to_pdf_error_parse() {
        let backend = BackendError::Parse("bad syntax".to_string());
        let pdf_err: PdfError = backend.into();
        assert_eq!(pdf_err, PdfError::ParseError("bad syntax".to_string()));
    }

    #[test]
    fn backend_error_to_pdf_error_font() {
        let backend = BackendError::Font("missing widths".to_string());
        let pdf_err: PdfError = backend.into();
        assert_eq!(pdf_err, PdfError::FontError("missing widths".to_string()));
    }

    #[test]
    fn backend_error_to_pdf_error_core_passthrough() {
        let original = PdfError::InvalidPattern("empty".to_string());
        let backend = BackendError::Core(original.clone());
        let pdf_err: PdfError = backend.into();
        assert_eq!(pdf_err, original);
    }

    #[test]
    fn backend_error_implements_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(BackendError::Parse("test".to_string()));
        assert_eq!(err.to_string(), "PDF parse error: test");
    }
}
