//! Error type and extraction options for pdfsift.
//!
//! Provides [`PdfError`] for failures surfaced by the public API and
//! [`ExtractOptions`] for configuring limits and strictness of the
//! content-stream interpreter.

use std::fmt;

/// Fatal error types for PDF processing.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfError {
    /// Error parsing PDF structure or syntax.
    ParseError(String),
    /// I/O error reading PDF data.
    IoError(String),
    /// Error resolving font or encoding information.
    FontError(String),
    /// Error during content stream interpretation.
    InterpreterError(String),
    /// The content stream violates operator nesting or operand rules.
    MalformedContent {
        /// Page number (1-based), when known.
        page: Option<u32>,
        /// Description including the offending operator.
        message: String,
    },
    /// A search pattern was empty or failed to compile.
    InvalidPattern(String),
    /// A page number outside `1..=page_count` was requested.
    PageOutOfRange {
        page: u32,
        page_count: u32,
    },
    /// A configured resource limit was exceeded.
    ResourceLimitExceeded {
        /// Name of the limit that was exceeded (e.g., "max_input_bytes").
        limit_name: String,
        /// The configured limit value.
        limit_value: usize,
        /// The actual value that exceeded the limit.
        actual_value: usize,
    },
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::ParseError(msg) => write!(f, "parse error: {msg}"),
            PdfError::IoError(msg) => write!(f, "I/O error: {msg}"),
            PdfError::FontError(msg) => write!(f, "font error: {msg}"),
            PdfError::InterpreterError(msg) => write!(f, "interpreter error: {msg}"),
            PdfError::MalformedContent {
                page: Some(page),
                message,
            } => write!(f, "malformed content stream on page {page}: {message}"),
            PdfError::MalformedContent {
                page: None,
                message,
            } => write!(f, "malformed content stream: {message}"),
            PdfError::InvalidPattern(msg) => write!(f, "invalid search pattern: {msg}"),
            PdfError::PageOutOfRange { page, page_count } => write!(
                f,
                "page {page} out of range (document has {page_count} pages)"
            ),
            PdfError::ResourceLimitExceeded {
                limit_name,
                limit_value,
                actual_value,
            } => write!(
                f,
                "resource limit exceeded: {limit_name} (limit: {limit_value}, actual: {actual_value})"
            ),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<std::io::Error> for PdfError {
    fn from(err: std::io::Error) -> Self {
        PdfError::IoError(err.to_string())
    }
}

/// What the interpreter does with a `Q` that would pop the base state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestorePolicy {
    /// Log a warning and keep the base state.
    #[default]
    Ignore,
    /// Abort the stream with a state-stack underflow.
    Error,
}

/// Options controlling interpretation and resource limits.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Maximum recursion depth for nested Form XObjects (default: 10).
    pub max_recursion_depth: usize,
    /// Maximum marked-content nesting depth (default: 256).
    pub max_marked_content_depth: usize,
    /// Handling of unbalanced `Q` operators (default: ignore).
    pub unbalanced_restore: RestorePolicy,
    /// Reject `TJ` arrays whose strings and numbers do not alternate
    /// (default: true).
    pub strict_text_arrays: bool,
    /// Wrap extracted text in context tags and word spans (default: false).
    pub use_markup: bool,
    /// Stop a multi-page search at the first failing page (default: false).
    pub fail_fast: bool,
    /// Maximum input PDF file size in bytes (default: None = no limit).
    pub max_input_bytes: Option<usize>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: 10,
            max_marked_content_depth: 256,
            unbalanced_restore: RestorePolicy::Ignore,
            strict_text_arrays: true,
            use_markup: false,
            fail_fast: false,
            max_input_bytes: None,
        }
    }
}
