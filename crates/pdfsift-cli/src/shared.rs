use std::io::{self, IsTerminal, Write};
use std::path::Path;

use pdfsift::{ExtractOptions, Pdf};
use tracing_subscriber::EnvFilter;

use crate::page_range::parse_page_range;

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Open a PDF file with user-friendly error messages.
///
/// Returns `Err(1)` with a message printed to stderr if the file is not found
/// or cannot be parsed as a valid PDF.
pub fn open_pdf(file: &Path, options: ExtractOptions) -> Result<Pdf, i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }

    Pdf::open_file(file, Some(options)).map_err(|e| {
        eprintln!("Error: failed to open PDF: {e}");
        1
    })
}

/// Resolve an optional page range into 1-based page numbers; `None` means
/// every page.
pub fn resolve_pages(pages: Option<&str>, page_count: u32) -> Result<Vec<u32>, i32> {
    match pages {
        Some(range) => parse_page_range(range, page_count).map_err(|e| {
            eprintln!("Error: {e}");
            1
        }),
        None => Ok((1..=page_count).collect()),
    }
}

/// Escape a string for CSV output.
///
/// If the text contains commas, double quotes, or newlines, wraps it in
/// double quotes and escapes any internal double quotes by doubling them.
pub fn csv_escape(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Prints "Processing page N/M..." to stderr, only when stderr is a TTY.
pub struct ProgressReporter {
    total: usize,
    is_tty: bool,
}

impl ProgressReporter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            is_tty: io::stderr().is_terminal(),
        }
    }

    /// Report progress for the `current`-th page processed (1-based).
    pub fn report(&self, current: usize) {
        if self.is_tty {
            eprint!("\rProcessing page {}/{}...", current, self.total);
            let _ = io::stderr().flush();
        }
    }

    /// Clear the progress line.
    pub fn finish(&self) {
        if self.is_tty {
            eprint!("\r{}\r", " ".repeat(40));
            let _ = io::stderr().flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escape_plain_text() {
        assert_eq!(csv_escape("hello"), "hello");
        assert_eq!(csv_escape(""), "");
    }

    #[test]
    fn csv_escape_with_comma() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
    }

    #[test]
    fn csv_escape_with_quotes() {
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn csv_escape_with_newline() {
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn open_pdf_file_not_found() {
        let result = open_pdf(Path::new("/nonexistent/file.pdf"), ExtractOptions::default());
        assert_eq!(result.err(), Some(1));
    }

    #[test]
    fn resolve_pages_none_returns_all() {
        assert_eq!(resolve_pages(None, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn resolve_pages_with_range() {
        assert_eq!(resolve_pages(Some("1,3"), 5).unwrap(), vec![1, 3]);
    }

    #[test]
    fn resolve_pages_invalid_range() {
        assert_eq!(resolve_pages(Some("0"), 5).unwrap_err(), 1);
    }

    #[test]
    fn progress_reporter_creation() {
        let reporter = ProgressReporter::new(10);
        assert_eq!(reporter.total, 10);
    }
}
