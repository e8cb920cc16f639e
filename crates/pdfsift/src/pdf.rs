//! Top-level PDF document type.

use pdfsift_core::{ExtractOptions, MatchedPattern, PdfError, SearchOptions, SearchPattern};
use pdfsift_parse::{BackendError, LopdfBackend, LopdfDocument};
use tracing::{debug, warn};

use crate::report::{PageFailure, SearchReport};

/// A PDF document opened for text extraction and search.
///
/// Page numbers are 1-based throughout.
///
/// ```ignore
/// let pdf = Pdf::open(bytes, None)?;
/// let text = pdf.extract_text(1)?;
/// let matches = pdf.search_page(1, "total", &SearchOptions::default())?;
/// ```
#[derive(Debug)]
pub struct Pdf {
    doc: LopdfDocument,
    options: ExtractOptions,
}

impl Pdf {
    /// Open a PDF document from a file path.
    ///
    /// Reads the file into memory, then behaves like [`Pdf::open`].
    ///
    /// # Errors
    ///
    /// Returns [`PdfError`] if the file cannot be read or is not a valid PDF.
    #[cfg(feature = "std")]
    pub fn open_file(
        path: impl AsRef<std::path::Path>,
        options: Option<ExtractOptions>,
    ) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| PdfError::IoError(e.to_string()))?;
        Self::open(&bytes, options)
    }

    /// Open a PDF document from bytes.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Raw PDF file bytes.
    /// * `options` - Interpreter limits and strictness. Uses defaults if `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::ResourceLimitExceeded`] if the input is larger than
    /// `max_input_bytes`, or [`PdfError::ParseError`] if the bytes are not a
    /// readable, unencrypted PDF document.
    pub fn open(bytes: &[u8], options: Option<ExtractOptions>) -> Result<Self, PdfError> {
        let options = options.unwrap_or_default();
        let doc = LopdfBackend::open(bytes, &options)?;
        Ok(Self { doc, options })
    }

    pub fn page_count(&self) -> u32 {
        self.doc.page_count()
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Reconstructed text of one page.
    ///
    /// Only text inside named marked-content contexts is kept; artifacts
    /// are dropped. With `use_markup` the result carries context tags and
    /// word spans.
    ///
    /// # Errors
    ///
    /// [`PdfError::PageOutOfRange`], or [`PdfError::MalformedContent`]
    /// naming the page and operator when the content stream is invalid.
    pub fn extract_text(&self, page: u32) -> Result<String, PdfError> {
        LopdfBackend::extract_page_text(&self.doc, page, &self.options)
            .map_err(|e| page_error(page, e))
    }

    /// Every match of `pattern` on one page.
    ///
    /// # Errors
    ///
    /// [`PdfError::InvalidPattern`] for an empty or invalid pattern,
    /// checked before the page is interpreted; otherwise as for
    /// [`Pdf::extract_text`].
    pub fn search_page(
        &self,
        page: u32,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<Vec<MatchedPattern>, PdfError> {
        let pattern = SearchPattern::new(pattern, options)?;
        self.search_compiled(page, &pattern)
    }

    /// Search every page in order.
    ///
    /// A page that fails is recorded in [`SearchReport::failures`] and the
    /// scan continues, unless `fail_fast` is set, in which case the first
    /// failure is returned as the error.
    ///
    /// # Errors
    ///
    /// [`PdfError::InvalidPattern`] before any page is read, or the first
    /// page error under `fail_fast`.
    pub fn search_file(
        &self,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<SearchReport, PdfError> {
        let pattern = SearchPattern::new(pattern, options)?;
        debug!(pattern = pattern.as_str(), pages = self.page_count(), "searching document");

        let mut report = SearchReport::default();
        for page in 1..=self.page_count() {
            let result = self.search_compiled(page, &pattern);
            self.record(&mut report, page, result)?;
        }
        Ok(report)
    }

    /// [`Pdf::search_file`] with pages searched concurrently on rayon.
    ///
    /// Each page gets its own interpreter. The report is identical to the
    /// sequential one, page order included.
    ///
    /// # Errors
    ///
    /// As for [`Pdf::search_file`].
    #[cfg(feature = "parallel")]
    pub fn search_file_parallel(
        &self,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<SearchReport, PdfError> {
        use rayon::prelude::*;

        let pattern = SearchPattern::new(pattern, options)?;
        let results: Vec<_> = (1..=self.page_count())
            .into_par_iter()
            .map(|page| (page, self.search_compiled(page, &pattern)))
            .collect();

        let mut report = SearchReport::default();
        for (page, result) in results {
            self.record(&mut report, page, result)?;
        }
        Ok(report)
    }

    fn search_compiled(
        &self,
        page: u32,
        pattern: &SearchPattern,
    ) -> Result<Vec<MatchedPattern>, PdfError> {
        LopdfBackend::search_page(&self.doc, page, pattern, &self.options)
            .map_err(|e| page_error(page, e))
    }

    fn record(
        &self,
        report: &mut SearchReport,
        page: u32,
        result: Result<Vec<MatchedPattern>, PdfError>,
    ) -> Result<(), PdfError> {
        match result {
            Ok(matches) => report.matches.extend(matches),
            Err(error) if self.options.fail_fast => return Err(error),
            Err(error) => {
                warn!(page, %error, "skipping page that failed to search");
                report.failures.push(PageFailure { page, error });
            }
        }
        Ok(())
    }
}

/// Convert a backend error, attaching the page to content stream errors.
fn page_error(page: u32, err: BackendError) -> PdfError {
    match PdfError::from(err) {
        PdfError::MalformedContent { page: None, message } => PdfError::MalformedContent {
            page: Some(page),
            message,
        },
        other => other,
    }
}
