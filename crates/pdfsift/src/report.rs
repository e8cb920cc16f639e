//! Results of a multi-page search.

use pdfsift_core::{MatchedPattern, PdfError};

/// A page that could not be searched.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PageFailure {
    /// 1-based page number.
    pub page: u32,
    #[cfg_attr(feature = "serde", serde(serialize_with = "error_message"))]
    pub error: PdfError,
}

#[cfg(feature = "serde")]
fn error_message<S: serde::Serializer>(error: &PdfError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Matches from every page that was searched, plus the pages that failed.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SearchReport {
    /// Matches in page order, then content order within a page.
    pub matches: Vec<MatchedPattern>,
    pub failures: Vec<PageFailure>,
}

impl SearchReport {
    /// True when every page was searched.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Matches on one page.
    pub fn matches_on(&self, page: u32) -> impl Iterator<Item = &MatchedPattern> {
        self.matches.iter().filter(move |m| m.page == page)
    }
}
