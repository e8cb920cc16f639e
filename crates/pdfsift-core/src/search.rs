//! Pattern search over shown strings, producing matches with bounding boxes.

use regex::Regex;

use crate::error::PdfError;
use crate::geometry::BBox;

/// Options controlling text search behavior.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchOptions {
    /// Whether to interpret the pattern as a regex (default: `true`).
    /// When `false`, the pattern is treated as a literal string.
    pub regex: bool,
    /// Whether the search is case-sensitive (default: `true`).
    pub case_sensitive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            regex: true,
            case_sensitive: true,
        }
    }
}

/// One pattern match located on a page.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedPattern {
    /// The matched substring.
    pub text: String,
    /// The full decoded string the match was found in.
    pub shown_text: String,
    /// Page number (1-based).
    pub page: u32,
    /// Box in PDF points, origin at the page's lower-left corner.
    pub bbox: BBox,
}

/// A validated, compiled search pattern.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    source: String,
    regex: Regex,
}

impl SearchPattern {
    /// Compile `pattern` under `options`.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::InvalidPattern`] if the pattern is empty or is not
    /// a valid regular expression.
    pub fn new(pattern: &str, options: &SearchOptions) -> Result<Self, PdfError> {
        if pattern.is_empty() {
            return Err(PdfError::InvalidPattern(
                "search pattern must not be empty".to_string(),
            ));
        }
        let body = if options.regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let full = if options.case_sensitive {
            body
        } else {
            format!("(?i){body}")
        };
        let regex = Regex::new(&full)
            .map_err(|e| PdfError::InvalidPattern(format!("'{pattern}': {e}")))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as supplied by the caller.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Vertical extent and page shared by every match in one shown string.
#[derive(Debug, Clone, Copy)]
pub struct MatchLine {
    pub lly: f64,
    pub ury: f64,
    pub page: u32,
}

/// Run `pattern` over a shown string and box every match.
///
/// `units` holds the decoded text of each character code in order and
/// `positions` the x coordinate before each code plus one trailing entry,
/// so `positions.len() == units.len() + 1`. Empty matches are skipped.
pub fn locate_matches(
    pattern: &SearchPattern,
    units: &[String],
    positions: &[f64],
    line: MatchLine,
) -> Vec<MatchedPattern> {
    if units.is_empty() || positions.len() != units.len() + 1 {
        return Vec::new();
    }

    let mut shown = String::new();
    // byte_to_unit[byte_offset] = index into units
    let mut byte_to_unit: Vec<usize> = Vec::new();
    for (i, unit) in units.iter().enumerate() {
        shown.push_str(unit);
        byte_to_unit.resize(shown.len(), i);
    }

    let mut results = Vec::new();
    for m in pattern.regex.find_iter(&shown) {
        if m.start() == m.end() {
            continue;
        }
        let first = byte_to_unit[m.start()];
        let last = byte_to_unit[m.end() - 1] + 1;
        let (x0, x1) = (positions[first], positions[last]);
        results.push(MatchedPattern {
            text: m.as_str().to_string(),
            shown_text: shown.clone(),
            page: line.page,
            bbox: BBox::new(x0.min(x1), line.lly, x0.max(x1), line.ury),
        });
    }
    results
}
