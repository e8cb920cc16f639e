//! Receivers for interpreted text.
//!
//! The interpreter owns the graphics and text state and reports shown
//! strings and marked-content boundaries to a [`ContentHandler`]. Two
//! handlers are provided: [`TextExtractor`] folds each marked-content
//! context through a [`TextAssembler`], and [`TextLocator`] boxes regex
//! matches inside each shown string.

use encoding_rs::WINDOWS_1252;
use pdfsift_core::{
    FinalText, IDENTITY_H, MatchLine, MatchedPattern, ParsedText, PdfFont, SearchPattern,
    TextAssembler, TextFragment, locate_matches,
};
use tracing::trace;

use crate::error::ContentStreamError;

/// Callbacks from the content stream interpreter.
pub trait ContentHandler {
    /// Open a marked-content context. `None` opens a suppressed context
    /// whose text is dropped.
    fn push_context(&mut self, name: Option<String>) -> Result<(), ContentStreamError>;

    /// Close the innermost context.
    fn pop_context(&mut self) -> Result<(), ContentStreamError>;

    /// The innermost context: `None` when no context is open,
    /// `Some(None)` when it is suppressed.
    fn current_context(&self) -> Option<Option<&str>>;

    /// Add completed text to the innermost context.
    fn add_final_text(&mut self, text: FinalText);

    /// Receive one shown string.
    fn display_text(&mut self, text: &ParsedText) -> Result<(), ContentStreamError>;

    fn context_depth(&self) -> usize;
}

/// Open marked-content contexts and the fragments buffered in each.
///
/// `names` and `saved` always have the same length: entering a context
/// parks the enclosing buffer in `saved` and starts an empty one.
#[derive(Debug)]
pub struct MarkedContentStack {
    names: Vec<Option<String>>,
    saved: Vec<Vec<TextFragment>>,
    buffer: Vec<TextFragment>,
    limit: usize,
}

impl MarkedContentStack {
    pub fn new(limit: usize) -> Self {
        Self {
            names: Vec::new(),
            saved: Vec::new(),
            buffer: Vec::new(),
            limit,
        }
    }

    /// # Errors
    ///
    /// [`ContentStreamError::NestingTooDeep`] past the configured limit.
    pub fn push(&mut self, name: Option<String>) -> Result<(), ContentStreamError> {
        if self.names.len() >= self.limit {
            return Err(ContentStreamError::NestingTooDeep { limit: self.limit });
        }
        self.names.push(name);
        self.saved.push(std::mem::take(&mut self.buffer));
        Ok(())
    }

    /// Close the innermost context, returning its name and fragments.
    ///
    /// # Errors
    ///
    /// [`ContentStreamError::UnbalancedContext`] when no context is open.
    pub fn pop(&mut self) -> Result<(Option<String>, Vec<TextFragment>), ContentStreamError> {
        match (self.names.pop(), self.saved.pop()) {
            (Some(name), Some(parent)) => {
                let fragments = std::mem::replace(&mut self.buffer, parent);
                Ok((name, fragments))
            }
            _ => Err(ContentStreamError::UnbalancedContext { open: 0 }),
        }
    }

    pub fn current(&self) -> Option<Option<&str>> {
        self.names.last().map(Option::as_deref)
    }

    pub fn add(&mut self, fragment: TextFragment) {
        self.buffer.push(fragment);
    }

    /// Fragments of the innermost context (or the top level).
    pub fn fragments(&self) -> &[TextFragment] {
        &self.buffer
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }
}

/// Extraction mode: reconstructs the text of every named context.
#[derive(Debug)]
pub struct TextExtractor<A: TextAssembler> {
    contexts: MarkedContentStack,
    assembler: A,
}

impl<A: TextAssembler> TextExtractor<A> {
    pub fn new(assembler: A, max_depth: usize) -> Self {
        Self {
            contexts: MarkedContentStack::new(max_depth),
            assembler,
        }
    }

    pub fn assembler(&self) -> &A {
        &self.assembler
    }

    pub fn assembler_mut(&mut self) -> &mut A {
        &mut self.assembler
    }

    /// Concatenated top-level text, trimmed.
    ///
    /// # Errors
    ///
    /// [`ContentStreamError::UnbalancedContext`] while contexts are open.
    pub fn resultant_text(&self) -> Result<String, ContentStreamError> {
        if self.contexts.depth() > 0 {
            return Err(ContentStreamError::UnbalancedContext {
                open: self.contexts.depth(),
            });
        }
        let text: String = self
            .contexts
            .fragments()
            .iter()
            .map(TextFragment::text)
            .collect();
        Ok(text.trim().to_string())
    }
}

impl<A: TextAssembler> ContentHandler for TextExtractor<A> {
    fn push_context(&mut self, name: Option<String>) -> Result<(), ContentStreamError> {
        self.contexts.push(name)
    }

    fn pop_context(&mut self) -> Result<(), ContentStreamError> {
        let (name, fragments) = self.contexts.pop()?;
        self.assembler.reset();
        for fragment in &fragments {
            fragment.accumulate(&mut self.assembler, name.as_deref());
        }
        match self.assembler.end_parsing_context(name.as_deref()) {
            Some(result) if !result.is_empty() => self.contexts.add(result.into()),
            _ => {}
        }
        Ok(())
    }

    fn current_context(&self) -> Option<Option<&str>> {
        self.contexts.current()
    }

    fn add_final_text(&mut self, text: FinalText) {
        self.contexts.add(text.into());
    }

    fn display_text(&mut self, text: &ParsedText) -> Result<(), ContentStreamError> {
        if let Some(Some(_)) = self.contexts.current() {
            self.contexts.add(text.clone().into());
        } else {
            trace!(text = text.text(), "dropping text outside a named context");
        }
        Ok(())
    }

    fn context_depth(&self) -> usize {
        self.contexts.depth()
    }
}

/// Locator mode: collects every match of a pattern with its box.
#[derive(Debug)]
pub struct TextLocator {
    contexts: MarkedContentStack,
    pattern: SearchPattern,
    page: u32,
    matches: Vec<MatchedPattern>,
}

impl TextLocator {
    pub fn new(pattern: SearchPattern, page: u32, max_depth: usize) -> Self {
        Self {
            contexts: MarkedContentStack::new(max_depth),
            pattern,
            page,
            matches: Vec::new(),
        }
    }

    pub fn matches(&self) -> &[MatchedPattern] {
        &self.matches
    }

    pub fn into_matches(self) -> Vec<MatchedPattern> {
        self.matches
    }
}

impl ContentHandler for TextLocator {
    fn push_context(&mut self, name: Option<String>) -> Result<(), ContentStreamError> {
        self.contexts.push(name)
    }

    fn pop_context(&mut self) -> Result<(), ContentStreamError> {
        self.contexts.pop().map(|_| ())
    }

    fn current_context(&self) -> Option<Option<&str>> {
        self.contexts.current()
    }

    fn add_final_text(&mut self, _text: FinalText) {}

    fn display_text(&mut self, text: &ParsedText) -> Result<(), ContentStreamError> {
        let state = text.state();
        let matrix = text.text_to_user();
        let units = shown_units(text.font().as_ref(), text.codes());

        let mut positions = Vec::with_capacity(units.len() + 1);
        positions.push(text.start().x);
        let mut advance = 0.0;
        for code in text.codes() {
            advance += state.glyph_advance(*code);
            positions.push(matrix.transform_point(advance, 0.0).0);
        }

        let y = text.start().y;
        let line = MatchLine {
            lly: y + text.descent(),
            ury: y + text.ascent(),
            page: self.page,
        };
        self.matches
            .extend(locate_matches(&self.pattern, &units, &positions, line));
        Ok(())
    }

    fn context_depth(&self) -> usize {
        self.contexts.depth()
    }
}

/// Decode each code for matching: Identity-H codes are UTF-16 units,
/// single-byte codes are Windows-1252.
fn shown_units(font: &dyn PdfFont, codes: &[u32]) -> Vec<String> {
    codes
        .iter()
        .map(|code| {
            if font.encoding() == IDENTITY_H {
                let unit = u16::try_from(*code).unwrap_or(u16::MAX);
                char::decode_utf16([unit])
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            } else {
                let byte = u8::try_from(*code).unwrap_or(b'?');
                WINDOWS_1252
                    .decode_without_bom_handling(&[byte])
                    .0
                    .into_owned()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pdfsift_core::{GraphicsState, MarkedUpTextAssembler, Matrix, SearchOptions};

    use super::*;
    use crate::font::DocumentFont;

    fn helvetica_state(size: f64) -> GraphicsState {
        let mut gs = GraphicsState::default();
        gs.set_font(Arc::new(DocumentFont::helvetica()), size);
        gs
    }

    fn parsed(text: &str, x: f64, y: f64) -> ParsedText {
        ParsedText::new(
            text.as_bytes(),
            &helvetica_state(12.0),
            &Matrix::identity_like(x, y),
        )
        .unwrap()
    }

    fn extractor() -> TextExtractor<MarkedUpTextAssembler> {
        TextExtractor::new(MarkedUpTextAssembler::new(false), 256)
    }

    #[test]
    fn stack_keeps_names_and_buffers_paired() {
        let mut stack = MarkedContentStack::new(8);
        stack.add(FinalText::new("top").into());
        stack.push(Some("p".to_string())).unwrap();
        stack.add(FinalText::new("inner").into());
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current(), Some(Some("p")));

        let (name, fragments) = stack.pop().unwrap();
        assert_eq!(name.as_deref(), Some("p"));
        assert_eq!(fragments.len(), 1);
        assert_eq!(stack.fragments()[0].text(), "top");
        assert_eq!(stack.current(), None);
    }

    #[test]
    fn stack_pop_without_push_fails() {
        let mut stack = MarkedContentStack::new(8);
        assert_eq!(
            stack.pop().unwrap_err(),
            ContentStreamError::UnbalancedContext { open: 0 }
        );
    }

    #[test]
    fn stack_depth_limit() {
        let mut stack = MarkedContentStack::new(2);
        stack.push(None).unwrap();
        stack.push(None).unwrap();
        assert_eq!(
            stack.push(None).unwrap_err(),
            ContentStreamError::NestingTooDeep { limit: 2 }
        );
    }

    #[test]
    fn extractor_assembles_named_context() {
        let mut handler = extractor();
        handler.push_context(Some("p".to_string())).unwrap();
        handler.display_text(&parsed("Hello", 72.0, 700.0)).unwrap();
        handler.display_text(&parsed("World", 120.0, 700.0)).unwrap();
        handler.pop_context().unwrap();
        assert_eq!(handler.resultant_text().unwrap(), "Hello World");
    }

    #[test]
    fn text_outside_contexts_is_dropped() {
        let mut handler = extractor();
        handler.display_text(&parsed("Loose", 72.0, 700.0)).unwrap();
        assert_eq!(handler.resultant_text().unwrap(), "");
    }

    #[test]
    fn suppressed_context_drops_text() {
        let mut handler = extractor();
        handler.push_context(Some("div".to_string())).unwrap();
        handler.push_context(None).unwrap();
        handler.display_text(&parsed("Header", 72.0, 750.0)).unwrap();
        handler.pop_context().unwrap();
        handler.display_text(&parsed("Body", 72.0, 700.0)).unwrap();
        handler.pop_context().unwrap();
        assert_eq!(handler.resultant_text().unwrap(), "Body");
    }

    #[test]
    fn empty_context_leaves_no_fragment() {
        let mut handler = extractor();
        handler.push_context(Some("div".to_string())).unwrap();
        handler.push_context(Some("span".to_string())).unwrap();
        handler.pop_context().unwrap();
        assert!(handler.contexts.fragments().is_empty());
        handler.pop_context().unwrap();
        assert!(handler.contexts.fragments().is_empty());
    }

    #[test]
    fn nested_result_lands_in_parent() {
        let mut handler = TextExtractor::new(MarkedUpTextAssembler::new(true), 256);
        handler.push_context(Some("div".to_string())).unwrap();
        handler.push_context(Some("p".to_string())).unwrap();
        handler.display_text(&parsed("Hi", 72.0, 700.0)).unwrap();
        handler.pop_context().unwrap();
        assert_eq!(handler.contexts.fragments().len(), 1);
        handler.pop_context().unwrap();
        let text = handler.resultant_text().unwrap();
        assert!(text.starts_with("<div><p><span class='t-word' id='word1'"), "{text}");
        assert!(text.ends_with("</p></div>"), "{text}");
    }

    #[test]
    fn final_text_kept_verbatim() {
        let mut handler = extractor();
        handler.push_context(Some("figure".to_string())).unwrap();
        handler.add_final_text(FinalText::new("alt text"));
        handler.pop_context().unwrap();
        assert_eq!(handler.resultant_text().unwrap(), "alt text");
    }

    #[test]
    fn resultant_text_requires_balance() {
        let mut handler = extractor();
        handler.push_context(Some("p".to_string())).unwrap();
        assert_eq!(
            handler.resultant_text().unwrap_err(),
            ContentStreamError::UnbalancedContext { open: 1 }
        );
        assert_eq!(handler.context_depth(), 1);
    }

    #[test]
    fn locator_boxes_match() {
        let pattern = SearchPattern::new("Hello", &SearchOptions::default()).unwrap();
        let mut locator = TextLocator::new(pattern, 1, 256);
        locator.display_text(&parsed("Hello", 72.0, 100.0)).unwrap();
        let matches = locator.into_matches();
        assert_eq!(matches.len(), 1);
        let bbox = matches[0].bbox;
        assert!((bbox.lly - (100.0 - 2.484)).abs() < 1e-9);
        assert!((bbox.ury - (100.0 + 8.616)).abs() < 1e-9);
        assert_eq!(bbox.llx, 72.0);
        // H e l l o = 722 556 222 222 556 at 12pt
        assert!((bbox.urx - (72.0 + 2.278 * 12.0)).abs() < 1e-9);
        assert_eq!(matches[0].page, 1);
    }

    #[test]
    fn locator_box_follows_scaled_text_matrix() {
        // 1pt font scaled 12x by Tm: same glyph box as a 12pt font.
        let pattern = SearchPattern::new("A", &SearchOptions::default()).unwrap();
        let mut locator = TextLocator::new(pattern, 1, 256);
        let text = ParsedText::new(
            b"A",
            &helvetica_state(1.0),
            &Matrix::new(12.0, 0.0, 0.0, 12.0, 72.0, 700.0),
        )
        .unwrap();
        locator.display_text(&text).unwrap();
        let bbox = locator.matches()[0].bbox;
        assert!((bbox.lly - (700.0 - 2.484)).abs() < 1e-9, "{bbox:?}");
        assert!((bbox.ury - (700.0 + 8.616)).abs() < 1e-9, "{bbox:?}");
        assert!((bbox.urx - (72.0 + 0.667 * 12.0)).abs() < 1e-9, "{bbox:?}");
    }

    #[test]
    fn locator_finds_repeated_matches_left_to_right() {
        let pattern = SearchPattern::new("ab", &SearchOptions::default()).unwrap();
        let mut locator = TextLocator::new(pattern, 2, 256);
        locator.display_text(&parsed("ababab", 0.0, 0.0)).unwrap();
        let xs: Vec<f64> = locator.matches().iter().map(|m| m.bbox.llx).collect();
        assert_eq!(xs.len(), 3);
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
    }

    #[test]
    fn locator_tracks_contexts_for_balance_only() {
        let pattern = SearchPattern::new("x", &SearchOptions::default()).unwrap();
        let mut locator = TextLocator::new(pattern, 1, 256);
        locator.push_context(None).unwrap();
        locator.display_text(&parsed("x", 0.0, 0.0)).unwrap();
        locator.pop_context().unwrap();
        assert_eq!(locator.matches().len(), 1);
        assert!(locator.pop_context().is_err());
    }

    #[test]
    fn identity_h_units_are_utf16() {
        #[derive(Debug)]
        struct Cid;
        impl PdfFont for Cid {
            fn name(&self) -> &str {
                "Cid"
            }
            fn encoding(&self) -> &str {
                IDENTITY_H
            }
            fn decode_code(&self, _code: u32) -> String {
                "?".to_string()
            }
            fn width(&self, _code: u32) -> f64 {
                1000.0
            }
            fn ascent(&self) -> f64 {
                880.0
            }
            fn descent(&self) -> f64 {
                -120.0
            }
        }
        assert_eq!(shown_units(&Cid, &[0x4E2D, 0x41]), vec!["\u{4E2D}", "A"]);

        #[derive(Debug)]
        struct OtherCMap;
        impl PdfFont for OtherCMap {
            fn name(&self) -> &str {
                "Ucs2"
            }
            fn encoding(&self) -> &str {
                "UniGB-UCS2-H"
            }
            fn is_two_byte(&self) -> bool {
                true
            }
            fn decode_code(&self, _code: u32) -> String {
                "\u{4E2D}".to_string()
            }
            fn width(&self, _code: u32) -> f64 {
                1000.0
            }
            fn ascent(&self) -> f64 {
                880.0
            }
            fn descent(&self) -> f64 {
                -120.0
            }
        }
        // Only Identity-H gets the UTF-16 reading; other codes are bytes.
        assert_eq!(shown_units(&OtherCMap, &[0x4E2D, 0x41]), vec!["?", "A"]);
        assert_eq!(
            shown_units(&DocumentFont::helvetica(), &[0x93, 0x41]),
            vec!["\u{201C}", "A"]
        );
    }
}
