//! Folding text fragments into per-context output.

use crate::text::{FinalText, ParsedText, Word};

/// Receives the fragments of one marked-content context at a time and
/// produces that context's text.
///
/// Context names are `None` for suppressed regions (artifacts); an
/// assembler should produce nothing for them.
pub trait TextAssembler {
    /// Forget everything accumulated so far.
    fn reset(&mut self);

    /// Page number (1-based) for subsequently produced output.
    fn set_page(&mut self, page: u32);

    /// Fold an unassembled text run into the running buffer.
    fn process_parsed(&mut self, text: &ParsedText, context: Option<&str>);

    /// Slot completed text (usually from a nested context) into place.
    fn process_final(&mut self, text: &FinalText, context: Option<&str>);

    /// Place one word relative to the previous one.
    fn render_word(&mut self, word: Word);

    /// Append already-final text to the output.
    fn render_final(&mut self, text: FinalText);

    /// Finish the context and return its text.
    fn end_parsing_context(&mut self, context: Option<&str>) -> Option<FinalText>;

    /// Next unique word id.
    fn word_id(&mut self) -> String;
}

/// Assembler that reconstructs lines and words from geometry and can wrap
/// each context in an HTML-like tag.
#[derive(Debug, Default)]
pub struct MarkedUpTextAssembler {
    in_progress: Option<Word>,
    page: u32,
    next_word_id: usize,
    use_markup: bool,
    result: Vec<FinalText>,
    partial_words: Vec<Word>,
}

impl MarkedUpTextAssembler {
    pub fn new(use_markup: bool) -> Self {
        Self {
            next_word_id: 1,
            use_markup,
            ..Self::default()
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn uses_markup(&self) -> bool {
        self.use_markup
    }

    fn finish_word(&mut self, word: &Word) {
        let use_markup = self.use_markup;
        let text = word.final_text(self, use_markup);
        self.result.push(text);
    }

    fn clear_accumulator(&mut self) {
        for word in std::mem::take(&mut self.partial_words) {
            self.render_word(word);
        }
        if let Some(word) = self.in_progress.take() {
            self.finish_word(&word);
        }
    }

    fn concatenate_result(&mut self, context: Option<&str>) -> Option<FinalText> {
        let items = std::mem::take(&mut self.result);
        let name = context?;
        let tagged = self.use_markup && !name.is_empty();

        let mut out = String::new();
        if tagged {
            out.push('<');
            out.push_str(name);
            out.push('>');
        }
        for item in &items {
            out.push_str(item.text());
        }
        if tagged {
            let element = name.split(' ').next().unwrap_or(name);
            out.push_str("</");
            out.push_str(element);
            out.push('>');
        }
        Some(FinalText::new(out))
    }
}

impl TextAssembler for MarkedUpTextAssembler {
    fn reset(&mut self) {
        self.result.clear();
        self.partial_words.clear();
        self.in_progress = None;
    }

    fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    fn process_parsed(&mut self, text: &ParsedText, _context: Option<&str>) {
        self.partial_words.extend(text.as_partial_words());
    }

    fn process_final(&mut self, text: &FinalText, _context: Option<&str>) {
        self.clear_accumulator();
        self.result.push(text.clone());
    }

    fn render_word(&mut self, word: Word) {
        let Some(previous) = self.in_progress.take() else {
            self.in_progress = Some(word);
            return;
        };

        let last_start = previous.start;
        let direction = previous.baseline.subtract(&last_start);
        // Squared distance of the new start from the previous baseline.
        let dist = direction
            .cross_product(&last_start.subtract(&word.start))
            .length_squared()
            / direction.length_squared();
        let hard_return = dist.is_nan() || dist > word.ascent * 0.5;
        let spacing = previous.end.subtract(&word.start).length();

        if hard_return || word.break_before {
            self.finish_word(&previous);
            if hard_return {
                self.result.push(FinalText::new("\n"));
                if self.use_markup {
                    self.result.push(FinalText::new("<br class='t-pdf' />"));
                }
            }
            self.in_progress = Some(word);
        } else if spacing < word.single_space_width / 2.3 || previous.should_not_split {
            self.in_progress = Some(Word {
                text: format!("{}{}", previous.text, word.text.trim()),
                ascent: word.ascent,
                descent: word.descent,
                start: last_start,
                end: word.end,
                baseline: previous.baseline,
                single_space_width: word.single_space_width,
                should_not_split: previous.should_not_split,
                break_before: previous.break_before,
            });
        } else {
            self.finish_word(&previous);
            self.in_progress = Some(word);
        }
    }

    fn render_final(&mut self, text: FinalText) {
        self.result.push(text);
    }

    fn end_parsing_context(&mut self, context: Option<&str>) -> Option<FinalText> {
        self.clear_accumulator();
        self.concatenate_result(context)
    }

    fn word_id(&mut self) -> String {
        let id = format!("word{}", self.next_word_id);
        self.next_word_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::test_support::FixedFont;
    use crate::geometry::{Matrix, Vector};
    use crate::state::GraphicsState;
    use std::sync::Arc;

    fn parsed(text: &[u8], x: f64, y: f64) -> ParsedText {
        let mut gs = GraphicsState::default();
        gs.set_font(Arc::new(FixedFont::helvetica_like(500.0)), 10.0);
        ParsedText::new(text, &gs, &Matrix::identity_like(x, y)).unwrap()
    }

    fn word(text: &str, x0: f64, x1: f64, y: f64) -> Word {
        Word {
            text: text.to_string(),
            ascent: 7.18,
            descent: -2.07,
            start: Vector::point(x0, y),
            end: Vector::point(x1, y),
            baseline: Vector::point(x0 + 1.0, y),
            single_space_width: 5.0,
            should_not_split: false,
            break_before: false,
        }
    }

    fn assemble(assembler: &mut MarkedUpTextAssembler, runs: &[ParsedText], ctx: &str) -> String {
        assembler.reset();
        for run in runs {
            assembler.process_parsed(run, Some(ctx));
        }
        assembler
            .end_parsing_context(Some(ctx))
            .map(|t| t.text().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn adjacent_runs_merge_into_one_word() {
        let mut assembler = MarkedUpTextAssembler::new(false);
        let out = assemble(&mut assembler, &[parsed(b"Hel", 0.0, 700.0), parsed(b"lo", 15.0, 700.0)], "p");
        assert_eq!(out, "Hello ");
    }

    #[test]
    fn gap_on_same_line_separates_words() {
        let mut assembler = MarkedUpTextAssembler::new(false);
        let out = assemble(&mut assembler, &[parsed(b"ab", 0.0, 700.0), parsed(b"cd", 40.0, 700.0)], "p");
        assert_eq!(out, "ab cd ");
    }

    #[test]
    fn new_line_inserts_hard_return() {
        let mut assembler = MarkedUpTextAssembler::new(false);
        let out = assemble(&mut assembler, &[parsed(b"ab", 0.0, 700.0), parsed(b"cd", 0.0, 680.0)], "p");
        assert_eq!(out, "ab \ncd ");
    }

    #[test]
    fn spaces_inside_a_run_break_words() {
        let mut assembler = MarkedUpTextAssembler::new(false);
        let out = assemble(&mut assembler, &[parsed(b"one two", 0.0, 700.0)], "p");
        assert_eq!(out, "one two ");
    }

    #[test]
    fn markup_wraps_context_and_words() {
        let mut assembler = MarkedUpTextAssembler::new(true);
        assembler.reset();
        assembler.render_word(word("hi", 0.0, 10.0, 0.0));
        let out = assembler.end_parsing_context(Some("p")).unwrap();
        assert_eq!(
            out.text(),
            "<p><span class='t-word' id='word1' bbox='0.00 -2.07 10.00 7.18'>hi</span> </p>"
        );
    }

    #[test]
    fn markup_hard_return_adds_break_element() {
        let mut assembler = MarkedUpTextAssembler::new(true);
        assembler.render_word(word("a", 0.0, 5.0, 100.0));
        assembler.render_word(word("b", 0.0, 5.0, 80.0));
        let out = assembler.end_parsing_context(Some("")).unwrap();
        assert!(out.text().contains("\n<br class='t-pdf' />"));
        assert!(!out.text().starts_with("<>"));
    }

    #[test]
    fn closing_tag_drops_attributes() {
        let mut assembler = MarkedUpTextAssembler::new(true);
        assembler.render_final(FinalText::new("x"));
        let out = assembler
            .end_parsing_context(Some("div class='t-extracted-page'"))
            .unwrap();
        assert_eq!(out.text(), "<div class='t-extracted-page'>x</div>");
    }

    #[test]
    fn suppressed_context_yields_nothing() {
        let mut assembler = MarkedUpTextAssembler::new(false);
        assembler.render_word(word("gone", 0.0, 20.0, 0.0));
        assert!(assembler.end_parsing_context(None).is_none());
        // Nothing leaks into the next context.
        assert_eq!(assembler.end_parsing_context(Some("p")).unwrap().text(), "");
    }

    #[test]
    fn final_text_flushes_pending_words_first() {
        let mut assembler = MarkedUpTextAssembler::new(false);
        assembler.process_parsed(&parsed(b"before", 0.0, 700.0), Some("p"));
        assembler.process_final(&FinalText::new("[nested]"), Some("p"));
        let out = assembler.end_parsing_context(Some("p")).unwrap();
        assert_eq!(out.text(), "before [nested]");
    }

    #[test]
    fn word_ids_increment() {
        let mut assembler = MarkedUpTextAssembler::new(true);
        assert_eq!(assembler.word_id(), "word1");
        assert_eq!(assembler.word_id(), "word2");
    }

    #[test]
    fn page_is_recorded() {
        let mut assembler = MarkedUpTextAssembler::new(false);
        assembler.set_page(4);
        assert_eq!(assembler.page(), 4);
        assert!(!assembler.uses_markup());
    }
}
