//! Text runs produced while interpreting a content stream.
//!
//! A [`ParsedText`] is the result of one string-show operator. The assembler
//! breaks it into [`Word`]s and folds those into [`FinalText`] values, one
//! per marked-content context. The interpreter buffers both kinds as
//! [`TextFragment`]s.

use std::sync::Arc;

use crate::assembler::TextAssembler;
use crate::font::PdfFont;
use crate::geometry::{BBox, Matrix, Vector};
use crate::state::GraphicsState;

/// Unicode space separator (what the word splitter treats as a break).
pub(crate) fn is_space_char(c: char) -> bool {
    matches!(
        c,
        ' ' | '\u{A0}' | '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

/// Whitespace that is not a no-break space.
fn is_breaking_whitespace(c: char) -> bool {
    c.is_whitespace() && !matches!(c, '\u{A0}' | '\u{2007}' | '\u{202F}')
}

/// Decoded result of one string-show operation with its geometry.
///
/// All points are in user space. `ascent` and `descent` are signed
/// distances from the baseline (descent is normally negative).
#[derive(Debug, Clone)]
pub struct ParsedText {
    codes: Vec<u32>,
    text: String,
    font: Arc<dyn PdfFont>,
    state: GraphicsState,
    text_to_user: Matrix,
    start: Vector,
    end: Vector,
    baseline: Vector,
    ascent: f64,
    descent: f64,
    space_width: f64,
}

impl ParsedText {
    /// Build a text run from the raw bytes of a shown string.
    ///
    /// `text_matrix` is the text matrix before the string is shown. Returns
    /// `None` when no font is selected.
    pub fn new(bytes: &[u8], state: &GraphicsState, text_matrix: &Matrix) -> Option<Self> {
        let font = Arc::clone(state.font()?);
        let codes = font.codes(bytes);
        let text = font.decode(bytes);
        let text_to_user = text_matrix.multiply(&state.ctm);

        let width = state.string_width(&codes);
        let unscaled_space = state.string_width(&[font.space_code()]);

        Some(Self {
            start: point_to_user(0.0, 0.0, &text_to_user),
            end: point_to_user(width, 0.0, &text_to_user),
            baseline: point_to_user(1.0, 0.0, &text_to_user),
            ascent: height_to_user(state.font_ascent_descriptor(), &text_to_user),
            descent: height_to_user(state.font_descent_descriptor(), &text_to_user),
            space_width: width_to_user(unscaled_space, &text_to_user),
            codes,
            text,
            font,
            state: state.clone(),
            text_to_user,
        })
    }

    /// Decoded Unicode text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character codes as they appeared in the content stream.
    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn font(&self) -> &Arc<dyn PdfFont> {
        &self.font
    }

    /// Graphics state snapshot at show time.
    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// `Tm × CTM` at show time.
    pub fn text_to_user(&self) -> &Matrix {
        &self.text_to_user
    }

    pub fn start(&self) -> Vector {
        self.start
    }

    pub fn end(&self) -> Vector {
        self.end
    }

    /// A point one text-space unit along the baseline from the start.
    pub fn baseline(&self) -> Vector {
        self.baseline
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }

    pub fn single_space_width(&self) -> f64 {
        self.space_width
    }

    /// Width of this run in text space under `state`.
    pub fn unscaled_text_width(&self, state: &GraphicsState) -> f64 {
        state.string_width(&self.codes)
    }

    /// Split into words at space characters.
    ///
    /// Every space starts a new word, and that word keeps the space in its
    /// text so the assembler never glues it onto the previous word.
    pub fn as_partial_words(&self) -> Vec<Word> {
        let decoded: Vec<String> = self
            .codes
            .iter()
            .map(|code| self.font.decode_code(*code))
            .collect();
        let has_space: Vec<bool> = decoded.iter().map(|s| s.chars().any(is_space_char)).collect();
        let words_are_complete = has_space.iter().any(|s| *s);

        let mut words = Vec::new();
        let mut accum = String::new();
        let mut total_width = 0.0;
        let mut word_start = 0.0;
        let mut break_before = false;

        for (i, code) in self.codes.iter().enumerate() {
            let w = self.font.width(*code) / 1000.0;
            let text = &decoded[i];
            if has_space[i] {
                if !accum.is_empty() {
                    words.push(self.word(
                        std::mem::take(&mut accum),
                        word_start,
                        total_width,
                        words_are_complete,
                        break_before,
                    ));
                }
                let whitespace = text.chars().all(is_breaking_whitespace);
                if !whitespace {
                    word_start = total_width;
                }
                total_width += self.state.character_width_with_space(w);
                if whitespace {
                    word_start = total_width;
                }
                accum.push_str(text);
                break_before = true;
            } else {
                accum.push_str(text);
                total_width += self.state.character_width_without_space(w);
            }
        }
        if !accum.is_empty() {
            words.push(self.word(accum, word_start, total_width, words_are_complete, break_before));
        }
        words
    }

    fn word(
        &self,
        text: String,
        start_offset: f64,
        end_offset: f64,
        should_not_split: bool,
        break_before: bool,
    ) -> Word {
        Word {
            text,
            ascent: self.ascent,
            descent: self.descent,
            start: point_to_user(start_offset, 0.0, &self.text_to_user),
            end: point_to_user(end_offset, 0.0, &self.text_to_user),
            baseline: self.baseline,
            single_space_width: self.space_width,
            should_not_split,
            break_before,
        }
    }
}

fn point_to_user(x: f64, y: f64, text_to_user: &Matrix) -> Vector {
    Vector::point(x, y).cross(text_to_user)
}

fn width_to_user(width: f64, text_to_user: &Matrix) -> f64 {
    let start = point_to_user(0.0, 0.0, text_to_user);
    point_to_user(width, 0.0, text_to_user).subtract(&start).length()
}

fn height_to_user(height: f64, text_to_user: &Matrix) -> f64 {
    let start = point_to_user(0.0, 0.0, text_to_user);
    let distance = point_to_user(0.0, height, text_to_user).subtract(&start).length();
    distance.copysign(height)
}

/// A word, or a piece of one, positioned in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub ascent: f64,
    pub descent: f64,
    pub start: Vector,
    pub end: Vector,
    pub baseline: Vector,
    pub single_space_width: f64,
    /// Set when the source run contained spaces, so its pieces are already
    /// delimited.
    pub should_not_split: bool,
    /// Set when a space preceded this piece.
    pub break_before: bool,
}

impl Word {
    /// Box from the start/end points and the font's vertical metrics.
    pub fn bbox(&self) -> BBox {
        BBox::new(
            self.start.x.min(self.end.x),
            self.start.y + self.descent,
            self.start.x.max(self.end.x),
            self.start.y + self.ascent,
        )
    }

    /// Render this word for the assembler's output.
    ///
    /// Plain output is the trimmed text followed by one space; markup wraps
    /// it in a span carrying its id and box.
    pub fn final_text(&self, assembler: &mut dyn TextAssembler, use_markup: bool) -> FinalText {
        let text = self.text.trim();
        if use_markup {
            let bbox = self.bbox();
            FinalText::new(format!(
                "<span class='t-word' id='{}' bbox='{:.2} {:.2} {:.2} {:.2}'>{}</span> ",
                assembler.word_id(),
                bbox.llx,
                bbox.lly,
                bbox.urx,
                bbox.ury,
                escape_html(text)
            ))
        } else {
            FinalText::new(format!("{text} "))
        }
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A finished piece of text, typically the output of one marked-content
/// context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinalText {
    text: String,
}

impl FinalText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// An item buffered in a marked-content context.
#[derive(Debug, Clone)]
pub enum TextFragment {
    Parsed(ParsedText),
    Final(FinalText),
}

impl TextFragment {
    pub fn text(&self) -> &str {
        match self {
            TextFragment::Parsed(parsed) => parsed.text(),
            TextFragment::Final(text) => text.text(),
        }
    }

    /// Fold this fragment into `assembler` for the given context.
    pub fn accumulate(&self, assembler: &mut dyn TextAssembler, context: Option<&str>) {
        match self {
            TextFragment::Parsed(parsed) => assembler.process_parsed(parsed, context),
            TextFragment::Final(text) => assembler.process_final(text, context),
        }
    }
}

impl From<ParsedText> for TextFragment {
    fn from(parsed: ParsedText) -> Self {
        TextFragment::Parsed(parsed)
    }
}

impl From<FinalText> for TextFragment {
    fn from(text: FinalText) -> Self {
        TextFragment::Final(text)
    }
}
