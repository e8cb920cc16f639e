//! Graphics and text state tracked while interpreting a content stream.

use std::fmt;
use std::sync::Arc;

use crate::font::PdfFont;
use crate::geometry::Matrix;

/// Text rendering mode set by the `Tr` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillClip,
    StrokeClip,
    FillStrokeClip,
    Clip,
}

impl TextRenderMode {
    /// Map a `Tr` operand to a mode. Values outside 0..=7 are rejected.
    pub fn from_i64(value: i64) -> Option<Self> {
        Some(match value {
            0 => Self::Fill,
            1 => Self::Stroke,
            2 => Self::FillStroke,
            3 => Self::Invisible,
            4 => Self::FillClip,
            5 => Self::StrokeClip,
            6 => Self::FillStrokeClip,
            7 => Self::Clip,
            _ => return None,
        })
    }
}

/// One entry of the graphics state stack.
///
/// Cloning gives an independent snapshot; the font itself is shared
/// read-only through an `Arc`.
#[derive(Clone)]
pub struct GraphicsState {
    /// Current transformation matrix.
    pub ctm: Matrix,
    font: Option<Arc<dyn PdfFont>>,
    font_size: f64,
    /// Character spacing (`Tc`), unscaled text space units.
    pub char_spacing: f64,
    /// Word spacing (`Tw`), unscaled text space units.
    pub word_spacing: f64,
    /// Horizontal scaling as a fraction (`Tz 100` is `1.0`).
    pub horizontal_scaling: f64,
    /// Leading (`TL`).
    pub leading: f64,
    /// Text rise (`Ts`).
    pub rise: f64,
    pub render_mode: TextRenderMode,
    ascent_descriptor: f64,
    descent_descriptor: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: TextRenderMode::Fill,
            ascent_descriptor: 0.0,
            descent_descriptor: 0.0,
        }
    }
}

impl fmt::Debug for GraphicsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsState")
            .field("ctm", &self.ctm)
            .field("font", &self.font.as_ref().map(|font| font.name().to_string()))
            .field("font_size", &self.font_size)
            .field("char_spacing", &self.char_spacing)
            .field("word_spacing", &self.word_spacing)
            .field("horizontal_scaling", &self.horizontal_scaling)
            .field("leading", &self.leading)
            .field("rise", &self.rise)
            .finish_non_exhaustive()
    }
}

impl GraphicsState {
    pub fn font(&self) -> Option<&Arc<dyn PdfFont>> {
        self.font.as_ref()
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    /// Select a font and size, refreshing the cached vertical metrics.
    pub fn set_font(&mut self, font: Arc<dyn PdfFont>, size: f64) {
        self.font = Some(font);
        self.set_font_size(size);
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.font_size = size;
        match &self.font {
            Some(font) => {
                self.ascent_descriptor = font.ascent() / 1000.0 * size;
                self.descent_descriptor = font.descent() / 1000.0 * size;
            }
            None => {
                self.ascent_descriptor = 0.0;
                self.descent_descriptor = 0.0;
            }
        }
    }

    /// Font ascent scaled to the font size, in text space.
    pub fn font_ascent_descriptor(&self) -> f64 {
        self.ascent_descriptor
    }

    /// Font descent scaled to the font size, in text space (negative).
    pub fn font_descent_descriptor(&self) -> f64 {
        self.descent_descriptor
    }

    /// Advance for a glyph of width `w` (already divided by 1000) that
    /// carries word spacing.
    pub fn character_width_with_space(&self, w: f64) -> f64 {
        (w * self.font_size + self.char_spacing + self.word_spacing) * self.horizontal_scaling
    }

    /// Advance for a glyph of width `w` (already divided by 1000).
    pub fn character_width_without_space(&self, w: f64) -> f64 {
        (w * self.font_size + self.char_spacing) * self.horizontal_scaling
    }

    /// Horizontal advance of one character code in text space.
    ///
    /// Word spacing applies only to the single-byte code 32.
    pub fn glyph_advance(&self, code: u32) -> f64 {
        let Some(font) = &self.font else {
            return 0.0;
        };
        let w = font.width(code) / 1000.0;
        if code == 32 && !font.is_two_byte() {
            self.character_width_with_space(w)
        } else {
            self.character_width_without_space(w)
        }
    }

    /// Total advance of a sequence of character codes in text space.
    pub fn string_width(&self, codes: &[u32]) -> f64 {
        codes.iter().map(|code| self.glyph_advance(*code)).sum()
    }
}

/// The `q`/`Q` stack. Always holds at least the base state.
#[derive(Debug, Clone)]
pub struct GraphicsStateStack {
    states: Vec<GraphicsState>,
}

impl Default for GraphicsStateStack {
    fn default() -> Self {
        Self::new(GraphicsState::default())
    }
}

impl GraphicsStateStack {
    pub fn new(base: GraphicsState) -> Self {
        Self { states: vec![base] }
    }

    /// Duplicate the current state (`q`).
    pub fn push(&mut self) {
        let top = self.current().clone();
        self.states.push(top);
    }

    /// Discard the current state (`Q`).
    ///
    /// Returns `None`, leaving the stack untouched, when only the base
    /// state remains.
    pub fn pop(&mut self) -> Option<GraphicsState> {
        if self.states.len() <= 1 {
            return None;
        }
        self.states.pop()
    }

    pub fn current(&self) -> &GraphicsState {
        // The constructor seeds one state and `pop` never removes it.
        &self.states[self.states.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut GraphicsState {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    pub fn depth(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::test_support::FixedFont;

    fn assert_approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    fn state_with_font(width: f64, size: f64) -> GraphicsState {
        let mut gs = GraphicsState::default();
        gs.set_font(Arc::new(FixedFont::helvetica_like(width)), size);
        gs
    }

    #[test]
    fn default_state() {
        let gs = GraphicsState::default();
        assert!(gs.font().is_none());
        assert_eq!(gs.horizontal_scaling, 1.0);
        assert_eq!(gs.ctm, Matrix::identity());
        assert_eq!(gs.render_mode, TextRenderMode::Fill);
    }

    #[test]
    fn descriptors_cached_on_font_change() {
        let gs = state_with_font(500.0, 12.0);
        assert_approx(gs.font_ascent_descriptor(), 8.616);
        assert_approx(gs.font_descent_descriptor(), -2.484);
    }

    #[test]
    fn descriptors_follow_size_change() {
        let mut gs = state_with_font(500.0, 12.0);
        gs.set_font_size(10.0);
        assert_approx(gs.font_ascent_descriptor(), 7.18);
    }

    #[test]
    fn glyph_advance_includes_spacing_and_scaling() {
        let mut gs = state_with_font(500.0, 10.0);
        gs.char_spacing = 1.0;
        gs.word_spacing = 2.0;
        gs.horizontal_scaling = 0.5;
        assert_approx(gs.glyph_advance(u32::from(b'A')), (5.0 + 1.0) * 0.5);
        assert_approx(gs.glyph_advance(32), (5.0 + 1.0 + 2.0) * 0.5);
    }

    #[test]
    fn string_width_sums_advances() {
        let gs = state_with_font(600.0, 10.0);
        assert_approx(gs.string_width(&[65, 66, 67]), 18.0);
    }

    #[test]
    fn no_font_has_zero_advance() {
        assert_eq!(GraphicsState::default().glyph_advance(65), 0.0);
    }

    #[test]
    fn render_mode_from_operand() {
        assert_eq!(TextRenderMode::from_i64(3), Some(TextRenderMode::Invisible));
        assert_eq!(TextRenderMode::from_i64(8), None);
    }

    #[test]
    fn push_copies_top_state() {
        let mut stack = GraphicsStateStack::default();
        stack.current_mut().char_spacing = 2.0;
        stack.push();
        stack.current_mut().char_spacing = 5.0;
        assert_eq!(stack.depth(), 2);
        let popped = stack.pop().unwrap();
        assert_eq!(popped.char_spacing, 5.0);
        assert_eq!(stack.current().char_spacing, 2.0);
    }

    #[test]
    fn pop_never_removes_base_state() {
        let mut stack = GraphicsStateStack::default();
        assert!(stack.pop().is_none());
        assert_eq!(stack.depth(), 1);
        stack.current_mut().leading = 14.0;
        assert_eq!(stack.current().leading, 14.0);
    }
}
