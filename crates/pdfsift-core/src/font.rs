//! Font abstraction consumed by the interpreter.
//!
//! The interpreter never looks inside font dictionaries. It needs only to
//! split a shown string into character codes, decode those codes to Unicode,
//! and query glyph widths and vertical metrics.

use std::fmt::Debug;

/// Name of the two-byte identity CMap used by most CID-keyed fonts.
pub const IDENTITY_H: &str = "Identity-H";

/// Metrics and decoding for one font resource.
///
/// Widths, ascent and descent are in glyph space (1/1000 of text space).
pub trait PdfFont: Debug + Send + Sync {
    /// PostScript name of the font (`/BaseFont`), or the resource name.
    fn name(&self) -> &str;

    /// Encoding name, e.g. `WinAnsiEncoding` or `Identity-H`.
    fn encoding(&self) -> &str;

    /// Whether shown strings use two bytes per character code.
    fn is_two_byte(&self) -> bool {
        self.encoding() == IDENTITY_H
    }

    /// Unicode text for a single character code.
    fn decode_code(&self, code: u32) -> String;

    /// Glyph width for a character code.
    fn width(&self, code: u32) -> f64;

    /// Ascent above the baseline (positive).
    fn ascent(&self) -> f64;

    /// Descent below the baseline (negative).
    fn descent(&self) -> f64;

    /// Split raw string bytes into character codes.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.is_two_byte() {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    /// Decode raw string bytes to Unicode.
    fn decode(&self, bytes: &[u8]) -> String {
        self.codes(bytes)
            .into_iter()
            .map(|code| self.decode_code(code))
            .collect()
    }

    /// Code measured as the word space: 32, or the no-break space when the
    /// font has no width for 32.
    fn space_code(&self) -> u32 {
        if self.width(32) == 0.0 { 0xA0 } else { 32 }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Latin-1 font with a fixed advance for every glyph.
    #[derive(Debug, Clone)]
    pub struct FixedFont {
        pub encoding: String,
        pub width: f64,
        pub ascent: f64,
        pub descent: f64,
    }

    impl FixedFont {
        pub fn helvetica_like(width: f64) -> Self {
            Self {
                encoding: "WinAnsiEncoding".to_string(),
                width,
                ascent: 718.0,
                descent: -207.0,
            }
        }
    }

    impl PdfFont for FixedFont {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn encoding(&self) -> &str {
            &self.encoding
        }

        fn decode_code(&self, code: u32) -> String {
            char::from_u32(code).map(String::from).unwrap_or_default()
        }

        fn width(&self, _code: u32) -> f64 {
            self.width
        }

        fn ascent(&self) -> f64 {
            self.ascent
        }

        fn descent(&self) -> f64 {
            self.descent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FixedFont;
    use super::*;

    #[test]
    fn single_byte_codes() {
        let font = FixedFont::helvetica_like(500.0);
        assert_eq!(font.codes(b"AB"), vec![0x41, 0x42]);
        assert_eq!(font.decode(b"AB"), "AB");
    }

    #[test]
    fn identity_h_pairs_bytes() {
        let font = FixedFont {
            encoding: IDENTITY_H.to_string(),
            ..FixedFont::helvetica_like(1000.0)
        };
        assert!(font.is_two_byte());
        assert_eq!(font.codes(&[0x00, 0x41, 0x4E, 0x2D]), vec![0x41, 0x4E2D]);
        assert_eq!(font.decode(&[0x00, 0x41, 0x4E, 0x2D]), "A\u{4E2D}");
    }

    #[test]
    fn identity_h_odd_trailing_byte() {
        let font = FixedFont {
            encoding: IDENTITY_H.to_string(),
            ..FixedFont::helvetica_like(1000.0)
        };
        assert_eq!(font.codes(&[0x00, 0x41, 0x42]), vec![0x41, 0x42]);
    }

    #[test]
    fn space_code_prefers_32() {
        let font = FixedFont::helvetica_like(278.0);
        assert_eq!(font.space_code(), 32);
    }

    #[test]
    fn space_code_falls_back_to_no_break_space() {
        let font = FixedFont::helvetica_like(0.0);
        assert_eq!(font.space_code(), 0xA0);
    }
}
