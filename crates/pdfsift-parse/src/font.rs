//! Fonts loaded from page resources.
//!
//! [`DocumentFont`] implements [`PdfFont`] for simple fonts (Type1,
//! TrueType, Type3) and for Type0 composite fonts. Decoding prefers the
//! font's `/ToUnicode` CMap; simple fonts then fall back to `/Differences`
//! glyph names and the base encoding, composite fonts to treating each
//! two-byte code as a UTF-16 unit.

use std::collections::HashMap;

use encoding_rs::{Encoding, MACINTOSH, WINDOWS_1252};
use lopdf::{Dictionary, Document, Object};
use pdfsift_core::{IDENTITY_H, PdfFont};
use tracing::{debug, warn};

use crate::cmap::ToUnicodeCMap;
use crate::error::BackendError;
use crate::lopdf_backend::{number, resolve};
use crate::standard_fonts::{self, StandardFont};

/// Width of a CID with no `/W` entry when `/DW` is absent.
const DEFAULT_CID_WIDTH: f64 = 1000.0;

const STANDARD_ENCODING: &str = "StandardEncoding";

#[derive(Debug, Clone)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f64>,
        missing: f64,
        /// Built-in widths for a standard font without `/Widths`.
        standard: Option<&'static StandardFont>,
    },
    Cid {
        widths: HashMap<u32, f64>,
        default: f64,
    },
}

impl Widths {
    fn get(&self, code: u32) -> f64 {
        match self {
            Widths::Simple {
                first_char,
                widths,
                missing,
                standard,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .or_else(|| standard.map(|font| font.width(code)))
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
        }
    }
}

/// A font resource with everything the interpreter asks of it.
#[derive(Debug, Clone)]
pub struct DocumentFont {
    name: String,
    encoding: String,
    composite: bool,
    /// Unicode for each single-byte code; empty for composite fonts.
    code_table: Vec<String>,
    to_unicode: Option<ToUnicodeCMap>,
    widths: Widths,
    ascent: f64,
    descent: f64,
}

impl DocumentFont {
    /// Standard Helvetica with WinAnsi decoding, used when a font
    /// resource cannot be found.
    pub fn helvetica() -> Self {
        Self::standard("Helvetica", standard_fonts::helvetica())
    }

    fn standard(name: &str, metrics: &'static StandardFont) -> Self {
        Self {
            name: name.to_string(),
            encoding: STANDARD_ENCODING.to_string(),
            composite: false,
            code_table: code_table(WINDOWS_1252, &HashMap::new()),
            to_unicode: None,
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing: 0.0,
                standard: Some(metrics),
            },
            ascent: f64::from(metrics.ascent),
            descent: f64::from(metrics.descent),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }
}

impl PdfFont for DocumentFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn encoding(&self) -> &str {
        &self.encoding
    }

    fn is_two_byte(&self) -> bool {
        self.composite
    }

    fn decode_code(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|cmap| cmap.lookup(code)) {
            return text.to_string();
        }
        if self.composite {
            return char::from_u32(code)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string();
        }
        self.code_table
            .get(code as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn width(&self, code: u32) -> f64 {
        self.widths.get(code)
    }

    fn ascent(&self) -> f64 {
        self.ascent
    }

    fn descent(&self) -> f64 {
        self.descent
    }
}

/// Load the font behind a `/Font` resource entry.
///
/// # Errors
///
/// Returns [`BackendError::Font`] if the object is not a font dictionary.
pub fn load_font(
    doc: &Document,
    resource_name: &str,
    font_obj: &Object,
) -> Result<DocumentFont, BackendError> {
    let dict = resolve(doc, font_obj).as_dict().map_err(|_| {
        BackendError::Font(format!("font resource '{resource_name}' is not a dictionary"))
    })?;

    let base_font = name_entry(doc, dict, b"BaseFont").unwrap_or_else(|| resource_name.to_string());
    let to_unicode = load_to_unicode(doc, dict, &base_font);

    let font = if name_entry(doc, dict, b"Subtype").as_deref() == Some("Type0") {
        load_composite(doc, dict, base_font, to_unicode)
    } else {
        load_simple(doc, dict, base_font, to_unicode)
    };
    debug!(
        font = %font.name,
        encoding = %font.encoding,
        composite = font.composite,
        "loaded font"
    );
    Ok(font)
}

fn load_simple(
    doc: &Document,
    dict: &Dictionary,
    base_font: String,
    to_unicode: Option<ToUnicodeCMap>,
) -> DocumentFont {
    let standard = standard_fonts::lookup(&base_font);

    let (encoding_name, differences) = match dict.get(b"Encoding").map(|obj| resolve(doc, obj)) {
        Ok(Object::Name(name)) => (String::from_utf8_lossy(name).into_owned(), HashMap::new()),
        Ok(Object::Dictionary(enc)) => (
            name_entry(doc, enc, b"BaseEncoding").unwrap_or_else(|| STANDARD_ENCODING.to_string()),
            differences(doc, enc),
        ),
        _ => (STANDARD_ENCODING.to_string(), HashMap::new()),
    };
    let base = if encoding_name == "MacRomanEncoding" {
        MACINTOSH
    } else {
        WINDOWS_1252
    };

    let descriptor = descriptor(doc, dict);
    let widths = match dict.get(b"Widths").map(|obj| resolve(doc, obj)) {
        Ok(Object::Array(items)) => {
            let first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(|obj| number(resolve(doc, obj)))
                .map_or(0, |v| v.max(0.0) as u32);
            Widths::Simple {
                first_char,
                widths: items
                    .iter()
                    .map(|obj| number(resolve(doc, obj)).unwrap_or(0.0))
                    .collect(),
                missing: descriptor
                    .and_then(|d| descriptor_number(doc, d, b"MissingWidth"))
                    .unwrap_or(0.0),
                standard: None,
            }
        }
        _ => Widths::Simple {
            first_char: 0,
            widths: Vec::new(),
            missing: 0.0,
            standard: Some(standard.unwrap_or_else(standard_fonts::helvetica)),
        },
    };

    let (ascent, descent) = vertical_metrics(doc, descriptor, standard);
    DocumentFont {
        name: base_font,
        encoding: encoding_name,
        composite: false,
        code_table: code_table(base, &differences),
        to_unicode,
        widths,
        ascent,
        descent,
    }
}

fn load_composite(
    doc: &Document,
    dict: &Dictionary,
    base_font: String,
    to_unicode: Option<ToUnicodeCMap>,
) -> DocumentFont {
    // Embedded CMap streams are treated like Identity-H.
    let encoding = name_entry(doc, dict, b"Encoding").unwrap_or_else(|| IDENTITY_H.to_string());

    let descendant = dict
        .get(b"DescendantFonts")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_array().ok())
        .and_then(|fonts| fonts.first())
        .and_then(|obj| resolve(doc, obj).as_dict().ok());

    let (widths, descriptor) = match descendant {
        Some(cid_font) => {
            let default = cid_font
                .get(b"DW")
                .ok()
                .and_then(|obj| number(resolve(doc, obj)))
                .unwrap_or(DEFAULT_CID_WIDTH);
            let widths = cid_font
                .get(b"W")
                .ok()
                .and_then(|obj| resolve(doc, obj).as_array().ok())
                .map(|items| cid_widths(doc, items))
                .unwrap_or_default();
            (Widths::Cid { widths, default }, descriptor(doc, cid_font))
        }
        None => {
            warn!(font = %base_font, "Type0 font without descendant font");
            (
                Widths::Cid {
                    widths: HashMap::new(),
                    default: DEFAULT_CID_WIDTH,
                },
                None,
            )
        }
    };

    let (ascent, descent) = vertical_metrics(doc, descriptor, None);
    DocumentFont {
        name: base_font,
        encoding,
        composite: true,
        code_table: Vec::new(),
        to_unicode,
        widths,
        ascent,
        descent,
    }
}

fn name_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match resolve(doc, dict.get(key).ok()?) {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn descriptor<'a>(doc: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    dict.get(b"FontDescriptor")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
}

fn descriptor_number(doc: &Document, descriptor: &Dictionary, key: &[u8]) -> Option<f64> {
    descriptor
        .get(key)
        .ok()
        .and_then(|obj| number(resolve(doc, obj)))
}

/// Ascent and descent from the descriptor, then the standard metrics,
/// then Helvetica's.
fn vertical_metrics(
    doc: &Document,
    descriptor: Option<&Dictionary>,
    standard: Option<&'static StandardFont>,
) -> (f64, f64) {
    let fallback = standard.unwrap_or_else(standard_fonts::helvetica);
    let ascent = descriptor
        .and_then(|d| descriptor_number(doc, d, b"Ascent"))
        .filter(|a| *a != 0.0)
        .unwrap_or(f64::from(fallback.ascent));
    let descent = descriptor
        .and_then(|d| descriptor_number(doc, d, b"Descent"))
        .filter(|d| *d != 0.0)
        .unwrap_or(f64::from(fallback.descent));
    // Some producers write a positive descent.
    (ascent, -descent.abs())
}

fn load_to_unicode(doc: &Document, dict: &Dictionary, font: &str) -> Option<ToUnicodeCMap> {
    let stream = resolve(doc, dict.get(b"ToUnicode").ok()?).as_stream().ok()?;
    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    match ToUnicodeCMap::parse(&data) {
        Ok(cmap) => Some(cmap),
        Err(e) => {
            warn!(font, error = %e, "ignoring unreadable ToUnicode CMap");
            None
        }
    }
}

/// `/Differences` array: a code followed by the glyph names it starts at.
fn differences(doc: &Document, encoding: &Dictionary) -> HashMap<u8, String> {
    let mut map = HashMap::new();
    let Some(items) = encoding
        .get(b"Differences")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_array().ok())
    else {
        return map;
    };
    let mut code: Option<u32> = None;
    for item in items {
        match resolve(doc, item) {
            Object::Integer(n) => code = u32::try_from(*n).ok(),
            Object::Name(name) => {
                if let Some(c) = code {
                    if let (Ok(byte), Some(text)) =
                        (u8::try_from(c), glyph_to_unicode(&String::from_utf8_lossy(name)))
                    {
                        map.insert(byte, text);
                    }
                    code = Some(c + 1);
                }
            }
            _ => {}
        }
    }
    map
}

/// `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(start) = number(resolve(doc, &items[i])) else {
            i += 1;
            continue;
        };
        let start = start.max(0.0) as u32;
        match items.get(i + 1).map(|obj| resolve(doc, obj)) {
            Some(Object::Array(run)) => {
                for (offset, w) in run.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(start + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(end) => {
                let end = number(end).map_or(start, |v| v.max(0.0) as u32);
                if let Some(w) = items.get(i + 2).and_then(|obj| number(resolve(doc, obj))) {
                    for cid in start..=end {
                        widths.insert(cid, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn code_table(base: &'static Encoding, differences: &HashMap<u8, String>) -> Vec<String> {
    (0..=255u8)
        .map(|byte| match differences.get(&byte) {
            Some(text) => text.clone(),
            None => base.decode_without_bom_handling(&[byte]).0.into_owned(),
        })
        .collect()
}

const GLYPH_NAMES: &[(&str, char)] = &[
    ("space", ' '),
    ("exclam", '!'),
    ("quotedbl", '"'),
    ("numbersign", '#'),
    ("dollar", '$'),
    ("percent", '%'),
    ("ampersand", '&'),
    ("quotesingle", '\''),
    ("parenleft", '('),
    ("parenright", ')'),
    ("asterisk", '*'),
    ("plus", '+'),
    ("comma", ','),
    ("hyphen", '-'),
    ("period", '.'),
    ("slash", '/'),
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("less", '<'),
    ("equal", '='),
    ("greater", '>'),
    ("question", '?'),
    ("at", '@'),
    ("bracketleft", '['),
    ("backslash", '\\'),
    ("bracketright", ']'),
    ("asciicircum", '^'),
    ("underscore", '_'),
    ("grave", '`'),
    ("braceleft", '{'),
    ("bar", '|'),
    ("braceright", '}'),
    ("asciitilde", '~'),
    ("bullet", '\u{2022}'),
    ("endash", '\u{2013}'),
    ("emdash", '\u{2014}'),
    ("ellipsis", '\u{2026}'),
    ("quoteleft", '\u{2018}'),
    ("quoteright", '\u{2019}'),
    ("quotedblleft", '\u{201C}'),
    ("quotedblright", '\u{201D}'),
    ("quotesinglbase", '\u{201A}'),
    ("quotedblbase", '\u{201E}'),
    ("dagger", '\u{2020}'),
    ("daggerdbl", '\u{2021}'),
    ("Euro", '\u{20AC}'),
    ("trademark", '\u{2122}'),
    ("copyright", '\u{A9}'),
    ("registered", '\u{AE}'),
    ("degree", '\u{B0}'),
    ("section", '\u{A7}'),
    ("paragraph", '\u{B6}'),
    ("periodcentered", '\u{B7}'),
    ("nbspace", '\u{A0}'),
    ("minus", '\u{2212}'),
    ("multiply", '\u{D7}'),
    ("divide", '\u{F7}'),
    ("adieresis", '\u{E4}'),
    ("odieresis", '\u{F6}'),
    ("udieresis", '\u{FC}'),
    ("Adieresis", '\u{C4}'),
    ("Odieresis", '\u{D6}'),
    ("Udieresis", '\u{DC}'),
    ("germandbls", '\u{DF}'),
    ("eacute", '\u{E9}'),
    ("egrave", '\u{E8}'),
    ("aacute", '\u{E1}'),
    ("agrave", '\u{E0}'),
    ("ccedilla", '\u{E7}'),
    ("ntilde", '\u{F1}'),
    ("dotlessi", '\u{131}'),
];

/// Unicode for a glyph name from `/Differences`.
fn glyph_to_unicode(name: &str) -> Option<String> {
    // Suffixes such as `.sc` or `.alt` name variants of the same character.
    let name = name.split('.').next().unwrap_or(name);
    if name.len() == 1 && name.as_bytes()[0].is_ascii_alphabetic() {
        return Some(name.to_string());
    }
    match name {
        "fi" => return Some("fi".to_string()),
        "fl" => return Some("fl".to_string()),
        "ff" => return Some("ff".to_string()),
        "ffi" => return Some("ffi".to_string()),
        "ffl" => return Some("ffl".to_string()),
        _ => {}
    }
    if let Some((_, c)) = GLYPH_NAMES.iter().find(|(glyph, _)| *glyph == name) {
        return Some(c.to_string());
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 {
            let units: Option<Vec<u16>> = (0..hex.len())
                .step_by(4)
                .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
                .collect();
            return units.map(|units| String::from_utf16_lossy(&units));
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn load(doc: &Document, font: Dictionary) -> DocumentFont {
        load_font(doc, "F1", &Object::Dictionary(font)).unwrap()
    }

    #[test]
    fn standard_font_without_widths() {
        let doc = Document::with_version("1.5");
        let font = load(
            &doc,
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            },
        );
        assert_eq!(font.name(), "Helvetica");
        assert_eq!(font.encoding(), "StandardEncoding");
        assert!(!font.is_two_byte());
        assert_eq!(font.width(u32::from(b'A')), 667.0);
        assert_eq!(font.ascent(), 718.0);
        assert_eq!(font.descent(), -207.0);
        assert_eq!(font.decode(b"Hi"), "Hi");
    }

    #[test]
    fn explicit_widths_and_descriptor() {
        let mut doc = Document::with_version("1.5");
        let descriptor = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "Ascent" => 800,
            "Descent" => -200,
            "MissingWidth" => 250,
        });
        let font = load(
            &doc,
            dictionary! {
                "Subtype" => "TrueType",
                "BaseFont" => "Custom",
                "FirstChar" => 65,
                "Widths" => vec![Object::Integer(500), Object::Real(610.5)],
                "FontDescriptor" => descriptor,
                "Encoding" => "WinAnsiEncoding",
            },
        );
        assert_eq!(font.width(65), 500.0);
        assert_eq!(font.width(66), 610.5);
        assert_eq!(font.width(67), 250.0);
        assert_eq!(font.width(10), 250.0);
        assert_eq!(font.ascent(), 800.0);
        assert_eq!(font.descent(), -200.0);
        assert_eq!(font.encoding(), "WinAnsiEncoding");
    }

    #[test]
    fn win_ansi_high_bytes() {
        let doc = Document::with_version("1.5");
        let font = load(
            &doc,
            dictionary! { "Subtype" => "Type1", "BaseFont" => "Times-Roman", "Encoding" => "WinAnsiEncoding" },
        );
        assert_eq!(font.decode(&[0x80, 0x93, 0xE9]), "\u{20AC}\u{201C}é");
        assert_eq!(font.ascent(), 683.0);
    }

    #[test]
    fn mac_roman_encoding() {
        let doc = Document::with_version("1.5");
        let font = load(
            &doc,
            dictionary! { "Subtype" => "Type1", "BaseFont" => "Helvetica", "Encoding" => "MacRomanEncoding" },
        );
        assert_eq!(font.decode(&[0x8E]), "é");
    }

    #[test]
    fn differences_override_base_encoding() {
        let doc = Document::with_version("1.5");
        let font = load(
            &doc,
            dictionary! {
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => Object::Dictionary(dictionary! {
                    "Type" => "Encoding",
                    "BaseEncoding" => "WinAnsiEncoding",
                    "Differences" => vec![
                        Object::Integer(1),
                        Object::Name(b"fi".to_vec()),
                        Object::Name(b"uni00E9".to_vec()),
                        Object::Integer(65),
                        Object::Name(b"bullet".to_vec()),
                    ],
                }),
            },
        );
        assert_eq!(font.encoding(), "WinAnsiEncoding");
        assert_eq!(font.decode(&[1, 2, 65, 66]), "fi\u{e9}\u{2022}B");
    }

    #[test]
    fn to_unicode_takes_precedence() {
        let mut doc = Document::with_version("1.5");
        let cmap = doc.add_object(Stream::new(
            dictionary! {},
            b"1 beginbfchar <41> <0058> endbfchar".to_vec(),
        ));
        let font = load(
            &doc,
            dictionary! { "Subtype" => "Type1", "BaseFont" => "Helvetica", "ToUnicode" => cmap },
        );
        assert_eq!(font.decode(b"AB"), "XB");
    }

    #[test]
    fn type0_identity_h() {
        let mut doc = Document::with_version("1.5");
        let descriptor = doc.add_object(dictionary! { "Ascent" => 880, "Descent" => 120 });
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "NotoSansCJK",
            "DW" => 900,
            "W" => vec![
                Object::Integer(1),
                Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(300),
            ],
            "FontDescriptor" => descriptor,
        });
        let font = load(
            &doc,
            dictionary! {
                "Subtype" => "Type0",
                "BaseFont" => "NotoSansCJK",
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::Reference(cid_font)],
            },
        );
        assert!(font.is_composite());
        assert!(font.is_two_byte());
        assert_eq!(font.encoding(), IDENTITY_H);
        assert_eq!(font.width(1), 500.0);
        assert_eq!(font.width(2), 600.0);
        assert_eq!(font.width(11), 300.0);
        assert_eq!(font.width(13), 900.0);
        assert_eq!(font.ascent(), 880.0);
        assert_eq!(font.descent(), -120.0);
        assert_eq!(font.decode(&[0x4E, 0x2D, 0x00, 0x41]), "\u{4E2D}A");
    }

    #[test]
    fn helvetica_fallback() {
        let font = DocumentFont::helvetica();
        assert_eq!(font.name(), "Helvetica");
        assert_eq!(font.width(font.space_code()), 278.0);
    }

    #[test]
    fn non_dictionary_is_font_error() {
        let doc = Document::with_version("1.5");
        let err = load_font(&doc, "F9", &Object::Integer(3)).unwrap_err();
        assert!(matches!(err, BackendError::Font(_)));
    }

    #[test]
    fn glyph_names() {
        assert_eq!(glyph_to_unicode("a").as_deref(), Some("a"));
        assert_eq!(glyph_to_unicode("A.sc").as_deref(), Some("A"));
        assert_eq!(glyph_to_unicode("quoteright").as_deref(), Some("\u{2019}"));
        assert_eq!(glyph_to_unicode("uni00410042").as_deref(), Some("AB"));
        assert_eq!(glyph_to_unicode("u1F600").as_deref(), Some("\u{1F600}"));
        assert_eq!(glyph_to_unicode("g123"), None);
    }
}
