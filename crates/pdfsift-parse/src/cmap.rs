//! ToUnicode CMap parsing.
//!
//! Reads the `beginbfchar`/`endbfchar` and `beginbfrange`/`endbfrange`
//! sections of an embedded `/ToUnicode` stream. Destination strings are
//! UTF-16BE; a single code may map to several characters (ligatures).

use std::collections::HashMap;

use crate::error::BackendError;

/// Character code to Unicode mapping from a ToUnicode CMap.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeCMap {
    mappings: HashMap<u32, String>,
}

impl ToUnicodeCMap {
    /// Parse raw CMap stream content.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Font`] when a section contains malformed hex.
    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        let text = String::from_utf8_lossy(data);
        let mut mappings = HashMap::new();

        for section in sections(&text, "beginbfchar", "endbfchar") {
            let tokens = entry_tokens(section)?;
            for pair in tokens.chunks(2) {
                if let [Entry::Hex(src), Entry::Hex(dst)] = pair {
                    mappings.insert(code_of(src), utf16be(dst));
                }
            }
        }

        for section in sections(&text, "beginbfrange", "endbfrange") {
            let tokens = entry_tokens(section)?;
            for triple in tokens.chunks(3) {
                let [Entry::Hex(lo), Entry::Hex(hi), dst] = triple else {
                    continue;
                };
                let (lo, hi) = (code_of(lo), code_of(hi));
                if hi < lo {
                    continue;
                }
                match dst {
                    Entry::Hex(start) => {
                        let mut units = to_units(start);
                        for code in lo..=hi {
                            mappings.insert(code, String::from_utf16_lossy(&units));
                            // Only the last unit increments across the range.
                            if let Some(last) = units.last_mut() {
                                *last = last.wrapping_add(1);
                            }
                        }
                    }
                    Entry::Array(items) => {
                        for (code, item) in (lo..=hi).zip(items) {
                            mappings.insert(code, utf16be(item));
                        }
                    }
                }
            }
        }

        Ok(Self { mappings })
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

enum Entry {
    Hex(Vec<u8>),
    Array(Vec<Vec<u8>>),
}

fn sections<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        let Some(stop) = body.find(end) else {
            break;
        };
        out.push(&body[..stop]);
        rest = &body[stop + end.len()..];
    }
    out
}

/// Hex strings and arrays of hex strings, in order.
fn entry_tokens(section: &str) -> Result<Vec<Entry>, BackendError> {
    let bytes = section.as_bytes();
    let mut entries = Vec::new();
    let mut array: Option<Vec<Vec<u8>>> = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                let close = bytes[i..]
                    .iter()
                    .position(|b| *b == b'>')
                    .ok_or_else(|| BackendError::Font("unterminated hex in CMap".to_string()))?;
                let hex = decode_hex(&bytes[i + 1..i + close])?;
                match array.as_mut() {
                    Some(items) => items.push(hex),
                    None => entries.push(Entry::Hex(hex)),
                }
                i += close + 1;
            }
            b'[' => {
                array = Some(Vec::new());
                i += 1;
            }
            b']' => {
                if let Some(items) = array.take() {
                    entries.push(Entry::Array(items));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    Ok(entries)
}

fn decode_hex(digits: &[u8]) -> Result<Vec<u8>, BackendError> {
    let digits: Vec<u8> = digits
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|b| {
            (*b as char)
                .to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| BackendError::Font(format!("invalid hex digit '{}' in CMap", *b as char)))
        })
        .collect::<Result<_, _>>()?;
    Ok(digits
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => 0,
        })
        .collect())
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, b| (acc << 8) | u32::from(*b))
}

fn to_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() == 1 {
        return vec![u16::from(bytes[0])];
    }
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [lo] => u16::from(*lo),
            _ => 0,
        })
        .collect()
}

fn utf16be(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&to_units(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOILERPLATE: &str = "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
        1 begincodespacerange <00> <FF> endcodespacerange\n";

    #[test]
    fn empty_cmap() {
        let cmap = ToUnicodeCMap::parse(b"").unwrap();
        assert!(cmap.is_empty());
        assert_eq!(cmap.lookup(0x41), None);
    }

    #[test]
    fn bfchar_entries() {
        let data = format!("{BOILERPLATE}2 beginbfchar\n<01> <0041>\n<02> <0042>\nendbfchar\nendcmap");
        let cmap = ToUnicodeCMap::parse(data.as_bytes()).unwrap();
        assert_eq!(cmap.len(), 2);
        assert_eq!(cmap.lookup(1), Some("A"));
        assert_eq!(cmap.lookup(2), Some("B"));
    }

    #[test]
    fn bfchar_entries_on_one_line() {
        let cmap = ToUnicodeCMap::parse(b"2 beginbfchar <03> <0043> <04> <0044> endbfchar").unwrap();
        assert_eq!(cmap.lookup(3), Some("C"));
        assert_eq!(cmap.lookup(4), Some("D"));
    }

    #[test]
    fn bfchar_ligature_and_surrogates() {
        let cmap = ToUnicodeCMap::parse(
            b"2 beginbfchar <0005> <00660069> <0006> <D83DDE00> endbfchar",
        )
        .unwrap();
        assert_eq!(cmap.lookup(5), Some("fi"));
        assert_eq!(cmap.lookup(6), Some("\u{1F600}"));
    }

    #[test]
    fn bfrange_increments() {
        let cmap = ToUnicodeCMap::parse(b"1 beginbfrange <20> <22> <0061> endbfrange").unwrap();
        assert_eq!(cmap.lookup(0x20), Some("a"));
        assert_eq!(cmap.lookup(0x21), Some("b"));
        assert_eq!(cmap.lookup(0x22), Some("c"));
        assert_eq!(cmap.lookup(0x23), None);
    }

    #[test]
    fn bfrange_with_array() {
        let cmap =
            ToUnicodeCMap::parse(b"1 beginbfrange <0010> <0011> [<0058> <0059>] endbfrange")
                .unwrap();
        assert_eq!(cmap.lookup(0x10), Some("X"));
        assert_eq!(cmap.lookup(0x11), Some("Y"));
    }

    #[test]
    fn two_byte_source_codes() {
        let cmap = ToUnicodeCMap::parse(b"1 beginbfchar <4E2D> <4E2D> endbfchar").unwrap();
        assert_eq!(cmap.lookup(0x4E2D), Some("\u{4E2D}"));
    }

    #[test]
    fn multiple_sections() {
        let cmap = ToUnicodeCMap::parse(
            b"1 beginbfchar <01> <0041> endbfchar 1 beginbfrange <02> <03> <0061> endbfrange \
              1 beginbfchar <04> <005A> endbfchar",
        )
        .unwrap();
        assert_eq!(cmap.len(), 4);
        assert_eq!(cmap.lookup(4), Some("Z"));
    }

    #[test]
    fn malformed_hex_errors() {
        assert!(ToUnicodeCMap::parse(b"1 beginbfchar <0G> <0041> endbfchar").is_err());
    }
}
