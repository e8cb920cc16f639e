//! Content stream tokenizer.
//!
//! Splits raw content stream bytes into [`Operator`]s, each carrying the
//! [`Operand`]s that preceded it. Comments are dropped. Inline image data
//! (`BI ... ID <binary> EI`) is skipped and surfaces as a `BI` operator
//! carrying only its parameter dictionary.

use crate::error::BackendError;

/// An operand value in a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    Real(f64),
    /// Name without the leading `/`.
    Name(String),
    /// `( ... )` string with escapes resolved.
    LiteralString(Vec<u8>),
    /// `< ... >` string, decoded to bytes.
    HexString(Vec<u8>),
    Array(Vec<Operand>),
    Boolean(bool),
    Null,
    Dictionary(Vec<(String, Operand)>),
}

impl Operand {
    /// Numeric value of an integer or real operand.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Bytes of a literal or hex string.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Operand::LiteralString(bytes) | Operand::HexString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Look up `key` in a dictionary operand.
    pub fn dict_get(&self, key: &str) -> Option<&Operand> {
        match self {
            Operand::Dictionary(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

/// An operator keyword together with its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub name: String,
    pub operands: Vec<Operand>,
}

/// Tokenize a content stream into operators.
///
/// # Errors
///
/// Returns [`BackendError::Parse`] for unterminated strings, arrays or
/// dictionaries and for invalid hex digits.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operator>, BackendError> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut ops = Vec::new();
    let mut operands = Vec::new();

    while let Some(token) = lexer.next_token()? {
        match token {
            Token::Value(operand) => operands.push(operand),
            Token::Keyword(name) if name == "BI" => {
                let dict = lexer.inline_image()?;
                operands.clear();
                ops.push(Operator {
                    name,
                    operands: vec![Operand::Dictionary(dict)],
                });
            }
            Token::Keyword(name) => ops.push(Operator {
                name,
                operands: std::mem::take(&mut operands),
            }),
            Token::ArrayEnd | Token::DictEnd => {
                return Err(BackendError::Parse(format!(
                    "unexpected closing delimiter at offset {}",
                    lexer.pos
                )));
            }
        }
    }
    Ok(ops)
}

enum Token {
    Value(Operand),
    Keyword(String),
    ArrayEnd,
    DictEnd,
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl Lexer<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, BackendError> {
        loop {
            self.skip_whitespace_and_comments();
            let Some(b) = self.peek() else {
                return Ok(None);
            };
            // Stray delimiters such as ')' or '{' carry no meaning here.
            if matches!(b, b')' | b'{' | b'}')
                || (b == b'>' && self.peek_at(1) != Some(b'>'))
            {
                self.pos += 1;
                continue;
            }
            return self.token_at(b).map(Some);
        }
    }

    fn token_at(&mut self, b: u8) -> Result<Token, BackendError> {
        let token = match b {
            b'(' => Token::Value(Operand::LiteralString(self.literal_string()?)),
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                Token::Value(Operand::Dictionary(self.dictionary_body()?))
            }
            b'<' => Token::Value(Operand::HexString(self.hex_string()?)),
            b'>' if self.peek_at(1) == Some(b'>') => {
                self.pos += 2;
                Token::DictEnd
            }
            b'[' => {
                self.pos += 1;
                Token::Value(Operand::Array(self.array_body()?))
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'/' => Token::Value(Operand::Name(self.name())),
            b'+' | b'-' | b'.' | b'0'..=b'9' => Token::Value(self.number()?),
            _ => match self.regular_run().as_str() {
                "true" => Token::Value(Operand::Boolean(true)),
                "false" => Token::Value(Operand::Boolean(false)),
                "null" => Token::Value(Operand::Null),
                word => Token::Keyword(word.to_string()),
            },
        };
        Ok(token)
    }

    /// Next value inside an array or dictionary. Keywords are not allowed.
    fn next_value(&mut self, context: &str) -> Result<Option<Token>, BackendError> {
        match self.next_token()? {
            None => Err(BackendError::Parse(format!("unterminated {context}"))),
            Some(Token::Keyword(word)) => Err(BackendError::Parse(format!(
                "unexpected keyword '{word}' inside {context}"
            ))),
            token => Ok(token),
        }
    }

    fn regular_run(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn name(&mut self) -> String {
        self.pos += 1; // '/'
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let mut decoded = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    decoded.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            decoded.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&decoded).into_owned()
    }

    fn number(&mut self) -> Result<Operand, BackendError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut is_real = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    is_real = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|e| BackendError::Parse(format!("invalid number bytes: {e}")))?;
        if is_real {
            // "5." and "-.5" are valid PDF reals; a bare sign or dot is zero.
            let normalized = match text {
                "." | "-." | "+." | "-" | "+" => "0",
                other => other,
            };
            normalized
                .parse::<f64>()
                .map(Operand::Real)
                .map_err(|e| BackendError::Parse(format!("invalid real '{text}': {e}")))
        } else if text == "-" || text == "+" {
            Ok(Operand::Integer(0))
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok(Operand::Integer(i)),
                // Out of i64 range.
                Err(_) => text
                    .parse::<f64>()
                    .map(Operand::Real)
                    .map_err(|e| BackendError::Parse(format!("invalid number '{text}': {e}"))),
            }
        }
    }

    fn literal_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1; // '('
        let mut out = Vec::new();
        let mut depth = 1usize;
        loop {
            let Some(b) = self.peek() else {
                return Err(BackendError::Parse("unterminated literal string".to_string()));
            };
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => self.escape(&mut out),
                _ => out.push(b),
            }
        }
    }

    fn escape(&mut self, out: &mut Vec<u8>) {
        let Some(b) = self.peek() else {
            return;
        };
        self.pos += 1;
        match b {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                let mut value = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            }
            // Line continuation.
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            other => out.push(other),
        }
    }

    fn hex_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1; // '<'
        let mut digits = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(BackendError::Parse("unterminated hex string".to_string()));
            };
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let value = hex_value(b).ok_or_else(|| {
                BackendError::Parse(format!("invalid hex digit '{}'", b as char))
            })?;
            digits.push(value);
        }
        // An odd final digit is padded with 0.
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        Ok(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
    }

    fn array_body(&mut self) -> Result<Vec<Operand>, BackendError> {
        let mut items = Vec::new();
        loop {
            match self.next_value("array")? {
                Some(Token::ArrayEnd) => return Ok(items),
                Some(Token::Value(value)) => items.push(value),
                _ => return Err(BackendError::Parse("unexpected '>>' inside array".to_string())),
            }
        }
    }

    fn dictionary_body(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        let mut entries = Vec::new();
        loop {
            let key = match self.next_value("dictionary")? {
                Some(Token::DictEnd) => return Ok(entries),
                Some(Token::Value(Operand::Name(key))) => key,
                _ => {
                    return Err(BackendError::Parse(
                        "dictionary key must be a name".to_string(),
                    ));
                }
            };
            match self.next_value("dictionary")? {
                Some(Token::Value(value)) => entries.push((key, value)),
                _ => {
                    return Err(BackendError::Parse(format!(
                        "dictionary key '/{key}' has no value"
                    )));
                }
            }
        }
    }

    /// Parse the `BI` parameters, then skip the data through `EI`.
    fn inline_image(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        let mut entries = Vec::new();
        loop {
            match self.next_token()? {
                None => return Err(BackendError::Parse("unterminated inline image".to_string())),
                Some(Token::Keyword(word)) if word == "ID" => break,
                Some(Token::Value(Operand::Name(key))) => match self.next_token()? {
                    Some(Token::Value(value)) => entries.push((key, value)),
                    Some(Token::Keyword(word)) => entries.push((key, Operand::Name(word))),
                    _ => {
                        return Err(BackendError::Parse(
                            "inline image parameter has no value".to_string(),
                        ));
                    }
                },
                Some(_) => {
                    return Err(BackendError::Parse(
                        "unexpected token in inline image parameters".to_string(),
                    ));
                }
            }
        }
        // One whitespace byte separates ID from the data.
        self.pos += 1;
        while self.pos < self.input.len() {
            let at_ei = self.input[self.pos..].starts_with(b"EI")
                && self.pos > 0
                && is_whitespace(self.input[self.pos - 1])
                && self
                    .input
                    .get(self.pos + 2)
                    .is_none_or(|b| is_whitespace(*b) || is_delimiter(*b));
            if at_ei {
                self.pos += 2;
                return Ok(entries);
            }
            self.pos += 1;
        }
        Err(BackendError::Parse("inline image without EI".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &[u8]) -> Operator {
        let ops = tokenize(input).unwrap();
        assert_eq!(ops.len(), 1, "expected one operator, got {ops:?}");
        ops.into_iter().next().unwrap()
    }

    #[test]
    fn operator_without_operands() {
        let op = single(b"BT");
        assert_eq!(op.name, "BT");
        assert!(op.operands.is_empty());
    }

    #[test]
    fn numbers() {
        let op = single(b"1 -2 3.5 -.5 +7 5. cm");
        assert_eq!(
            op.operands,
            vec![
                Operand::Integer(1),
                Operand::Integer(-2),
                Operand::Real(3.5),
                Operand::Real(-0.5),
                Operand::Integer(7),
                Operand::Real(5.0),
            ]
        );
    }

    #[test]
    fn font_selection() {
        let op = single(b"/F1 12 Tf");
        assert_eq!(op.name, "Tf");
        assert_eq!(op.operands[0], Operand::Name("F1".to_string()));
        assert_eq!(op.operands[1].as_f64(), Some(12.0));
    }

    #[test]
    fn name_hex_escape() {
        let op = single(b"/A#20B BMC");
        assert_eq!(op.operands[0].as_name(), Some("A B"));
    }

    #[test]
    fn literal_string_escapes_and_nesting() {
        let op = single(b"(a\\(b\\) (nested) \\n\\101) Tj");
        assert_eq!(
            op.operands[0],
            Operand::LiteralString(b"a(b) (nested) \nA".to_vec())
        );
    }

    #[test]
    fn literal_string_line_continuation() {
        let op = single(b"(ab\\\ncd) Tj");
        assert_eq!(op.operands[0].as_string_bytes(), Some(&b"abcd"[..]));
    }

    #[test]
    fn hex_string_with_whitespace_and_odd_length() {
        let op = single(b"<48 65 6C6C 6F7> Tj");
        assert_eq!(op.operands[0], Operand::HexString(b"Hellop".to_vec()));
    }

    #[test]
    fn text_array() {
        let op = single(b"[(A) -120 (B)] TJ");
        assert_eq!(
            op.operands[0],
            Operand::Array(vec![
                Operand::LiteralString(b"A".to_vec()),
                Operand::Integer(-120),
                Operand::LiteralString(b"B".to_vec()),
            ])
        );
    }

    #[test]
    fn inline_dictionary() {
        let op = single(b"/Span <</ActualText (x) /MCID 3>> BDC");
        assert_eq!(op.operands.len(), 2);
        assert_eq!(
            op.operands[1].dict_get("ActualText"),
            Some(&Operand::LiteralString(b"x".to_vec()))
        );
        assert_eq!(op.operands[1].dict_get("MCID"), Some(&Operand::Integer(3)));
        assert_eq!(op.operands[1].dict_get("Missing"), None);
    }

    #[test]
    fn booleans_and_null() {
        let op = single(b"true false null op");
        assert_eq!(
            op.operands,
            vec![Operand::Boolean(true), Operand::Boolean(false), Operand::Null]
        );
    }

    #[test]
    fn comments_are_dropped() {
        let ops = tokenize(b"% header\nBT % open\n/F1 9 Tf\nET").unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["BT", "Tf", "ET"]);
    }

    #[test]
    fn quote_operators() {
        let ops = tokenize(b"(a) ' 1 2 (b) \"").unwrap();
        assert_eq!(ops[0].name, "'");
        assert_eq!(ops[1].name, "\"");
        assert_eq!(ops[1].operands.len(), 3);
    }

    #[test]
    fn star_operator_names() {
        let ops = tokenize(b"T* f* b*").unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["T*", "f*", "b*"]);
    }

    #[test]
    fn inline_image_is_skipped() {
        let ops = tokenize(b"q BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xFFEI\x01 EI Q").unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["q", "BI", "Q"]);
        assert_eq!(ops[1].operands[0].dict_get("W"), Some(&Operand::Integer(2)));
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(tokenize(b"(abc Tj").is_err());
    }

    #[test]
    fn unterminated_array_errors() {
        assert!(tokenize(b"[(a) 1 TJ").is_err());
    }

    #[test]
    fn invalid_hex_errors() {
        assert!(tokenize(b"<4G> Tj").is_err());
    }

    #[test]
    fn trailing_operands_are_dropped() {
        let ops = tokenize(b"BT 1 2").unwrap();
        assert_eq!(ops.len(), 1);
    }
}
