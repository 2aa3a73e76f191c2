//! Recursive-descent JSON parser.
//!
//! Offsets in [`ParseError`] count characters, not bytes, from the start of
//! the input. Arrays and objects may nest at most [`MAX_DEPTH`] levels deep.

use thiserror::Error;

use crate::value::{Map, Value};

/// Deepest array or object nesting [`parse`] accepts.
pub const MAX_DEPTH: usize = 512;

/// Failure raised while parsing JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {offset}")]
pub struct ParseError {
    message: String,
    offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    /// Human-readable description without the position suffix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Character offset at which parsing failed.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Parses `source` into a [`Value`].
///
/// The whole input must be consumed; trailing non-whitespace is an error.
///
/// # Errors
///
/// Returns [`ParseError`] with the failing character offset when the input is
/// not valid JSON.
pub fn parse(source: &str) -> Result<Value, ParseError> {
    let mut parser = Parser::new(source);
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.index != parser.chars.len() {
        return Err(parser.error("Unexpected token"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            depth: 0,
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        self.skip_whitespace();
        let Some(token) = self.current() else {
            return Err(self.error("Unexpected end of input"));
        };
        match token {
            '{' => self.parse_object(),
            '[' => self.parse_array(),
            '"' => self.parse_string().map(Value::String),
            't' => self.parse_literal("true", Value::Bool(true)),
            'f' => self.parse_literal("false", Value::Bool(false)),
            'n' => self.parse_literal("null", Value::Null),
            '-' | '0'..='9' => self.parse_number(),
            other => Err(self.error(format!("Unexpected token: {other}"))),
        }
    }

    fn parse_object(&mut self) -> Result<Value, ParseError> {
        self.descend()?;
        self.expect('{')?;
        self.skip_whitespace();
        let mut map = Map::new();
        if !self.peek('}') {
            loop {
                self.skip_whitespace();
                let key = self.parse_string()?;
                self.skip_whitespace();
                self.expect(':')?;
                let value = self.parse_value()?;
                map.insert(key, value);
                self.skip_whitespace();
                if self.peek('}') {
                    break;
                }
                self.expect(',')?;
            }
        }
        self.index += 1;
        self.ascend();
        Ok(Value::Object(map))
    }

    fn parse_array(&mut self) -> Result<Value, ParseError> {
        self.descend()?;
        self.expect('[')?;
        self.skip_whitespace();
        let mut items = Vec::new();
        if !self.peek(']') {
            loop {
                items.push(self.parse_value()?);
                self.skip_whitespace();
                if self.peek(']') {
                    break;
                }
                self.expect(',')?;
            }
        }
        self.index += 1;
        self.ascend();
        Ok(Value::Array(items))
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("Maximum nesting depth exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    const fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        self.expect('"')?;
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch < '\u{0020}' {
                return Err(self.error("Unescaped control character in string"));
            }
            self.index += 1;
            match ch {
                '"' => return Ok(text),
                '\\' => text.push(self.parse_escape()?),
                other => text.push(other),
            }
        }
        Err(self.error("Unterminated string"))
    }

    fn parse_escape(&mut self) -> Result<char, ParseError> {
        let Some(escaped) = self.current() else {
            return Err(self.error("Invalid escape"));
        };
        self.index += 1;
        match escaped {
            '"' => Ok('"'),
            '\\' => Ok('\\'),
            '/' => Ok('/'),
            'b' => Ok('\u{0008}'),
            'f' => Ok('\u{000c}'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'u' => self.parse_unicode(),
            other => Err(self.error(format!("Invalid escape: {other}"))),
        }
    }

    fn parse_unicode(&mut self) -> Result<char, ParseError> {
        let start = self.index;
        let high = self.parse_hex4()?;
        if !(0xD800..0xDC00).contains(&high) {
            return char::from_u32(high)
                .ok_or_else(|| ParseError::new("Invalid unicode escape", start));
        }

        // A high surrogate must be followed by an escaped low surrogate.
        if !(self.peek('\\') && self.chars.get(self.index + 1) == Some(&'u')) {
            return Err(ParseError::new("Unpaired surrogate in unicode escape", start));
        }
        self.index += 2;
        let low = self.parse_hex4()?;
        if !(0xDC00..0xE000).contains(&low) {
            return Err(ParseError::new("Unpaired surrogate in unicode escape", start));
        }
        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(combined).ok_or_else(|| ParseError::new("Invalid unicode escape", start))
    }

    fn parse_hex4(&mut self) -> Result<u32, ParseError> {
        let Some(digits) = self.chars.get(self.index..self.index + 4) else {
            return Err(self.error("Invalid unicode escape"));
        };
        let hex: String = digits.iter().collect();
        let code = u32::from_str_radix(&hex, 16)
            .map_err(|_| self.error(format!("Invalid unicode escape: {hex}")))?;
        self.index += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> Result<Value, ParseError> {
        let start = self.index;
        if self.peek('-') {
            self.index += 1;
        }
        self.consume_digits()?;

        let mut decimal = false;
        if self.peek('.') {
            decimal = true;
            self.index += 1;
            self.consume_digits()?;
        }
        if self.peek('e') || self.peek('E') {
            decimal = true;
            self.index += 1;
            if self.peek('+') || self.peek('-') {
                self.index += 1;
            }
            self.consume_digits()?;
        }

        let token: String = self
            .chars
            .get(start..self.index)
            .unwrap_or_default()
            .iter()
            .collect();
        let invalid = || ParseError::new(format!("Invalid number: {token}"), start);
        if decimal {
            token.parse::<f64>().map(Value::Float).map_err(|_| invalid())
        } else {
            token.parse::<i64>().map(Value::Integer).map_err(|_| invalid())
        }
    }

    fn consume_digits(&mut self) -> Result<(), ParseError> {
        if !self.current().is_some_and(|ch| ch.is_ascii_digit()) {
            return Err(self.error("Expected digit"));
        }
        while self.current().is_some_and(|ch| ch.is_ascii_digit()) {
            self.index += 1;
        }
        Ok(())
    }

    fn parse_literal(&mut self, token: &str, value: Value) -> Result<Value, ParseError> {
        let matches = token
            .chars()
            .enumerate()
            .all(|(offset, expected)| self.chars.get(self.index + offset) == Some(&expected));
        if matches {
            self.index += token.chars().count();
            Ok(value)
        } else {
            Err(self.error("Invalid literal"))
        }
    }

    fn skip_whitespace(&mut self) {
        while self
            .current()
            .is_some_and(|ch| matches!(ch, ' ' | '\t' | '\n' | '\r'))
        {
            self.index += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        if self.peek(expected) {
            self.index += 1;
            Ok(())
        } else {
            Err(self.error(format!("Expected '{expected}'")))
        }
    }

    fn peek(&self, token: char) -> bool {
        self.current() == Some(token)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.index)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_nested_document() {
        let value = parse(r#" {"a": 1, "b": [true, null, "x"], "c": {"d": -2.5}} "#)
            .expect("valid document");
        let object = value.as_object().expect("object");
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(object.get("a"), Some(&Value::Integer(1)));
        assert_eq!(
            object.get("b"),
            Some(&Value::Array(vec![
                Value::Bool(true),
                Value::Null,
                Value::from("x")
            ]))
        );
        assert_eq!(value.get("c").and_then(|c| c.get("d")), Some(&Value::Float(-2.5)));
    }

    #[rstest]
    #[case("7", Value::Integer(7))]
    #[case("-12", Value::Integer(-12))]
    #[case("7.0", Value::Float(7.0))]
    #[case("1e3", Value::Float(1000.0))]
    #[case("2E-2", Value::Float(0.02))]
    fn distinguishes_integers_from_floats(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(parse(input).expect("number"), expected);
    }

    #[rstest]
    #[case(r#""tab\there""#, "tab\there")]
    #[case(r#""quote\"slash\/back\\""#, "quote\"slash/back\\")]
    #[case(r#""été""#, "été")]
    #[case(r#""\u00e9\ud83d\ude00""#, "é\u{1F600}")]
    fn decodes_escapes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse(input).expect("string"), Value::from(expected));
    }

    #[rstest]
    #[case("", 0)]
    #[case("{\"a\" 1}", 5)]
    #[case("[1,]", 3)]
    #[case("tru", 0)]
    #[case("1 2", 2)]
    #[case("\"open", 5)]
    #[case("-", 1)]
    fn reports_character_offsets(#[case] input: &str, #[case] offset: usize) {
        let error = parse(input).expect_err("input should be rejected");
        assert_eq!(error.offset(), offset, "unexpected offset for {input:?}: {error}");
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let error = parse("[\"é\", x]").expect_err("bare identifier");
        assert_eq!(error.offset(), 6);
        assert!(error.to_string().ends_with("at position 6"));
    }

    #[test]
    fn rejects_lone_surrogate() {
        let error = parse(r#""\ud83d x""#).expect_err("lone surrogate");
        assert!(error.message().contains("surrogate"));
    }

    #[test]
    fn accepts_nesting_up_to_the_limit() {
        let text = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&text).is_ok());
    }

    #[rstest]
    #[case("[")]
    #[case("{\"k\":")]
    fn rejects_nesting_beyond_the_limit(#[case] opener: &str) {
        let text = format!("{}1", opener.repeat(200_000));
        let error = parse(&text).expect_err("too deep");
        assert_eq!(error.message(), "Maximum nesting depth exceeded");
        assert_eq!(error.offset(), MAX_DEPTH * opener.chars().count());
    }

    #[rstest]
    #[case("\u{000b}1")]
    #[case("\u{00a0}1")]
    #[case("[1,\u{2028}2]")]
    fn rejects_non_json_whitespace(#[case] input: &str) {
        assert!(parse(input).is_err(), "{input:?} should be rejected");
    }

    #[test]
    fn accepts_json_whitespace() {
        assert_eq!(parse(" \t\r\n7\n").expect("number"), Value::Integer(7));
    }

    #[rstest]
    #[case("\"a\nb\"", 2)]
    #[case("\"tab\there\"", 4)]
    #[case("\"\u{0000}\"", 1)]
    fn rejects_raw_control_characters_in_strings(#[case] input: &str, #[case] offset: usize) {
        let error = parse(input).expect_err("raw control character");
        assert_eq!(error.message(), "Unescaped control character in string");
        assert_eq!(error.offset(), offset);
    }

    #[test]
    fn duplicate_keys_keep_first_position_and_last_value() {
        let value = parse(r#"{"a":1,"b":2,"a":3}"#).expect("object");
        let object = value.as_object().expect("object");
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(object.get("a"), Some(&Value::Integer(3)));
    }

    #[test]
    fn rejects_integer_overflow() {
        let error = parse("92233720368547758070").expect_err("overflow");
        assert!(error.message().starts_with("Invalid number"));
    }
}
