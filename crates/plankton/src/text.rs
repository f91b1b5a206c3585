//! A small text notation for plankton values, handy in tests and on the
//! command line.
//!
//! ```text
//! 12  -4  1_000_000          integers, `_` separates digit groups
//! %n  %t  %f                 null, true, false
//! "a \"b\" \\ c"             strings, with `\"` and `\\` escapes
//! [1, 2, 3]                  arrays; a trailing comma is allowed
//! {"k": "v"}                 maps with string keys
//! $p:{"x": 1}  $p            names a value, then refers to it
//! ```
//!
//! A reference repeats a value that is already finished. Floats, bytes,
//! ids, seeds and structs have no text form.

use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::value::Value;

/// Parses one value spanning all of `input`.
pub fn decode_text(input: &str) -> Result<Value> {
    TextDecoder::new().decode(input)
}

/// Writes `value` in the text notation.
pub fn encode_text(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct TextDecoder {
    options: CodecOptions,
}

struct Cursor<'a> {
    data: &'a [u8],
    x: usize,
    names: Vec<(&'a str, Option<Value>)>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn decode(&self, input: &str) -> Result<Value> {
        let mut cur = Cursor {
            data: input.as_bytes(),
            x: 0,
            names: Vec::new(),
        };
        let value = self.read_any(&mut cur, 0)?;
        cur.skip_whitespace();
        if cur.x < cur.data.len() {
            return Err(cur.error("unexpected input after value"));
        }
        Ok(value)
    }

    fn read_any(&self, cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
        if depth > self.options.max_depth {
            return Err(Error::LimitExceeded {
                what: "nesting depth",
                limit: self.options.max_depth,
            });
        }
        cur.skip_whitespace();
        match cur.peek() {
            Some(b'[') => self.read_arr(cur, depth),
            Some(b'{') => self.read_obj(cur, depth),
            Some(b'"') => cur.read_str().map(Value::Str),
            Some(b'%') => cur.read_singleton(),
            Some(b'$') => self.read_ref(cur, depth),
            Some(c) if c.is_ascii_digit() || c == b'-' => cur.read_num(),
            Some(_) => Err(cur.error("unexpected character")),
            None => Err(cur.error("unexpected end of input")),
        }
    }

    fn read_arr(&self, cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
        cur.x += 1;
        let mut items = Vec::new();
        loop {
            cur.skip_whitespace();
            if cur.eat(b']') {
                return Ok(Value::Seq(items));
            }
            items.push(self.read_any(cur, depth + 1)?);
            cur.skip_whitespace();
            if !cur.eat(b',') {
                cur.expect(b']')?;
                return Ok(Value::Seq(items));
            }
        }
    }

    fn read_obj(&self, cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
        cur.x += 1;
        let mut pairs = Vec::new();
        loop {
            cur.skip_whitespace();
            if cur.eat(b'}') {
                return Ok(Value::Map(pairs));
            }
            let at = cur.x;
            let key = match self.read_any(cur, depth + 1)? {
                Value::Str(s) => s,
                other => {
                    return Err(Error::Syntax {
                        offset: at,
                        reason: format!("map keys must be strings, found {}", other.kind()),
                    })
                }
            };
            cur.skip_whitespace();
            cur.expect(b':')?;
            let value = self.read_any(cur, depth + 1)?;
            pairs.push((key, value));
            cur.skip_whitespace();
            if !cur.eat(b',') {
                cur.expect(b'}')?;
                return Ok(Value::Map(pairs));
            }
        }
    }

    fn read_ref(&self, cur: &mut Cursor<'_>, depth: usize) -> Result<Value> {
        let at = cur.x;
        cur.x += 1;
        let start = cur.x;
        while cur.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            cur.x += 1;
        }
        let data = cur.data;
        let name = std::str::from_utf8(&data[start..cur.x]).unwrap_or_default();
        if name.is_empty() {
            return Err(cur.error("expected a reference name after `$`"));
        }
        if cur.eat(b':') {
            if cur.names.iter().any(|(n, _)| *n == name) {
                return Err(Error::Syntax {
                    offset: at,
                    reason: format!("${name} is defined twice"),
                });
            }
            let slot = cur.names.len();
            cur.names.push((name, None));
            let value = self.read_any(cur, depth + 1)?;
            cur.names[slot].1 = Some(value.clone());
            return Ok(value);
        }
        match cur.names.iter().find(|(n, _)| *n == name) {
            Some((_, Some(value))) => Ok(value.clone()),
            Some((_, None)) => Err(Error::Syntax {
                offset: at,
                reason: format!("${name} is used inside its own definition"),
            }),
            None => Err(Error::Syntax {
                offset: at,
                reason: format!("${name} is not defined"),
            }),
        }
    }
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.x).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.x += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", c as char)))
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::Syntax {
            offset: self.x,
            reason: reason.to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.x += 1;
        }
    }

    fn read_num(&mut self) -> Result<Value> {
        let start = self.x;
        let negative = self.eat(b'-');
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => digits.push(c as char),
                b'_' => {}
                _ => break,
            }
            self.x += 1;
        }
        let bad = || Error::Syntax {
            offset: start,
            reason: "invalid integer".to_string(),
        };
        if digits.is_empty() {
            return Err(bad());
        }
        let magnitude: u64 = digits.parse().map_err(|_| bad())?;
        if !negative {
            return Ok(match i64::try_from(magnitude) {
                Ok(n) => Value::Int(n),
                Err(_) => Value::UInt(magnitude),
            });
        }
        let n = -i128::from(magnitude);
        i64::try_from(n).map(Value::Int).map_err(|_| bad())
    }

    fn read_singleton(&mut self) -> Result<Value> {
        self.x += 1;
        let value = match self.peek() {
            Some(b'n') => Value::Null,
            Some(b't') => Value::Bool(true),
            Some(b'f') => Value::Bool(false),
            _ => return Err(self.error("expected `n`, `t` or `f` after `%`")),
        };
        self.x += 1;
        Ok(value)
    }

    fn read_str(&mut self) -> Result<String> {
        let start = self.x;
        self.x += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Error::Syntax {
                        offset: start,
                        reason: "unterminated string".to_string(),
                    })
                }
                Some(b'"') => {
                    self.x += 1;
                    break;
                }
                Some(b'\\') => {
                    self.x += 1;
                    match self.peek() {
                        Some(c @ (b'"' | b'\\')) => out.push(c),
                        _ => return Err(self.error("unknown escape")),
                    }
                    self.x += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.x += 1;
                }
            }
        }
        // The input is a `&str` and escapes are ASCII, so this holds.
        String::from_utf8(out).map_err(|_| Error::InvalidUtf8 { offset: start })
    }
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.push_str("%n"),
        Value::Bool(true) => out.push_str("%t"),
        Value::Bool(false) => out.push_str("%f"),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::UInt(n) => out.push_str(&n.to_string()),
        Value::Str(s) => write_str(out, s),
        Value::Seq(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Map(pairs) => {
            out.push('{');
            for (i, (key, item)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_str(out, key);
                out.push_str(": ");
                write_value(out, item)?;
            }
            out.push('}');
        }
        other => {
            return Err(Error::InvalidValue(format!(
                "{} has no text form",
                other.kind()
            )))
        }
    }
    Ok(())
}

fn write_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms() {
        assert_eq!(decode_text("12").unwrap(), Value::Int(12));
        assert_eq!(decode_text(" -4 ").unwrap(), Value::Int(-4));
        assert_eq!(decode_text("1_000_000").unwrap(), Value::Int(1_000_000));
        assert_eq!(decode_text("18446744073709551615").unwrap(), Value::UInt(u64::MAX));
        assert_eq!(decode_text("-9223372036854775808").unwrap(), Value::Int(i64::MIN));
        assert_eq!(decode_text("%n").unwrap(), Value::Null);
        assert_eq!(decode_text("%t").unwrap(), Value::Bool(true));
        assert_eq!(decode_text("%f").unwrap(), Value::Bool(false));
        assert_eq!(decode_text(r#""a \"b\" \\ c""#).unwrap(), Value::from(r#"a "b" \ c"#));
        assert_eq!(decode_text("\"héllo\"").unwrap(), Value::from("héllo"));
    }

    #[test]
    fn composites() {
        assert_eq!(
            decode_text(r#"[1, "two", {"k": %t},]"#).unwrap(),
            Value::Seq(vec![
                Value::Int(1),
                Value::from("two"),
                Value::map([("k", Value::Bool(true))]),
            ])
        );
        assert_eq!(decode_text("[]").unwrap(), Value::Seq(vec![]));
        assert_eq!(decode_text("{ }").unwrap(), Value::Map(vec![]));
    }

    #[test]
    fn references_repeat_named_values() {
        let value = decode_text(r#"[$p:{"x": 1}, $p, [$p]]"#).unwrap();
        let p = Value::map([("x", Value::Int(1))]);
        assert_eq!(value, Value::Seq(vec![p.clone(), p.clone(), Value::Seq(vec![p])]));
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        let cases: &[(&str, usize)] = &[
            ("[1 2]", 3),
            ("{1: 2}", 1),
            ("\"open", 0),
            ("%x", 1),
            ("$q", 0),
            ("$a:[$a]", 4),
            ("[$a:1, $a:2]", 7),
            ("1 1", 2),
            ("-", 0),
            ("99999999999999999999", 0),
            ("-9223372036854775809", 0),
            ("", 0),
        ];
        for (input, expected) in cases {
            match decode_text(input) {
                Err(Error::Syntax { offset, .. }) => assert_eq!(offset, *expected, "{input}"),
                other => panic!("{input}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn encoding_reads_back() {
        let value = Value::map([
            ("list", Value::Seq(vec![Value::Int(-3), Value::UInt(u64::MAX), Value::Null])),
            ("quote", Value::from("say \"hi\"")),
            ("flag", Value::Bool(false)),
        ]);
        let text = encode_text(&value).unwrap();
        assert_eq!(
            text,
            r#"{"list": [-3, 18446744073709551615, %n], "quote": "say \"hi\"", "flag": %f}"#
        );
        assert_eq!(decode_text(&text).unwrap(), value);
        assert!(matches!(
            encode_text(&Value::Float(1.5)),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}{}", "[".repeat(100), "]".repeat(100));
        assert!(matches!(
            decode_text(&deep),
            Err(Error::LimitExceeded { .. })
        ));
    }
}
