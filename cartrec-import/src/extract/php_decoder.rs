//! Legacy PHP-serialized map decoding strategy (second in the chain)
//!
//! The upstream platform persists cart contents with PHP `serialize()`: a
//! length-prefixed, typed key/value encoding. This parser handles the shapes
//! that occur in checkout data: null, bool, int, float, byte string, array
//! (map), and object. Byte strings are normalized to text lossily; objects
//! are flattened into plain mappings, dropping the class name.
//!
//! String lengths are byte lengths, so parsing runs over raw bytes.

use serde_json::{Map, Number, Value};

/// Decode a PHP-serialized blob. None on any structural mismatch,
/// including trailing garbage.
pub fn decode(blob: &str) -> Option<Value> {
    let mut parser = Parser {
        bytes: blob.as_bytes(),
        pos: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos == parser.bytes.len() {
        Some(value)
    } else {
        None
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_value(&mut self) -> Option<Value> {
        match self.peek()? {
            b'N' => {
                self.expect(b"N;")?;
                Some(Value::Null)
            }
            b'b' => {
                self.expect(b"b:")?;
                let flag = self.take()?;
                self.expect(b";")?;
                match flag {
                    b'0' => Some(Value::Bool(false)),
                    b'1' => Some(Value::Bool(true)),
                    _ => None,
                }
            }
            b'i' => {
                self.expect(b"i:")?;
                let n = self.parse_int()?;
                self.expect(b";")?;
                Some(Value::Number(Number::from(n)))
            }
            b'd' => {
                self.expect(b"d:")?;
                let raw = self.take_until(b';')?;
                self.expect(b";")?;
                let f: f64 = std::str::from_utf8(raw).ok()?.parse().ok()?;
                Number::from_f64(f).map(Value::Number)
            }
            b's' => {
                self.expect(b"s:")?;
                let text = self.parse_string_body()?;
                self.expect(b";")?;
                Some(Value::String(text))
            }
            b'a' => {
                self.expect(b"a:")?;
                let count = self.parse_len()?;
                self.expect(b":{")?;
                let map = self.parse_entries(count)?;
                self.expect(b"}")?;
                Some(Value::Object(map))
            }
            b'O' => {
                // O:len:"ClassName":count:{...} flattened to a plain map
                self.expect(b"O:")?;
                let _class = self.parse_string_header()?;
                self.expect(b":")?;
                let count = self.parse_len()?;
                self.expect(b":{")?;
                let map = self.parse_entries(count)?;
                self.expect(b"}")?;
                Some(Value::Object(map))
            }
            _ => None,
        }
    }

    fn parse_entries(&mut self, count: usize) -> Option<Map<String, Value>> {
        let mut map = Map::new();
        for _ in 0..count {
            let key = match self.parse_value()? {
                Value::String(s) => normalize_property_name(&s),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let value = self.parse_value()?;
            map.insert(key, value);
        }
        Some(map)
    }

    /// `LEN:"<LEN bytes>"` with a byte-exact length prefix
    fn parse_string_header(&mut self) -> Option<String> {
        let len = self.parse_len()?;
        self.expect(b":\"")?;
        let end = self.pos.checked_add(len)?;
        let raw = self.bytes.get(self.pos..end)?;
        self.pos = end;
        self.expect(b"\"")?;
        Some(String::from_utf8_lossy(raw).into_owned())
    }

    fn parse_string_body(&mut self) -> Option<String> {
        self.parse_string_header()
    }

    fn parse_int(&mut self) -> Option<i64> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    fn parse_len(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn take(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn take_until(&mut self, stop: u8) -> Option<&'a [u8]> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b != stop) {
            self.pos += 1;
        }
        self.peek()?;
        Some(&self.bytes[start..self.pos])
    }

    fn expect(&mut self, literal: &[u8]) -> Option<()> {
        if self.bytes[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Some(())
        } else {
            None
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }
}

/// PHP mangles private/protected property names with NUL-separated class
/// prefixes; keep only the bare name.
fn normalize_property_name(name: &str) -> String {
    name.rsplit('\0').next().unwrap_or(name).to_string()
}
