//! `JSON.parse` and `JSON.stringify`

use crate::builtins::method;
use crate::gc::ObjectRef;
use crate::isolate::Isolate;
use crate::parser::MAX_NESTING_DEPTH;
use crate::runtime::function::CallInfo;
use crate::runtime::object::{ClassId, JsObject, ObjectKind};
use crate::runtime::value::JsValue;
use crate::util::{dtoa, unicode};
use crate::vm::{ErrorKind, JsResult};

pub(super) fn install(isolate: &Isolate) {
    let json = isolate.alloc(JsObject::ordinary(Some(isolate.realm().object_proto)));
    isolate.define_property(isolate.global(), "JSON", JsValue::Object(json), false);
    method(isolate, json, "parse", parse, 2);
    method(isolate, json, "stringify", stringify, 3);
}

/// Quote a string as a JSON string literal
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn parse(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let text = isolate.to_string(&info.arg(0))?;
    parse_text(isolate, &text)
}

/// Parse JSON text into script values
pub(crate) fn parse_text(isolate: &Isolate, text: &str) -> JsResult<JsValue> {
    let mut parser = JsonParser {
        isolate,
        text,
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < text.len() {
        return Err(parser.unexpected());
    }
    Ok(value)
}

struct JsonParser<'a> {
    isolate: &'a Isolate,
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl JsonParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn unexpected(&self) -> crate::vm::Exception {
        let message = match self.text[self.pos..].chars().next() {
            Some(c) => format!(
                "Unexpected token '{}', \"{}\" is not valid JSON",
                c,
                self.text.chars().take(32).collect::<String>()
            ),
            None => "Unexpected end of JSON input".to_string(),
        };
        self.isolate.error(ErrorKind::SyntaxError, &message)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, literal: &str) -> JsResult<()> {
        if self.text[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_value(&mut self) -> JsResult<JsValue> {
        match self.peek() {
            Some(b'{') => self.nested(Self::parse_object),
            Some(b'[') => self.nested(Self::parse_array),
            Some(b'"') => Ok(JsValue::from(self.parse_string()?)),
            Some(b't') => self.expect("true").map(|_| JsValue::Bool(true)),
            Some(b'f') => self.expect("false").map(|_| JsValue::Bool(false)),
            Some(b'n') => self.expect("null").map(|_| JsValue::Null),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            _ => Err(self.unexpected()),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> JsResult<JsValue>) -> JsResult<JsValue> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.isolate.error(ErrorKind::RangeError, "too much recursion"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_object(&mut self) -> JsResult<JsValue> {
        self.pos += 1;
        let object = self.isolate.new_object();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(JsValue::Object(object));
        }
        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.unexpected());
            }
            let key = self.parse_string()?;
            self.skip_whitespace();
            self.expect(":")?;
            self.skip_whitespace();
            let value = self.parse_value()?;
            self.isolate.set_property(object, &key, value)?;
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(JsValue::Object(object));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn parse_array(&mut self) -> JsResult<JsValue> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(JsValue::Object(self.isolate.new_array(items)));
        }
        loop {
            self.skip_whitespace();
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(JsValue::Object(self.isolate.new_array(items)));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn parse_string(&mut self) -> JsResult<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.text[self.pos..].chars().next() else {
                return Err(self.unexpected());
            };
            match c {
                '"' => {
                    self.pos += 1;
                    return Ok(out);
                }
                '\\' => {
                    self.pos += 1;
                    let escape = self.peek().ok_or_else(|| self.unexpected())?;
                    self.pos += 1;
                    match escape {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => {
                            let high = self.parse_hex4()?;
                            let mut code = high;
                            if (0xD800..0xDC00).contains(&high)
                                && self.text[self.pos..].starts_with("\\u")
                            {
                                let save = self.pos;
                                self.pos += 2;
                                let low = self.parse_hex4()?;
                                match unicode::combine_surrogates(high, low) {
                                    Some(combined) => code = combined,
                                    None => self.pos = save,
                                }
                            }
                            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                        _ => {
                            self.pos -= 1;
                            return Err(self.unexpected());
                        }
                    }
                }
                c if (c as u32) < 0x20 => return Err(self.unexpected()),
                c => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn parse_hex4(&mut self) -> JsResult<u32> {
        let digits = self.text.get(self.pos..self.pos + 4).ok_or_else(|| self.unexpected())?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.unexpected())?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(self.unexpected());
        }
        self.pos += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> JsResult<JsValue> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.skip_digits(),
            _ => return Err(self.unexpected()),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.unexpected());
            }
            self.skip_digits();
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.unexpected());
            }
            self.skip_digits();
        }
        let n = self.text[start..self.pos].parse::<f64>().map_err(|_| self.unexpected())?;
        Ok(JsValue::Number(n))
    }

    fn skip_digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }
}

fn stringify(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let gap = match info.arg(2) {
        JsValue::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        JsValue::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let mut serializer = Serializer {
        isolate,
        gap,
        indent: String::new(),
        stack: Vec::new(),
    };
    match serializer.serialize(info.arg(0))? {
        Some(text) => isolate.checked_string(text),
        None => Ok(JsValue::Undefined),
    }
}

struct Serializer<'a> {
    isolate: &'a Isolate,
    gap: String,
    indent: String,
    /// Objects being serialized, for cycle detection
    stack: Vec<ObjectRef>,
}

impl Serializer<'_> {
    /// `None` for values JSON omits (undefined, functions)
    fn serialize(&mut self, value: JsValue) -> JsResult<Option<String>> {
        let isolate = self.isolate;
        let mut value = value;
        if let JsValue::Object(r) = value {
            let to_json = isolate.get_property(r, "toJSON");
            if isolate.is_callable(&to_json) {
                value = isolate.call(&to_json, value.clone(), &[])?;
            }
        }
        if let JsValue::Object(r) = value {
            let boxed = isolate.with_object(r, |o| match &o.kind {
                ObjectKind::Primitive(primitive) => Some(primitive.clone()),
                _ => None,
            });
            if let Some(primitive) = boxed {
                value = primitive;
            }
        }
        Ok(Some(match &value {
            JsValue::Undefined => return Ok(None),
            JsValue::Null => "null".to_string(),
            JsValue::Bool(b) => b.to_string(),
            JsValue::Number(n) if n.is_finite() => dtoa::number_to_string(*n),
            JsValue::Number(_) => "null".to_string(),
            JsValue::String(s) => quote(s),
            JsValue::Object(_) if isolate.is_callable(&value) => return Ok(None),
            &JsValue::Object(r) => {
                if self.stack.contains(&r) {
                    return Err(isolate.type_error("Converting circular structure to JSON"));
                }
                if self.stack.len() >= MAX_NESTING_DEPTH {
                    return Err(isolate.error(ErrorKind::RangeError, "too much recursion"));
                }
                self.stack.push(r);
                let outer = self.indent.clone();
                self.indent.push_str(&self.gap);
                let result = if isolate.class_of(r) == ClassId::Array {
                    self.serialize_array(r)
                } else {
                    self.serialize_object(r)
                };
                self.indent = outer;
                self.stack.pop();
                result?
            }
        }))
    }

    fn wrap(&self, open: char, parts: Vec<String>, close: char) -> String {
        if parts.is_empty() {
            return format!("{}{}", open, close);
        }
        if self.gap.is_empty() {
            return format!("{}{}{}", open, parts.join(","), close);
        }
        let outer = &self.indent[..self.indent.len() - self.gap.len()];
        let separator = format!(",\n{}", self.indent);
        format!("{}\n{}{}\n{}{}", open, self.indent, parts.join(&separator), outer, close)
    }

    fn serialize_array(&mut self, r: ObjectRef) -> JsResult<String> {
        let mut parts = Vec::new();
        let mut index = 0;
        while let Some(item) = self
            .isolate
            .with_object(r, |o| o.elements().and_then(|e| e.get(index).cloned()))
        {
            parts.push(self.serialize(item)?.unwrap_or_else(|| "null".to_string()));
            index += 1;
        }
        Ok(self.wrap('[', parts, ']'))
    }

    fn serialize_object(&mut self, r: ObjectRef) -> JsResult<String> {
        let mut parts = Vec::new();
        let colon = if self.gap.is_empty() { ":" } else { ": " };
        for key in self.isolate.own_keys(r) {
            let value = self.isolate.get_property(r, &key);
            if let Some(text) = self.serialize(value)? {
                parts.push(format!("{}{}{}", quote(&key), colon, text));
            }
        }
        Ok(self.wrap('{', parts, '}'))
    }
}

#[cfg(test)]
mod tests {
    use super::quote;
    use crate::config::Config;
    use crate::isolate::Isolate;

    fn eval(code: &str) -> String {
        let isolate = Isolate::new(Config::default());
        let value = isolate.run_script("json.js", code).unwrap();
        isolate.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a\"b\\c\n\u{1}"), r#""a\"b\\c\n\u0001""#);
    }

    #[test]
    fn test_stringify() {
        assert_eq!(
            eval("JSON.stringify({a: 1, b: [true, null, 'x'], c: undefined, d: function () {}})"),
            r#"{"a":1,"b":[true,null,"x"]}"#
        );
        assert_eq!(eval("JSON.stringify([undefined, NaN])"), "[null,null]");
        assert_eq!(eval("typeof JSON.stringify(undefined)"), "undefined");
        assert_eq!(eval("JSON.stringify({a: [1]}, null, 2)"), "{\n  \"a\": [\n    1\n  ]\n}");
        assert_eq!(
            eval("JSON.stringify({toJSON: function () { return 'custom'; }})"),
            r#""custom""#
        );
        assert_eq!(eval("JSON.stringify(new String('s'))"), r#""s""#);
    }

    #[test]
    fn test_stringify_cycle() {
        let isolate = Isolate::new(Config::default());
        let err = isolate
            .run_script("json.js", "var o = {}; o.self = o; JSON.stringify(o)")
            .unwrap_err();
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("Converting circular structure to JSON"));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            eval(
                "var v = JSON.parse('{\"a\": [1, 2.5e1, -3], \"b\": {\"c\": null}}'); \
                 v.a[1] + v.a[2]"
            ),
            "22"
        );
        assert_eq!(eval("JSON.parse('\"\\\\u0041\\\\n\"')"), "A\n");
        assert_eq!(eval("JSON.parse(' true ')"), "true");
        assert_eq!(eval("JSON.stringify(JSON.parse('{\"k\":[{}]}'))"), r#"{"k":[{}]}"#);
    }

    #[test]
    fn test_nesting_limit() {
        let isolate = Isolate::new(Config::default());
        let deep = format!("{}{}", "[".repeat(100_000), "]".repeat(100_000));
        let script = format!("JSON.parse('{}')", deep);
        let err = isolate.run_script("json.js", &script).unwrap_err();
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("too much recursion"));

        let built = "var a = []; for (var i = 0; i < 100000; i++) a = [a]; JSON.stringify(a)";
        let err = isolate.run_script("json.js", built).unwrap_err();
        let name = isolate.get(&err.value, "name").unwrap();
        assert_eq!(name.as_str(), Some("RangeError"));

        assert_eq!(eval("JSON.stringify(JSON.parse('[[[[1]]]]'))"), "[[[[1]]]]");
    }

    #[test]
    fn test_parse_errors() {
        let isolate = Isolate::new(Config::default());
        for bad in ["'{'", "'[1,]'", "'01'", "'{a:1}'", "'\"abc'", "''"] {
            let err = isolate.run_script("json.js", &format!("JSON.parse({})", bad)).unwrap_err();
            let name = isolate.get(&err.value, "name").unwrap();
            assert_eq!(name.as_str(), Some("SyntaxError"), "input {}", bad);
        }
    }
}
