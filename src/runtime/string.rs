//! String conversions
//!
//! Canonical array index detection and the string-to-number grammar used
//! by `ToNumber`, `parseInt` and `parseFloat`.

use crate::util::unicode;

/// Parse a canonical array index ("0", "17", but not "017" or "-1")
pub fn array_index(key: &str) -> Option<u32> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    if bytes[0] == b'0' && bytes.len() > 1 {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value: u64 = key.parse().ok()?;
    // 2^32 - 1 is the array length limit, not a valid index
    if value >= u32::MAX as u64 {
        return None;
    }
    Some(value as u32)
}

/// Trim JS whitespace and line terminators from both ends
pub fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| unicode::is_whitespace(c as u32))
}

/// StringToNumber: `NaN` unless the whole trimmed string is numeric
pub fn string_to_number(s: &str) -> f64 {
    let s = trim(s);
    if s.is_empty() {
        return 0.0;
    }
    let (sign, body) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    if body == "Infinity" {
        return sign * f64::INFINITY;
    }
    if body.len() > 2 && sign > 0.0 && s.len() == body.len() {
        let radix = match &body[..2] {
            "0x" | "0X" => Some(16),
            "0o" | "0O" => Some(8),
            "0b" | "0B" => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            return parse_integer_digits(&body[2..], radix).unwrap_or(f64::NAN);
        }
    }
    if !is_decimal_literal(body) {
        return f64::NAN;
    }
    body.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// Digits, an optional fraction and an optional exponent, nothing else.
/// Rust's float parser also accepts "inf" and "nan", which JS does not.
fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return false;
        }
    }
    i == bytes.len()
}

/// Every character must be a digit of `radix`
fn parse_integer_digits(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    let mut value = 0.0;
    for c in digits.chars() {
        value = value * radix as f64 + c.to_digit(radix)? as f64;
    }
    Some(value)
}

/// `parseInt`: longest valid prefix in the given radix
pub fn parse_int(s: &str, radix: Option<u32>) -> f64 {
    let s = trim(s);
    let (sign, mut body) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    // 0 means no radix was given
    let mut radix = radix.unwrap_or(0);
    if (radix == 0 || radix == 16) && (body.starts_with("0x") || body.starts_with("0X")) {
        radix = 16;
        body = &body[2..];
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let end = body
        .char_indices()
        .find(|(_, c)| c.to_digit(radix).is_none())
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    parse_integer_digits(&body[..end], radix)
        .map(|n| sign * n)
        .unwrap_or(f64::NAN)
}

/// `parseFloat`: longest decimal prefix
pub fn parse_float(s: &str) -> f64 {
    let s = trim(s);
    let (sign, body) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    if body.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }
    let mut end = 0;
    for i in (1..=body.len()).rev() {
        if body.is_char_boundary(i) && is_decimal_literal(&body[..i]) {
            end = i;
            break;
        }
    }
    if end == 0 {
        return f64::NAN;
    }
    body[..end].parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_index() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("017"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("1.5"), None);
        assert_eq!(array_index("4294967295"), None);
        assert_eq!(array_index(""), None);
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("-1.5e2"), -150.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number(".5"), 0.5);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("nan").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("1e").is_nan());
    }

    #[test]
    fn test_parse_int_and_float() {
        assert_eq!(parse_int("12px", None), 12.0);
        assert_eq!(parse_int("-0x10", None), -16.0);
        assert_eq!(parse_int("ff", Some(16)), 255.0);
        assert_eq!(parse_int("0x10", Some(10)), 0.0);
        assert!(parse_int("px", None).is_nan());
        assert_eq!(parse_float("3.25abc"), 3.25);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert!(parse_float("abc").is_nan());
    }
}
