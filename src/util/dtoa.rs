//! Double to ASCII conversion
//!
//! Functions for converting floating-point numbers to strings the way
//! `Number.prototype.toString` and friends require.

/// Convert a 32-bit signed integer to decimal string
///
/// Returns the number of characters written.
pub fn i32_to_str(buf: &mut [u8], val: i32) -> usize {
    if buf.is_empty() {
        return 0;
    }

    let mut i = 0;
    if val < 0 {
        buf[i] = b'-';
        i += 1;
    }

    // Work on the magnitude as u32 so i32::MIN does not overflow
    let mut mag = val.unsigned_abs();
    let start = i;
    loop {
        if i >= buf.len() {
            break;
        }
        buf[i] = b'0' + (mag % 10) as u8;
        i += 1;
        mag /= 10;
        if mag == 0 {
            break;
        }
    }

    buf[start..i].reverse();
    i
}

/// Convert an unsigned integer to string with given radix (2-36)
pub fn u64_to_str_radix(buf: &mut [u8], mut val: u64, radix: u32) -> usize {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if buf.is_empty() || !(2..=36).contains(&radix) {
        return 0;
    }

    let mut i = 0;
    loop {
        if i >= buf.len() {
            break;
        }
        buf[i] = DIGITS[(val % radix as u64) as usize];
        i += 1;
        val /= radix as u64;
        if val == 0 {
            break;
        }
    }

    buf[..i].reverse();
    i
}

/// Format a number using the shortest round-trip digits
///
/// Integers below 1e21 print without exponent, tiny magnitudes switch to
/// exponent form below 1e-6.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
        let mut buf = [0u8; 12];
        let n = i32_to_str(&mut buf, value as i32);
        return String::from_utf8_lossy(&buf[..n]).into_owned();
    }

    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }

    // `{:e}` yields the shortest digits that round-trip, e.g. "1.2345e3"
    let formatted = format!("{:e}", value.abs());
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat_n('0', (n - k) as usize));
    } else if 0 < n && n <= 21 {
        out.push_str(&digits[..n as usize]);
        out.push('.');
        out.push_str(&digits[n as usize..]);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-n) as usize));
        out.push_str(&digits);
    } else {
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if n - 1 >= 0 { '+' } else { '-' });
        out.push_str(&(n - 1).abs().to_string());
    }
    out
}

/// Format with a fixed number of fraction digits (`toFixed`)
pub fn number_to_fixed(value: f64, digits: usize) -> String {
    if !value.is_finite() || value.abs() >= 1e21 {
        return number_to_string(value);
    }
    let formatted = format!("{:.*}", digits, value);
    // -0.00 prints as 0.00
    if formatted.starts_with('-') && formatted[1..].chars().all(|c| c == '0' || c == '.') {
        return formatted[1..].to_string();
    }
    formatted
}

/// Format in an arbitrary radix (`toString(radix)`)
pub fn number_to_radix_string(value: f64, radix: u32) -> String {
    if radix == 10 || !value.is_finite() {
        return number_to_string(value);
    }

    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }
    let magnitude = value.abs();
    let integer = magnitude.trunc();

    let mut buf = [0u8; 72];
    let n = u64_to_str_radix(&mut buf, integer as u64, radix);
    out.push_str(&String::from_utf8_lossy(&buf[..n]));

    let mut fraction = magnitude - integer;
    if fraction > 0.0 {
        const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        out.push('.');
        // 52 bits of mantissa are exhausted well before 52 digits in any radix
        for _ in 0..52 {
            fraction *= radix as f64;
            let digit = fraction.trunc() as usize;
            out.push(DIGITS[digit] as char);
            fraction -= digit as f64;
            if fraction == 0.0 {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i32_to_str() {
        let mut buf = [0u8; 32];

        let n = i32_to_str(&mut buf, 0);
        assert_eq!(&buf[..n], b"0");

        let n = i32_to_str(&mut buf, 42);
        assert_eq!(&buf[..n], b"42");

        let n = i32_to_str(&mut buf, -123);
        assert_eq!(&buf[..n], b"-123");

        let n = i32_to_str(&mut buf, i32::MIN);
        assert_eq!(&buf[..n], b"-2147483648");
    }

    #[test]
    fn test_u64_to_str_radix() {
        let mut buf = [0u8; 64];

        let n = u64_to_str_radix(&mut buf, 255, 16);
        assert_eq!(&buf[..n], b"ff");

        let n = u64_to_str_radix(&mut buf, 255, 2);
        assert_eq!(&buf[..n], b"11111111");

        let n = u64_to_str_radix(&mut buf, 35, 36);
        assert_eq!(&buf[..n], b"z");
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(25.0), "25");
        assert_eq!(number_to_string(-7.0), "-7");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(25.8), "25.8");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012.0), "123456789012");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(-0.0), "0");
    }

    #[test]
    fn test_fixed_and_radix() {
        assert_eq!(number_to_fixed(3.14159, 2), "3.14");
        assert_eq!(number_to_fixed(-0.001, 2), "0.00");
        assert_eq!(number_to_radix_string(255.0, 16), "ff");
        assert_eq!(number_to_radix_string(-8.0, 2), "-1000");
        assert_eq!(number_to_radix_string(0.5, 2), "0.1");
    }
}
