//! Unicode utilities
//!
//! String handling with UTF-8 and UTF-16 support.

/// Check if a code point is a line terminator
#[inline]
pub fn is_line_terminator(c: u32) -> bool {
    matches!(c, 0x000A | 0x000D | 0x2028 | 0x2029)
}

/// Check if a code point is whitespace
#[inline]
pub fn is_whitespace(c: u32) -> bool {
    matches!(
        c,
        0x0009  // Tab
        | 0x000B // Vertical Tab
        | 0x000C // Form Feed
        | 0x0020 // Space
        | 0x00A0 // No-Break Space
        | 0xFEFF // BOM
    ) || is_line_terminator(c)
        || is_unicode_space(c)
}

/// Check if a code point is a Unicode space character
#[inline]
pub fn is_unicode_space(c: u32) -> bool {
    matches!(c, 0x1680 | 0x2000..=0x200A | 0x202F | 0x205F | 0x3000)
}

/// Check if a code point can start an identifier
#[inline]
pub fn is_id_start(c: u32) -> bool {
    matches!(c, 0x61..=0x7A | 0x41..=0x5A | 0x5F | 0x24) // a-z, A-Z, _, $
        || (c >= 0x80 && is_unicode_id_start(c))
}

/// Check if a code point can continue an identifier
#[inline]
pub fn is_id_continue(c: u32) -> bool {
    matches!(c, 0x61..=0x7A | 0x41..=0x5A | 0x30..=0x39 | 0x5F | 0x24) // a-z, A-Z, 0-9, _, $
        || (c >= 0x80 && is_unicode_id_continue(c))
}

/// Check Unicode ID_Start property (simplified)
fn is_unicode_id_start(c: u32) -> bool {
    // Simplified check - in a full implementation, we'd use Unicode tables
    matches!(c, 0x00C0..=0x00D6 | 0x00D8..=0x00F6 | 0x00F8..=0x00FF)
}

/// Check Unicode ID_Continue property (simplified)
fn is_unicode_id_continue(c: u32) -> bool {
    is_unicode_id_start(c) || matches!(c, 0x0300..=0x036F)
}

/// Get UTF-16 length from UTF-8 string
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(|c| c.len_utf16()).sum()
}

/// Convert UTF-8 index to UTF-16 index
pub fn utf8_to_utf16_index(s: &str, utf8_index: usize) -> usize {
    s[..utf8_index].chars().map(|c| c.len_utf16()).sum()
}

/// Convert UTF-16 index to UTF-8 index
pub fn utf16_to_utf8_index(s: &str, utf16_index: usize) -> usize {
    let mut utf16_pos = 0;
    for (utf8_pos, c) in s.char_indices() {
        if utf16_pos >= utf16_index {
            return utf8_pos;
        }
        utf16_pos += c.len_utf16();
    }
    s.len()
}

/// Slice a string by UTF-16 code unit offsets
///
/// Offsets that fall inside a surrogate pair are moved past the
/// pair; out-of-range offsets are clamped.
pub fn utf16_substring(s: &str, start: usize, end: usize) -> &str {
    let end = end.max(start);
    let from = utf16_to_utf8_index(s, start);
    let to = utf16_to_utf8_index(s, end);
    &s[from..to]
}

/// Combine a UTF-16 surrogate pair into a code point
#[inline]
pub fn combine_surrogates(high: u32, low: u32) -> Option<u32> {
    if (0xD800..0xDC00).contains(&high) && (0xDC00..0xE000).contains(&low) {
        Some(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
    } else {
        None
    }
}

/// Get a character at UTF-16 index
pub fn char_at_utf16(s: &str, utf16_index: usize) -> Option<char> {
    let mut utf16_pos = 0;
    for c in s.chars() {
        if utf16_pos == utf16_index {
            return Some(c);
        }
        utf16_pos += c.len_utf16();
        if utf16_pos > utf16_index {
            // We're in the middle of a surrogate pair
            return None;
        }
    }
    None
}

/// Get code unit at UTF-16 index (returns surrogate if needed)
pub fn code_unit_at_utf16(s: &str, utf16_index: usize) -> Option<u16> {
    let mut utf16_pos = 0;
    for c in s.chars() {
        let len = c.len_utf16();
        if utf16_pos == utf16_index {
            if len == 1 {
                return Some(c as u16);
            } else {
                // Return high surrogate
                let code = c as u32;
                return Some((0xD800 + ((code - 0x10000) >> 10)) as u16);
            }
        } else if utf16_pos + 1 == utf16_index && len == 2 {
            // Return low surrogate
            let code = c as u32;
            return Some((0xDC00 + ((code - 0x10000) & 0x3FF)) as u16);
        }
        utf16_pos += len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // "a", U+4E2D (one unit, three bytes), U+1F600 (two units, four bytes), "b"
    const MIXED: &str = "a\u{4E2D}\u{1F600}b";

    #[test]
    fn test_utf16_len() {
        assert_eq!(utf16_len("hello"), 5);
        assert_eq!(utf16_len("\u{4E2D}\u{6587}"), 2);
        assert_eq!(utf16_len("\u{1F600}"), 2);
        assert_eq!(utf16_len(MIXED), 5);
        assert_eq!(utf16_len(""), 0);
    }

    #[test]
    fn test_utf16_index_conversion() {
        assert_eq!(utf8_to_utf16_index(MIXED, 0), 0);
        assert_eq!(utf8_to_utf16_index(MIXED, 1), 1);
        assert_eq!(utf8_to_utf16_index(MIXED, 4), 2);
        assert_eq!(utf8_to_utf16_index(MIXED, 8), 4);
        assert_eq!(utf8_to_utf16_index(MIXED, MIXED.len()), 5);

        assert_eq!(utf16_to_utf8_index(MIXED, 0), 0);
        assert_eq!(utf16_to_utf8_index(MIXED, 1), 1);
        assert_eq!(utf16_to_utf8_index(MIXED, 2), 4);
        assert_eq!(utf16_to_utf8_index(MIXED, 4), 8);
        // the low half of a pair maps past the pair
        assert_eq!(utf16_to_utf8_index(MIXED, 3), 8);
        assert_eq!(utf16_to_utf8_index(MIXED, 99), MIXED.len());
    }

    #[test]
    fn test_utf16_substring() {
        let s = "a\u{1F600}bc";
        assert_eq!(utf16_substring(s, 0, 1), "a");
        assert_eq!(utf16_substring(s, 1, 3), "\u{1F600}");
        assert_eq!(utf16_substring(s, 3, 99), "bc");
        assert_eq!(utf16_substring(s, 4, 2), "");
    }

    #[test]
    fn test_combine_surrogates() {
        assert_eq!(combine_surrogates(0xD83D, 0xDE00), Some(0x1F600));
        assert_eq!(combine_surrogates(0x41, 0xDE00), None);
        assert_eq!(combine_surrogates(0xDE00, 0xD83D), None);
    }

    #[test]
    fn test_char_at() {
        assert_eq!(char_at_utf16(MIXED, 0), Some('a'));
        assert_eq!(char_at_utf16(MIXED, 1), Some('\u{4E2D}'));
        assert_eq!(char_at_utf16(MIXED, 2), Some('\u{1F600}'));
        assert_eq!(char_at_utf16(MIXED, 3), None);
        assert_eq!(char_at_utf16(MIXED, 4), Some('b'));
        assert_eq!(char_at_utf16(MIXED, 5), None);
    }

    #[test]
    fn test_code_unit_at() {
        assert_eq!(code_unit_at_utf16(MIXED, 0), Some(b'a' as u16));
        assert_eq!(code_unit_at_utf16(MIXED, 1), Some(0x4E2D));
        assert_eq!(code_unit_at_utf16(MIXED, 2), Some(0xD83D));
        assert_eq!(code_unit_at_utf16(MIXED, 3), Some(0xDE00));
        assert_eq!(code_unit_at_utf16(MIXED, 4), Some(b'b' as u16));
        assert_eq!(code_unit_at_utf16(MIXED, 5), None);
    }

    #[test]
    fn test_whitespace_and_identifiers() {
        for c in ['\t', ' ', '\u{A0}', '\u{FEFF}', '\u{2028}', '\u{3000}'] {
            assert!(is_whitespace(c as u32), "{:?}", c);
        }
        assert!(!is_whitespace('x' as u32));
        assert!(is_line_terminator(0x2029));
        assert!(!is_line_terminator(0x20));

        assert!(is_id_start('$' as u32));
        assert!(is_id_start('\u{E9}' as u32));
        assert!(!is_id_start('1' as u32));
        assert!(is_id_continue('1' as u32));
        assert!(is_id_continue(0x0301));
    }
}
