//! Utility functions
//!
//! Number formatting and UTF-8/UTF-16 helpers shared by the lexer, the
//! builtins and the value boundary.

pub mod dtoa;
pub mod unicode;

/// Decode a UTF-8 character from bytes
///
/// Returns (code point, bytes consumed) or None if invalid.
pub fn unicode_from_utf8(buf: &[u8]) -> Option<(u32, usize)> {
    let b0 = *buf.first()?;
    if b0 < 0x80 {
        return Some((b0 as u32, 1));
    }

    if !(0xC0..0xF8).contains(&b0) {
        return None; // Invalid start byte
    }

    let (len, min_cp) = if b0 < 0xE0 {
        (2, 0x80)
    } else if b0 < 0xF0 {
        (3, 0x800)
    } else {
        (4, 0x10000)
    };

    if buf.len() < len {
        return None;
    }

    // Check continuation bytes
    for byte in buf.iter().take(len).skip(1) {
        if byte & 0xC0 != 0x80 {
            return None;
        }
    }

    let cp = match len {
        2 => ((b0 & 0x1F) as u32) << 6 | (buf[1] & 0x3F) as u32,
        3 => ((b0 & 0x0F) as u32) << 12 | ((buf[1] & 0x3F) as u32) << 6 | (buf[2] & 0x3F) as u32,
        _ => {
            ((b0 & 0x07) as u32) << 18
                | ((buf[1] & 0x3F) as u32) << 12
                | ((buf[2] & 0x3F) as u32) << 6
                | (buf[3] & 0x3F) as u32
        }
    };

    // Overlong encodings and out-of-range code points
    if cp < min_cp || cp > 0x10FFFF {
        return None;
    }

    Some((cp, len))
}
