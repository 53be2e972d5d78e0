//! Byte-level value helpers shared by every G-code's hand-written `parse`.
//!
//! Every function here follows the same calling convention: take the
//! unconsumed tail of the line, return `(result, rest)`. On failure `rest`
//! is always the input unchanged, so a caller can always fall back to
//! trying the next recognizer (or declaring the whole line malformed)
//! without having lost its place.

/// Bound on the scratch buffer [`parse_float`] copies its input into before
/// handing it to the floating point parser. Kept small and on the stack, as
/// in the original `sscanf`-based implementation this replaces.
pub const FLOAT_PARSE_BUF_SIZE: usize = 32;

/// Returns the tail of `input` with leading ASCII whitespace removed.
pub fn gobble_whitespace(input: &[u8]) -> &[u8] {
    let idx = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    &input[idx..]
}

/// If `input` begins with `literal`, returns the tail past it; otherwise
/// returns `input` unchanged. Never reads past `input`'s bounds.
pub fn prefix_matches<'a>(input: &'a [u8], literal: &[u8]) -> &'a [u8] {
    if input.len() >= literal.len() && &input[..literal.len()] == literal {
        &input[literal.len()..]
    } else {
        input
    }
}

/// Parses an unsigned decimal integer. Succeeds only if at least one digit
/// is consumed and the next byte after the digits is whitespace -- a
/// trailing `'.'` or letter means the token wasn't really a bare integer.
pub fn parse_uint(input: &[u8]) -> (Option<u32>, &[u8]) {
    let mut idx = 0;
    let mut value: u32 = 0;
    let mut any = false;
    while idx < input.len() && input[idx].is_ascii_digit() {
        let digit = u32::from(input[idx] - b'0');
        value = match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
            Some(v) => v,
            None => return (None, input),
        };
        any = true;
        idx += 1;
    }
    if !any || idx >= input.len() || !input[idx].is_ascii_whitespace() {
        return (None, input);
    }
    (Some(value), &input[idx..])
}

/// Parses a signed decimal integer with the same trailing-whitespace
/// requirement as [`parse_uint`].
pub fn parse_int(input: &[u8]) -> (Option<i32>, &[u8]) {
    let (negative, rest) = match input.first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    let mut idx = 0;
    let mut value: i32 = 0;
    let mut any = false;
    while idx < rest.len() && rest[idx].is_ascii_digit() {
        let digit = i32::from(rest[idx] - b'0');
        value = match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
            Some(v) => v,
            None => return (None, input),
        };
        any = true;
        idx += 1;
    }
    if !any || idx >= rest.len() || !rest[idx].is_ascii_whitespace() {
        return (None, input);
    }
    let value = if negative { -value } else { value };
    (Some(value), &rest[idx..])
}

/// Parses a floating point value into a bounded stack buffer before calling
/// into `f32::from_str`, mirroring the original's `sscanf` workaround.
/// Still requires the token to be followed by whitespace, which is what
/// keeps a malformed decimal (`1.2.3`) from being accepted as `1.2`.
pub fn parse_float(input: &[u8]) -> (Option<f32>, &[u8]) {
    let mut buf = [0u8; FLOAT_PARSE_BUF_SIZE];
    let take = input.len().min(FLOAT_PARSE_BUF_SIZE - 1);
    buf[..take].copy_from_slice(&input[..take]);

    let mut idx = 0;
    if idx < take && (buf[idx] == b'-' || buf[idx] == b'+') {
        idx += 1;
    }
    let mut saw_digit = false;
    while idx < take && buf[idx].is_ascii_digit() {
        idx += 1;
        saw_digit = true;
    }
    if idx < take && buf[idx] == b'.' {
        idx += 1;
        while idx < take && buf[idx].is_ascii_digit() {
            idx += 1;
            saw_digit = true;
        }
    }
    if !saw_digit || idx >= take || !buf[idx].is_ascii_whitespace() {
        return (None, input);
    }

    let text = match core::str::from_utf8(&buf[..idx]) {
        Ok(s) => s,
        Err(_) => return (None, input),
    };
    match text.parse::<f32>() {
        Ok(value) => (Some(value), &input[idx..]),
        Err(_) => (None, input),
    }
}

/// Parses a bounded run of non-whitespace bytes, for string arguments that
/// have no literal prefix of their own (e.g. a serial number payload).
pub fn parse_word(input: &[u8]) -> (&[u8], &[u8]) {
    let idx = input
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(input.len());
    (&input[..idx], &input[idx..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gobble_whitespace_skips_leading_space_only() {
        assert_eq!(gobble_whitespace(b"   M105\n"), b"M105\n");
        assert_eq!(gobble_whitespace(b"M105\n"), b"M105\n");
        assert_eq!(gobble_whitespace(b"   \n"), b"\n");
        assert_eq!(gobble_whitespace(b""), b"");
    }

    #[test]
    fn prefix_matches_exact_and_mismatch() {
        assert_eq!(prefix_matches(b"M105 OK", b"M105"), b" OK");
        assert_eq!(prefix_matches(b"M104 S1", b"M105"), b"M104 S1");
        assert_eq!(prefix_matches(b"M1", b"M105"), b"M1");
    }

    #[test]
    fn parse_uint_requires_trailing_whitespace() {
        assert_eq!(parse_uint(b"3000\n"), (Some(3000), &b"\n"[..]));
        assert_eq!(parse_uint(b"3000"), (None, &b"3000"[..]));
        assert_eq!(parse_uint(b"30a0 "), (None, &b"30a0 "[..]));
        assert_eq!(parse_uint(b" 30"), (None, &b" 30"[..]));
    }

    #[test]
    fn parse_uint_rejects_overflow() {
        assert_eq!(parse_uint(b"99999999999 "), (None, &b"99999999999 "[..]));
    }

    #[test]
    fn parse_int_handles_sign() {
        assert_eq!(parse_int(b"-12 "), (Some(-12), &b" "[..]));
        assert_eq!(parse_int(b"+12 "), (Some(12), &b" "[..]));
        assert_eq!(parse_int(b"12 "), (Some(12), &b" "[..]));
    }

    #[test]
    fn parse_float_basic() {
        assert_eq!(parse_float(b"35.5 OK"), (Some(35.5_f32), &b" OK"[..]));
        assert_eq!(parse_float(b"35 OK"), (Some(35.0_f32), &b" OK"[..]));
    }

    #[test]
    fn parse_float_rejects_malformed_decimal() {
        // A second decimal point right after the first is not whitespace,
        // so this must fail rather than silently parsing "1.2".
        assert_eq!(parse_float(b"1.2.3 OK"), (None, &b"1.2.3 OK"[..]));
    }

    #[test]
    fn parse_float_requires_trailing_whitespace() {
        assert_eq!(parse_float(b"35.5"), (None, &b"35.5"[..]));
    }

    #[test]
    fn parse_word_stops_at_whitespace() {
        assert_eq!(parse_word(b"ABC123XYZ \n"), (&b"ABC123XYZ"[..], &b" \n"[..]));
    }
}
