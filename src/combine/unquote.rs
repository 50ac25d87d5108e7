//! Decoder for the double-quoted, backslash-escaped path field walkers emit
//! as the first column of directory records.

use crate::combine::constants::{ESCAPE, QUOTE};
use crate::combine::error::UnquoteError;

/// Decodes the quoted field at the start of `input`.
///
/// Decoding stops at the first unescaped `"`; anything after it (further
/// tab-separated columns, the line terminator) is ignored.
pub fn unquote(input: &[u8]) -> Result<Vec<u8>, UnquoteError> {
    unquote_prefix(input).map(|(decoded, _)| decoded)
}

/// Like [`unquote`], but also returns how many bytes of `input` the quoted
/// field occupied, closing quote included.
pub fn unquote_prefix(input: &[u8]) -> Result<(Vec<u8>, usize), UnquoteError> {
    if input.first() != Some(&QUOTE) {
        return Err(UnquoteError::MissingOpeningQuote);
    }

    let mut decoded = Vec::with_capacity(input.len());
    let mut pos = 1;

    while pos < input.len() {
        match input[pos] {
            QUOTE => return Ok((decoded, pos + 1)),
            ESCAPE => pos = decode_escape(input, pos + 1, &mut decoded)?,
            byte => {
                decoded.push(byte);
                pos += 1;
            }
        }
    }

    Err(UnquoteError::Unterminated)
}

/// Decodes the escape whose selector byte is at `pos`, returning the position
/// just past it.
fn decode_escape(input: &[u8], pos: usize, out: &mut Vec<u8>) -> Result<usize, UnquoteError> {
    let selector = *input.get(pos).ok_or(UnquoteError::Unterminated)?;

    let simple = match selector {
        b'\\' => Some(b'\\'),
        b'"' => Some(b'"'),
        b'\'' => Some(b'\''),
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b'f' => Some(0x0c),
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'v' => Some(0x0b),
        _ => None,
    };

    if let Some(byte) = simple {
        out.push(byte);
        return Ok(pos + 1);
    }

    match selector {
        b'0'..=b'7' => {
            out.push(octal_byte(input, pos)?);
            Ok(pos + 3)
        }
        b'x' => {
            out.push(hex_byte(input, pos + 1)?);
            Ok(pos + 3)
        }
        b'u' => {
            let code_point = hex_code_point(input, pos + 1, 2)?;
            push_code_point(code_point, out);
            Ok(pos + 5)
        }
        b'U' => {
            let code_point = hex_code_point(input, pos + 1, 4)?;
            push_code_point(code_point, out);
            Ok(pos + 9)
        }
        other => Err(UnquoteError::UnknownEscape(other as char)),
    }
}

fn octal_byte(input: &[u8], pos: usize) -> Result<u8, UnquoteError> {
    let digits = input.get(pos..pos + 3).ok_or(UnquoteError::MalformedOctal)?;

    let mut value: u32 = 0;
    for &digit in digits {
        if !(b'0'..=b'7').contains(&digit) {
            return Err(UnquoteError::MalformedOctal);
        }
        value = value * 8 + u32::from(digit - b'0');
    }

    u8::try_from(value).map_err(|_| UnquoteError::MalformedOctal)
}

fn hex_byte(input: &[u8], pos: usize) -> Result<u8, UnquoteError> {
    let digits = input.get(pos..pos + 2).ok_or(UnquoteError::MalformedHex)?;
    Ok(hex_digit(digits[0])? << 4 | hex_digit(digits[1])?)
}

fn hex_digit(digit: u8) -> Result<u8, UnquoteError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(UnquoteError::MalformedHex),
    }
}

/// Reads `byte_count` consecutive hex bytes as one big-endian code point.
fn hex_code_point(input: &[u8], pos: usize, byte_count: usize) -> Result<u32, UnquoteError> {
    (0..byte_count).try_fold(0u32, |acc, i| {
        hex_byte(input, pos + i * 2).map(|byte| acc << 8 | u32::from(byte))
    })
}

fn push_code_point(code_point: u32, out: &mut Vec<u8>) {
    let ch = char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER);
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

#[cfg(test)]
pub(crate) fn quote(raw: &[u8]) -> Vec<u8> {
    let mut quoted = vec![QUOTE];
    for &byte in raw {
        match byte {
            b'"' => quoted.extend_from_slice(b"\\\""),
            b'\\' => quoted.extend_from_slice(b"\\\\"),
            b'\t' => quoted.extend_from_slice(b"\\t"),
            b'\n' => quoted.extend_from_slice(b"\\n"),
            b'\r' => quoted.extend_from_slice(b"\\r"),
            0x20..=0x7e => quoted.push(byte),
            _ => quoted.extend_from_slice(format!("\\x{:02x}", byte).as_bytes()),
        }
    }
    quoted.push(QUOTE);
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_string() {
        assert_eq!(unquote(b"\"/lustre/scratch\"").unwrap(), b"/lustre/scratch");
    }

    #[test]
    fn test_trailing_columns_are_ignored() {
        let (decoded, consumed) = unquote_prefix(b"\"/a/b\"\t1\t2\n").unwrap();
        assert_eq!(decoded, b"/a/b");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_simple_escapes() {
        let decoded = unquote(br#""\\\"\'\a\b\f\n\r\t\v""#).unwrap();
        assert_eq!(decoded, b"\\\"'\x07\x08\x0c\n\r\t\x0b");
    }

    #[test]
    fn test_octal_and_hex_escapes() {
        assert_eq!(unquote(br#""\101\x42\377""#).unwrap(), b"AB\xff");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(unquote(br#""\u00e9""#).unwrap(), "é".as_bytes());
        assert_eq!(unquote(br#""\U0001F600""#).unwrap(), "😀".as_bytes());
    }

    #[test]
    fn test_errors() {
        assert_eq!(unquote(b"abc"), Err(UnquoteError::MissingOpeningQuote));
        assert_eq!(unquote(b""), Err(UnquoteError::MissingOpeningQuote));
        assert_eq!(unquote(b"\"abc"), Err(UnquoteError::Unterminated));
        assert_eq!(unquote(b"\"abc\\"), Err(UnquoteError::Unterminated));
        assert_eq!(unquote(br#""\q""#), Err(UnquoteError::UnknownEscape('q')));
        assert_eq!(unquote(br#""\18x""#), Err(UnquoteError::MalformedOctal));
        assert_eq!(unquote(br#""\400""#), Err(UnquoteError::MalformedOctal));
        assert_eq!(unquote(br#""\xg0""#), Err(UnquoteError::MalformedHex));
        assert_eq!(unquote(br#""\u12""#), Err(UnquoteError::MalformedHex));
    }

    #[test]
    fn test_round_trip() {
        let samples: [&[u8]; 4] = [
            b"plain ascii path",
            b"tab\there\nand newline",
            b"quote \" and backslash \\ mixed",
            b"/dir with spaces/\x01control\x7f",
        ];

        for sample in samples {
            let quoted = quote(sample);
            assert_eq!(unquote(&quoted).unwrap(), sample, "failed for {:?}", sample);
        }
    }
}
