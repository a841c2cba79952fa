//! Text charsets used to decode framed messages and encode outgoing text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Character set applied to port traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "UTF-8")]
    Utf8,
    #[serde(rename = "US-ASCII")]
    Ascii,
    #[serde(rename = "ISO-8859-1")]
    Latin1,
    #[serde(rename = "UTF-16BE")]
    Utf16Be,
    #[serde(rename = "UTF-16LE")]
    Utf16Le,
}

/// Returned when a charset name is not one we can translate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported charset: {0}")]
pub struct UnknownEncoding(pub String);

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "us-ascii" | "ascii" | "iso646-us" => Ok(Self::Ascii),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "iso-latin-1" => Ok(Self::Latin1),
            "utf-16" | "utf-16be" | "utf16be" => Ok(Self::Utf16Be),
            "utf-16le" | "utf16le" => Ok(Self::Utf16Le),
            _ => Err(UnknownEncoding(name.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Utf8 => "UTF-8",
            Self::Ascii => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf16Le => "UTF-16LE",
        };
        f.write_str(name)
    }
}

impl Encoding {
    /// Decode bytes, substituting U+FFFD for anything malformed.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Self::Utf16Be | Self::Utf16Le => {
                let big = matches!(self, Self::Utf16Be);
                let units = bytes.chunks_exact(2).map(|pair| {
                    if big {
                        u16::from_be_bytes([pair[0], pair[1]])
                    } else {
                        u16::from_le_bytes([pair[0], pair[1]])
                    }
                });
                let mut text: String = char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect();
                if bytes.len() % 2 == 1 {
                    text.push(char::REPLACEMENT_CHARACTER);
                }
                text
            }
        }
    }

    /// Encode text, substituting `?` for characters the charset cannot express.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }
}

/// Convert a user supplied string into the bytes it denotes.
///
/// `0xHHHH`, `\uHHHH` and `\xHH` name a single character and are always sent
/// as UTF-8. Anything else is unescaped and encoded with `encoding`.
pub fn character_bytes(value: &str, encoding: Encoding) -> Vec<u8> {
    if let Some(literal) = char_literal(value) {
        let mut buf = [0u8; 4];
        return literal.encode_utf8(&mut buf).as_bytes().to_vec();
    }
    encoding.encode(&unescape(value))
}

fn char_literal(value: &str) -> Option<char> {
    let digits = ["0x", "0X", "\\u", "\\x"]
        .iter()
        .find_map(|prefix| value.strip_prefix(prefix))?;
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}

/// Resolve backslash escapes the way Java string literals read.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('r') => push_and_skip(&mut out, &mut chars, '\r'),
            Some('n') => push_and_skip(&mut out, &mut chars, '\n'),
            Some('t') => push_and_skip(&mut out, &mut chars, '\t'),
            Some('b') => push_and_skip(&mut out, &mut chars, '\u{8}'),
            Some('f') => push_and_skip(&mut out, &mut chars, '\u{c}'),
            Some('\\') => push_and_skip(&mut out, &mut chars, '\\'),
            Some('\'') => push_and_skip(&mut out, &mut chars, '\''),
            Some('"') => push_and_skip(&mut out, &mut chars, '"'),
            Some('u') => {
                chars.next();
                while chars.peek() == Some(&'u') {
                    chars.next();
                }
                let digits: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == 4 => out.push(decoded),
                    _ => {
                        out.push_str("\\u");
                        out.push_str(&digits);
                    }
                }
            }
            Some(d) if d.is_digit(8) => {
                // Octal escapes stop at \377.
                let max_digits = if d <= '3' { 3 } else { 2 };
                let mut code = 0u32;
                for _ in 0..max_digits {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(v) => {
                            code = code * 8 + v;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            _ => out.push('\\'),
        }
    }
    out
}

fn push_and_skip(out: &mut String, chars: &mut std::iter::Peekable<std::str::Chars<'_>>, c: char) {
    chars.next();
    out.push(c);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("UTF-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("utf8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("ISO_8859_1".parse::<Encoding>(), Ok(Encoding::Latin1));
        assert_eq!("us-ascii".parse::<Encoding>(), Ok(Encoding::Ascii));
        assert_eq!("UTF-16LE".parse::<Encoding>(), Ok(Encoding::Utf16Le));
        assert!("klingon".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_decode_latin1_and_ascii() {
        assert_eq!(Encoding::Latin1.decode(&[0x41, 0xE9]), "Aé");
        assert_eq!(Encoding::Ascii.decode(&[0x41, 0xE9]), "A\u{FFFD}");
        assert_eq!(Encoding::Utf8.decode("é".as_bytes()), "é");
    }

    #[test]
    fn test_utf16_roundtrip_and_odd_tail() {
        let bytes = Encoding::Utf16Le.encode("hi");
        assert_eq!(bytes, vec![b'h', 0, b'i', 0]);
        assert_eq!(Encoding::Utf16Le.decode(&bytes), "hi");
        assert_eq!(Encoding::Utf16Be.decode(&[0, b'h', 0]), "h\u{FFFD}");
    }

    #[test]
    fn test_encode_unmappable() {
        assert_eq!(Encoding::Ascii.encode("aé"), b"a?".to_vec());
        assert_eq!(Encoding::Latin1.encode("é€"), vec![0xE9, b'?']);
    }

    #[test]
    fn test_character_bytes_literals() {
        assert_eq!(character_bytes("0x0002", Encoding::Utf8), vec![0x02]);
        assert_eq!(character_bytes("0x000D", Encoding::Utf8), vec![0x0D]);
        assert_eq!(character_bytes("\\u0003", Encoding::Latin1), vec![0x03]);
        assert_eq!(character_bytes("\\x1B", Encoding::Utf8), vec![0x1B]);
    }

    #[test]
    fn test_character_bytes_escapes() {
        assert_eq!(character_bytes("\\r\\n", Encoding::Utf8), b"\r\n".to_vec());
        assert_eq!(character_bytes("AT\\r", Encoding::Utf8), b"AT\r".to_vec());
        assert_eq!(character_bytes("plain", Encoding::Utf8), b"plain".to_vec());
        assert_eq!(character_bytes("0xZZ", Encoding::Utf8), b"0xZZ".to_vec());
    }

    #[test]
    fn test_unescape_octal_and_unknown() {
        assert_eq!(unescape("\\0"), "\0");
        assert_eq!(unescape("\\101B"), "AB");
        assert_eq!(unescape("\\q"), "\\q");
        assert_eq!(unescape("tail\\"), "tail\\");
        assert_eq!(unescape("\\u00e9"), "é");
    }
}
