//! Byte-to-text decoding for line content.
//!
//! A file is decoded with a single configured charset. Decoding never fails:
//! malformed input is replaced with U+FFFD, one marker per malformed unit.

use crate::error::{PagerError, Result};
use bstr::ByteSlice;
use std::fmt;
use std::str::FromStr;

/// Character set used to turn raw line bytes into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8, lossy on malformed sequences
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value
    Latin1,
    /// 7-bit ASCII; bytes above 0x7F become U+FFFD
    Ascii,
}

impl Charset {
    /// Decode one line's bytes, dropping a trailing carriage return
    pub fn decode_line(&self, bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        match self {
            Charset::Utf8 => bytes.to_str_lossy().into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Charset::Ascii => bytes
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
        }
    }
}

impl FromStr for Charset {
    type Err = PagerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(Charset::Latin1),
            "ascii" | "us-ascii" => Ok(Charset::Ascii),
            other => Err(PagerError::config(format!("unsupported charset: {other}"))),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Charset::Utf8 => "utf-8",
            Charset::Latin1 => "iso-8859-1",
            Charset::Ascii => "us-ascii",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_replaces_each_malformed_unit() {
        let decoded = Charset::Utf8.decode_line(b"ok \xFF\xFE done");
        assert_eq!(decoded, "ok \u{FFFD}\u{FFFD} done");
    }

    #[test]
    fn test_utf8_keeps_valid_multibyte() {
        assert_eq!(Charset::Utf8.decode_line("größe".as_bytes()), "größe");
    }

    #[test]
    fn test_trailing_carriage_return_is_stripped() {
        assert_eq!(Charset::Utf8.decode_line(b"windows line\r"), "windows line");
        // only the final one belongs to the terminator
        assert_eq!(Charset::Utf8.decode_line(b"a\rb"), "a\rb");
    }

    #[test]
    fn test_latin1_maps_high_bytes() {
        assert_eq!(Charset::Latin1.decode_line(b"caf\xE9"), "café");
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert_eq!(Charset::Ascii.decode_line(b"a\xE9b"), "a\u{FFFD}b");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("UTF-8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert_eq!("iso-8859-1".parse::<Charset>().unwrap(), Charset::Latin1);
        assert_eq!("ascii".parse::<Charset>().unwrap(), Charset::Ascii);
        assert!("ebcdic".parse::<Charset>().is_err());
        assert_eq!(Charset::Latin1.to_string(), "iso-8859-1");
    }
}
