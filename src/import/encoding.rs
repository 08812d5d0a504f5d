//! Text encodings accepted for uploaded station files.

use std::fmt;
use std::str::FromStr;

/// Encoding of an import payload. Station spreadsheets are usually
/// exported as Latin-1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    #[default]
    Latin1,
}

impl TextEncoding {
    /// Decode `bytes`. Never fails: invalid UTF-8 sequences become U+FFFD,
    /// and every byte is a valid Latin-1 character.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(TextEncoding::Latin1),
            other => Err(format!("unsupported text encoding '{}'", other)),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => write!(f, "utf-8"),
            TextEncoding::Latin1 => write!(f, "latin1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_decodes_accented_bytes() {
        // "Açu" in Latin-1
        assert_eq!(TextEncoding::Latin1.decode(&[0x41, 0xE7, 0x75]), "Açu");
    }

    #[test]
    fn test_utf8_replaces_invalid_sequences() {
        assert_eq!(TextEncoding::Utf8.decode("Açu".as_bytes()), "Açu");
        assert_eq!(TextEncoding::Utf8.decode(&[0x41, 0xE7, 0x75]), "A\u{FFFD}u");
    }

    #[test]
    fn test_labels() {
        assert_eq!("UTF-8".parse::<TextEncoding>(), Ok(TextEncoding::Utf8));
        assert_eq!("ISO-8859-1".parse::<TextEncoding>(), Ok(TextEncoding::Latin1));
        assert!("ebcdic".parse::<TextEncoding>().is_err());
        assert_eq!(TextEncoding::default(), TextEncoding::Latin1);
    }
}
