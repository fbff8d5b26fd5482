//! XML Encoding Detection and Conversion
//!
//! Detects the document encoding from the byte order mark, byte patterns,
//! an explicit hint on the input source, or the XML declaration, and
//! decodes the whole document entity to UTF-8 text.

use crate::error::InputError;

/// Encodings the loader can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Ascii,
    Latin1,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM - check for UTF-16 pattern (< followed by null or null followed by <)
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }

    /// Map an IANA encoding label to a supported encoding
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_ascii_uppercase();
        match upper.as_str() {
            "UTF-8" | "UTF8" => Some(XmlEncoding::Utf8),
            // Byte order comes from the BOM; LE is the fallback
            "UTF-16" | "UTF16" | "UTF-16LE" => Some(XmlEncoding::Utf16Le),
            "UTF-16BE" => Some(XmlEncoding::Utf16Be),
            "US-ASCII" | "ASCII" => Some(XmlEncoding::Ascii),
            "ISO-8859-1" | "LATIN1" | "ISO_8859-1" => Some(XmlEncoding::Latin1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            XmlEncoding::Utf8 => "UTF-8",
            XmlEncoding::Utf16Le => "UTF-16LE",
            XmlEncoding::Utf16Be => "UTF-16BE",
            XmlEncoding::Ascii => "US-ASCII",
            XmlEncoding::Latin1 => "ISO-8859-1",
        }
    }

    fn is_utf16(self) -> bool {
        matches!(self, XmlEncoding::Utf16Le | XmlEncoding::Utf16Be)
    }
}

/// Pull the `encoding="..."` value out of an ASCII-compatible XML declaration
pub fn sniff_declared_encoding(input: &[u8]) -> Option<&str> {
    let input = input.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(input);
    if !input.starts_with(b"<?xml") {
        return None;
    }
    let end = memchr::memmem::find(input, b"?>")?;
    let decl = std::str::from_utf8(&input[..end]).ok()?;
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    value.find(quote).map(|close| &value[..close])
}

/// Decode a document entity to UTF-8.
///
/// `hint` is the encoding named on the input source; it wins over the XML
/// declaration but never over a UTF-16 byte order mark.
pub fn decode_document(input: Vec<u8>, hint: Option<&str>) -> Result<(String, XmlEncoding), InputError> {
    let detected = XmlEncoding::detect(&input);
    let encoding = if detected.is_utf16() {
        detected
    } else {
        let label = hint.or_else(|| sniff_declared_encoding(&input));
        match label {
            Some(label) => XmlEncoding::from_label(label)
                .ok_or_else(|| InputError::UnsupportedEncoding(label.to_string()))?,
            None => XmlEncoding::Utf8,
        }
    };

    let text = match encoding {
        XmlEncoding::Utf8 => decode_utf8(input)?,
        XmlEncoding::Utf16Le => decode_utf16(&input, encoding, u16::from_le_bytes)?,
        XmlEncoding::Utf16Be => decode_utf16(&input, encoding, u16::from_be_bytes)?,
        XmlEncoding::Ascii => {
            if let Some(offset) = input.iter().position(|b| !b.is_ascii()) {
                return Err(InputError::Decoding {
                    encoding: encoding.name(),
                    offset,
                });
            }
            // ASCII is valid UTF-8
            decode_utf8(input)?
        }
        XmlEncoding::Latin1 => input.iter().map(|&b| b as char).collect(),
    };
    Ok((text, encoding))
}

fn decode_utf8(mut input: Vec<u8>) -> Result<String, InputError> {
    // Skip UTF-8 BOM if present
    if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
        input.drain(..3);
    }
    String::from_utf8(input).map_err(|e| InputError::Decoding {
        encoding: XmlEncoding::Utf8.name(),
        offset: e.utf8_error().valid_up_to(),
    })
}

fn decode_utf16(
    input: &[u8],
    encoding: XmlEncoding,
    to_unit: fn([u8; 2]) -> u16,
) -> Result<String, InputError> {
    let bytes = match input {
        [0xFF, 0xFE, rest @ ..] | [0xFE, 0xFF, rest @ ..] => rest,
        _ => input,
    };

    if bytes.len() % 2 != 0 {
        return Err(InputError::Decoding {
            encoding: encoding.name(),
            offset: bytes.len() - 1,
        });
    }

    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| to_unit([chunk[0], chunk[1]]))
        .collect();

    let mut text = String::with_capacity(code_units.len());
    for (i, decoded) in char::decode_utf16(code_units.iter().copied()).enumerate() {
        match decoded {
            Ok(c) => text.push(c),
            Err(_) => {
                return Err(InputError::Decoding {
                    encoding: encoding.name(),
                    offset: i * 2,
                })
            }
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(b"<?xml"), XmlEncoding::Utf8);
    }

    #[test]
    fn test_detect_utf16_le_bom() {
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0x00]), XmlEncoding::Utf16Le);
    }

    #[test]
    fn test_detect_utf16_be_bom() {
        assert_eq!(XmlEncoding::detect(&[0xFE, 0xFF, 0x00, b'<']), XmlEncoding::Utf16Be);
    }

    #[test]
    fn test_decode_utf16_le() {
        // "<r/>" in UTF-16 LE with BOM
        let utf16_le = vec![
            0xFF, 0xFE,
            b'<', 0x00,
            b'r', 0x00,
            b'/', 0x00,
            b'>', 0x00,
        ];
        let (text, enc) = decode_document(utf16_le, None).unwrap();
        assert_eq!(text, "<r/>");
        assert_eq!(enc, XmlEncoding::Utf16Le);
    }

    #[test]
    fn test_decode_utf16_be_without_bom() {
        let utf16_be = vec![0x00, b'<', 0x00, b'r', 0x00, b'/', 0x00, b'>'];
        let (text, enc) = decode_document(utf16_be, None).unwrap();
        assert_eq!(text, "<r/>");
        assert_eq!(enc, XmlEncoding::Utf16Be);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let (text, _) = decode_document(vec![0xEF, 0xBB, 0xBF, b'<', b'a', b'/', b'>'], None).unwrap();
        assert_eq!(text, "<a/>");
    }

    #[test]
    fn test_invalid_utf8_reports_offset() {
        let err = decode_document(b"<a>\xFF</a>".to_vec(), None).unwrap_err();
        assert!(matches!(err, InputError::Decoding { offset: 3, .. }));
    }

    #[test]
    fn test_declared_latin1() {
        let mut bytes = b"<?xml version='1.0' encoding='ISO-8859-1'?><a>".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</a>");
        let (text, enc) = decode_document(bytes, None).unwrap();
        assert_eq!(enc, XmlEncoding::Latin1);
        assert!(text.contains("<a>é</a>"));
    }

    #[test]
    fn test_hint_overrides_declaration() {
        let bytes = b"<?xml version='1.0' encoding='EBCDIC'?><a/>".to_vec();
        assert!(matches!(
            decode_document(bytes.clone(), None),
            Err(InputError::UnsupportedEncoding(_))
        ));
        assert!(decode_document(bytes, Some("UTF-8")).is_ok());
    }

    #[test]
    fn test_sniff_declared_encoding() {
        assert_eq!(sniff_declared_encoding(b"<?xml version=\"1.0\" encoding = \"utf-8\"?>"), Some("utf-8"));
        assert_eq!(sniff_declared_encoding(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(sniff_declared_encoding(b"<root/>"), None);
    }
}
