//! XML Entity and Character Reference Decoding
//!
//! Handles the pieces of reference expansion that need no DTD:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Declared entities are looked up by the scanner through the DTD scanner.

use memchr::memchr;
use std::borrow::Cow;

/// Replacement text of a predefined entity
#[inline]
pub fn builtin_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        _ => None,
    }
}

/// Decode the body of a character reference (the part between `&#` and `;`)
///
/// Returns `None` for malformed references and for code points outside
/// the XML 1.0 Char production.
pub fn decode_char_ref(body: &str) -> Option<char> {
    let codepoint = if let Some(hex) = body.strip_prefix('x') {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()?
    } else {
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        body.parse::<u32>().ok()?
    };

    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Find the first character not allowed by the XML 1.0 Char production
pub fn find_invalid_char(text: &str) -> Option<(usize, char)> {
    text.char_indices()
        .find(|&(_, c)| !is_valid_xml_char(c as u32))
}

/// Collect the names of general entity references in a replacement text
pub fn entity_references(value: &str) -> Vec<&str> {
    let bytes = value.as_bytes();
    let mut refs = Vec::new();
    let mut pos = 0;

    while let Some(amp) = memchr(b'&', &bytes[pos..]) {
        let start = pos + amp + 1;
        if bytes.get(start) == Some(&b'#') {
            pos = start;
            continue;
        }
        match memchr(b';', &bytes[start..]) {
            Some(len) => {
                refs.push(&value[start..start + len]);
                pos = start + len + 1;
            }
            None => break,
        }
    }

    refs
}

/// Expand only character references, leaving entity references alone.
///
/// Entity values in a DTD get character references replaced at
/// declaration time; general entity references stay for later.
pub fn expand_char_refs(value: &str) -> Result<Cow<'_, str>, String> {
    if !value.contains("&#") {
        return Ok(Cow::Borrowed(value));
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find("&#") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 2..];
        let semi = after
            .find(';')
            .ok_or_else(|| "character reference is missing ';'".to_string())?;
        let c = decode_char_ref(&after[..semi])
            .ok_or_else(|| format!("invalid character reference &#{};", &after[..semi]))?;
        out.push(c);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}
