//! Default Scanners
//!
//! - document: the document scanner stage, driving the document channel
//! - dtd: the DTD scanner stage, driving the DTD and content model channels
//!
//! The lexical helpers below are shared by both. They report failures as
//! plain messages; each scanner attaches the location it knows about.

use crate::core::entities::{builtin_entity, decode_char_ref};
use crate::core::scanner::{is_name, Cursor};
use crate::stage::DeclaredEntity;

macro_rules! emit {
    ($slot:expr, $method:ident($($arg:expr),*)) => {
        match $slot.as_mut() {
            Some(handler) => handler.$method($($arg),*),
            None => Ok(()),
        }
    };
}

pub mod document;
pub mod dtd;

pub use document::DefaultDocumentScanner;
pub use dtd::DefaultDtdScanner;

/// Nesting limit for entity expansion, parameter and general alike
pub const MAX_ENTITY_DEPTH: usize = 32;

/// Limit on general entity expansions in one document, or in one
/// attribute value
pub const MAX_ENTITY_EXPANSIONS: usize = 64_000;

type Lexical<T> = std::result::Result<T, String>;

/// `SYSTEM "..."` or `PUBLIC "..." "..."`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExternalId<'a> {
    pub public_id: Option<&'a str>,
    pub system_id: Option<&'a str>,
}

/// Read an external identifier at the cursor.
///
/// With `system_required` false a bare `PUBLIC "..."` is accepted, as in
/// notation declarations.
pub(crate) fn read_external_id<'a>(cursor: &mut Cursor<'a>, system_required: bool) -> Lexical<ExternalId<'a>> {
    if cursor.eat("SYSTEM") {
        if !cursor.skip_whitespace() {
            return Err("whitespace required after 'SYSTEM'".to_string());
        }
        let system_id = cursor
            .read_quoted()
            .ok_or_else(|| "quoted system literal expected".to_string())?;
        return Ok(ExternalId {
            public_id: None,
            system_id: Some(system_id),
        });
    }

    if !cursor.eat("PUBLIC") {
        return Err("external identifier expected".to_string());
    }
    if !cursor.skip_whitespace() {
        return Err("whitespace required after 'PUBLIC'".to_string());
    }
    let public_id = cursor
        .read_quoted()
        .ok_or_else(|| "quoted public identifier expected".to_string())?;
    if let Some(bad) = public_id.chars().find(|&c| !is_pubid_char(c)) {
        return Err(format!("character '{bad}' is not allowed in a public identifier"));
    }

    let before = cursor.position();
    let spaced = cursor.skip_whitespace();
    match cursor.peek() {
        Some(b'"' | b'\'') if spaced => {
            let system_id = cursor
                .read_quoted()
                .ok_or_else(|| "unterminated system literal".to_string())?;
            Ok(ExternalId {
                public_id: Some(public_id),
                system_id: Some(system_id),
            })
        }
        Some(b'"' | b'\'') => Err("whitespace required before the system literal".to_string()),
        _ if system_required => Err("system literal required after the public identifier".to_string()),
        _ => {
            cursor.set_position(before);
            Ok(ExternalId {
                public_id: Some(public_id),
                system_id: None,
            })
        }
    }
}

fn is_pubid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || " \r\n-'()+,./:=?;!*#@$_%".contains(c)
}

/// Read a comment body; the cursor sits just past `<!--`
pub(crate) fn read_comment<'a>(cursor: &mut Cursor<'a>) -> Lexical<&'a str> {
    let text = cursor
        .read_until("-->")
        .ok_or_else(|| "unterminated comment".to_string())?;
    if text.contains("--") || text.ends_with('-') {
        return Err("'--' is not allowed inside a comment".to_string());
    }
    Ok(text)
}

/// Read a processing instruction; the cursor sits just past `<?`
pub(crate) fn read_pi<'a>(cursor: &mut Cursor<'a>) -> Lexical<(&'a str, Option<&'a str>)> {
    let target = cursor
        .read_name()
        .ok_or_else(|| "processing instruction target expected".to_string())?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(format!("processing instruction target '{target}' is reserved"));
    }
    if cursor.eat("?>") {
        return Ok((target, None));
    }
    if !cursor.skip_whitespace() {
        return Err(format!("whitespace required after processing instruction target '{target}'"));
    }
    let data = cursor
        .read_until("?>")
        .ok_or_else(|| format!("unterminated processing instruction '{target}'"))?;
    Ok((target, (!data.is_empty()).then_some(data)))
}

/// Normalize an attribute value literal: expand references, map
/// whitespace characters to spaces. `entities` resolves declared general
/// entities.
pub(crate) fn normalize_attribute_value(
    raw: &str,
    entities: &dyn Fn(&str) -> Option<DeclaredEntity>,
) -> Lexical<String> {
    let mut out = String::with_capacity(raw.len());
    let mut active = Vec::new();
    let mut expansions = 0;
    append_attribute_text(raw, entities, &mut active, &mut expansions, &mut out)?;
    Ok(out)
}

fn append_attribute_text(
    text: &str,
    entities: &dyn Fn(&str) -> Option<DeclaredEntity>,
    active: &mut Vec<String>,
    expansions: &mut usize,
    out: &mut String,
) -> Lexical<()> {
    let mut rest = text;
    while let Some(idx) = rest.find(['&', '<', '\t', '\n', '\r']) {
        out.push_str(&rest[..idx]);
        match rest.as_bytes()[idx] {
            b'<' => return Err("'<' is not allowed in attribute values".to_string()),
            b'&' => {
                let after = &rest[idx + 1..];
                let semi = after.find(';').ok_or("reference in attribute value is missing ';'")?;
                let body = &after[..semi];
                if let Some(num) = body.strip_prefix('#') {
                    let c = decode_char_ref(num).ok_or_else(|| format!("invalid character reference '&{body};'"))?;
                    out.push(c);
                } else if let Some(text) = builtin_entity(body) {
                    out.push_str(text);
                } else {
                    expand_in_attribute(body, entities, active, expansions, out)?;
                }
                rest = &after[semi + 1..];
            }
            _ => {
                out.push(' ');
                rest = &rest[idx + 1..];
            }
        }
    }
    out.push_str(rest);
    Ok(())
}

fn expand_in_attribute(
    name: &str,
    entities: &dyn Fn(&str) -> Option<DeclaredEntity>,
    active: &mut Vec<String>,
    expansions: &mut usize,
    out: &mut String,
) -> Lexical<()> {
    if !is_name(name) {
        return Err(format!("invalid entity reference '&{name};'"));
    }
    if active.iter().any(|a| a == name) {
        return Err(format!("recursive reference to entity '{name}'"));
    }
    if active.len() >= MAX_ENTITY_DEPTH {
        return Err(format!("entity '{name}' is nested too deeply"));
    }
    match entities(name) {
        Some(DeclaredEntity::Internal(replacement)) => {
            *expansions += 1;
            if *expansions > MAX_ENTITY_EXPANSIONS {
                return Err(format!("more than {MAX_ENTITY_EXPANSIONS} entity expansions in one attribute value"));
            }
            active.push(name.to_string());
            let result = append_attribute_text(&replacement, entities, active, expansions, out);
            active.pop();
            result
        }
        Some(DeclaredEntity::External { .. }) => {
            Err(format!("attribute value references external entity '{name}'"))
        }
        Some(DeclaredEntity::Unparsed { .. }) => {
            Err(format!("attribute value references unparsed entity '{name}'"))
        }
        None => Err(format!("entity '{name}' was referenced but not declared")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn no_entities(_: &str) -> Option<DeclaredEntity> {
        None
    }

    #[test]
    fn test_external_id() {
        let mut c = Cursor::new(r#"SYSTEM "doc.dtd">"#);
        let id = read_external_id(&mut c, true).unwrap();
        assert_eq!(id.system_id, Some("doc.dtd"));
        assert_eq!(c.peek(), Some(b'>'));

        let mut c = Cursor::new(r#"PUBLIC "-//X//DTD Y//EN" 'y.dtd'"#);
        let id = read_external_id(&mut c, true).unwrap();
        assert_eq!(id.public_id, Some("-//X//DTD Y//EN"));
        assert_eq!(id.system_id, Some("y.dtd"));
    }

    #[test]
    fn test_public_only() {
        let mut c = Cursor::new(r#"PUBLIC "gif" >"#);
        assert!(read_external_id(&mut c, true).is_err());

        let mut c = Cursor::new(r#"PUBLIC "gif" >"#);
        let id = read_external_id(&mut c, false).unwrap();
        assert_eq!(id.system_id, None);
        c.skip_whitespace();
        assert_eq!(c.peek(), Some(b'>'));
    }

    #[test]
    fn test_comment_and_pi() {
        let mut c = Cursor::new(" note -->rest");
        assert_eq!(read_comment(&mut c).unwrap(), " note ");
        assert_eq!(c.remaining(), "rest");

        let mut c = Cursor::new(" a -- b -->");
        assert!(read_comment(&mut c).is_err());

        let mut c = Cursor::new("style href='a.css'?>");
        assert_eq!(read_pi(&mut c).unwrap(), ("style", Some("href='a.css'")));

        let mut c = Cursor::new("go?>");
        assert_eq!(read_pi(&mut c).unwrap(), ("go", None));

        let mut c = Cursor::new("XML version='1.0'?>");
        assert!(read_pi(&mut c).is_err());
    }

    #[test]
    fn test_attribute_normalization() {
        let value = normalize_attribute_value("a\tb\nc &lt;&#65;&#x42;", &no_entities).unwrap();
        assert_eq!(value, "a b c <AB");
        assert!(normalize_attribute_value("a<b", &no_entities).is_err());
        assert!(normalize_attribute_value("&nope;", &no_entities).is_err());
    }

    #[test]
    fn test_attribute_entity_expansion() {
        let lookup = |name: &str| match name {
            "who" => Some(DeclaredEntity::Internal(Rc::from("wor&end;"))),
            "end" => Some(DeclaredEntity::Internal(Rc::from("ld"))),
            "loop" => Some(DeclaredEntity::Internal(Rc::from("&loop;"))),
            _ => None,
        };
        assert_eq!(normalize_attribute_value("hello &who;", &lookup).unwrap(), "hello world");
        let err = normalize_attribute_value("&loop;", &lookup).unwrap_err();
        assert!(err.contains("recursive"));
    }

    #[test]
    fn test_attribute_expansion_limit() {
        let tens = "&n;".repeat(10);
        let lookup = |name: &str| match name {
            "n" => Some(DeclaredEntity::Internal(Rc::from("x"))),
            _ if name.len() == 2 && name.starts_with('d') => {
                let level = name.as_bytes()[1] - b'0';
                let text = if level == 0 {
                    tens.clone()
                } else {
                    format!("&d{};", level - 1).repeat(10)
                };
                Some(DeclaredEntity::Internal(Rc::from(text.as_str())))
            }
            _ => None,
        };
        assert_eq!(normalize_attribute_value("&d0;", &lookup).unwrap(), "x".repeat(10));

        let err = normalize_attribute_value("&d5;", &lookup).unwrap_err();
        assert!(err.contains("entity expansions"));
    }
}
