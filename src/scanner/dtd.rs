//! Default DTD Scanner
//!
//! Scans the internal subset of a document type declaration and reports
//! each markup declaration on the DTD channel, with element content models
//! also broken down on the content model channel. External subsets and
//! external parameter entities are never read; a grammar pooled under the
//! external subset's id stands in for them at validation time.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use super::{normalize_attribute_value, read_comment, read_external_id, read_pi, MAX_ENTITY_DEPTH};
use crate::config::ConfigurationRegistry;
use crate::core::entities::expand_char_refs;
use crate::core::scanner::Cursor;
use crate::error::{Result, StructuredError, XmlError};
use crate::handler::{DtdContentModelHandler, DtdHandler, Occurrence, Separator};
use crate::input::Locator;
use crate::stage::{Component, DeclaredEntity, Doctype, DtdScanner};
use crate::validation::grammar::{parse_content_spec, ContentParticle, ContentSpec};

#[derive(Debug, Clone)]
enum ParameterEntity {
    Internal(Rc<str>),
    External,
}

/// Where positions inside the text being scanned map to in the document
struct Scope<'l> {
    locator: &'l Locator,
    base: usize,
    /// Inside parameter entity replacement text every position reports
    /// the offset of the outermost reference
    nested: bool,
}

impl Scope<'_> {
    fn offset(&self, pos: usize) -> usize {
        if self.nested {
            self.base
        } else {
            self.base + pos
        }
    }

    fn mark(&self, pos: usize) {
        self.locator.set_offset(self.offset(pos));
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> XmlError {
        StructuredError::well_formedness(message, self.locator.location_at(self.offset(pos))).into()
    }

    fn require_space(&self, cursor: &mut Cursor<'_>, what: &str) -> Result<()> {
        if cursor.skip_whitespace() {
            Ok(())
        } else {
            Err(self.error(cursor.position(), format!("whitespace required {what}")))
        }
    }

    fn name<'a>(&self, cursor: &mut Cursor<'a>, what: &str) -> Result<&'a str> {
        cursor
            .read_name()
            .ok_or_else(|| self.error(cursor.position(), format!("{what} expected")))
    }

    fn close(&self, cursor: &mut Cursor<'_>, start: usize, what: &str) -> Result<()> {
        cursor.skip_whitespace();
        if cursor.eat_byte(b'>') {
            Ok(())
        } else {
            Err(self.error(start, format!("'>' expected to close the {what}")))
        }
    }
}

/// DTD scanner stage for internal subsets
pub struct DefaultDtdScanner {
    dtd_handler: Option<Box<dyn DtdHandler>>,
    content_model_handler: Option<Box<dyn DtdContentModelHandler>>,
    general: HashMap<String, DeclaredEntity>,
    parameter: HashMap<String, ParameterEntity>,
    expanding: Vec<String>,
}

impl DefaultDtdScanner {
    pub fn new() -> Self {
        DefaultDtdScanner {
            dtd_handler: None,
            content_model_handler: None,
            general: HashMap::new(),
            parameter: HashMap::new(),
            expanding: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.general.clear();
        self.parameter.clear();
        self.expanding.clear();
    }

    fn scan_subset(&mut self, text: &str, scope: &Scope<'_>) -> Result<()> {
        let mut cursor = Cursor::new(text);
        loop {
            cursor.skip_whitespace();
            if cursor.is_eof() {
                return Ok(());
            }
            let start = cursor.position();
            scope.mark(start);

            if cursor.eat("<!ELEMENT") {
                self.element_decl(&mut cursor, scope, start)?;
            } else if cursor.eat("<!ATTLIST") {
                self.attlist_decl(&mut cursor, scope, start)?;
            } else if cursor.eat("<!ENTITY") {
                self.entity_decl(&mut cursor, scope, start)?;
            } else if cursor.eat("<!NOTATION") {
                self.notation_decl(&mut cursor, scope, start)?;
            } else if cursor.eat("<!--") {
                let text = read_comment(&mut cursor).map_err(|msg| scope.error(start, msg))?;
                emit!(self.dtd_handler, dtd_comment(text))?;
            } else if cursor.eat("<?") {
                let (target, data) = read_pi(&mut cursor).map_err(|msg| scope.error(start, msg))?;
                emit!(self.dtd_handler, dtd_processing_instruction(target, data))?;
            } else if cursor.eat_byte(b'%') {
                self.parameter_reference(&mut cursor, scope, start)?;
            } else if cursor.starts_with("<![") {
                return Err(scope.error(start, "conditional sections are not allowed in the internal subset"));
            } else {
                return Err(scope.error(start, "markup declaration expected"));
            }
        }
    }

    fn element_decl(&mut self, cursor: &mut Cursor<'_>, scope: &Scope<'_>, start: usize) -> Result<()> {
        scope.require_space(cursor, "after '<!ELEMENT'")?;
        let name = scope.name(cursor, "element type name")?;
        scope.require_space(cursor, "after the element type name")?;

        let end = cursor
            .find_byte(b'>')
            .ok_or_else(|| scope.error(start, "unterminated element declaration"))?;
        let content = cursor.slice(cursor.position(), end);
        cursor.set_position(end + 1);

        let spec = parse_content_spec(content).map_err(|msg| scope.error(start, msg))?;
        let model = spec.to_string();
        trace!(element = name, %model, "element declaration");

        if let Some(handler) = self.content_model_handler.as_mut() {
            emit_content_model(&mut **handler, name, &spec)?;
        }
        emit!(self.dtd_handler, element_decl(name, &model))
    }

    fn attlist_decl(&mut self, cursor: &mut Cursor<'_>, scope: &Scope<'_>, start: usize) -> Result<()> {
        scope.require_space(cursor, "after '<!ATTLIST'")?;
        let element = scope.name(cursor, "element type name")?;

        loop {
            let spaced = cursor.skip_whitespace();
            if cursor.eat_byte(b'>') {
                return Ok(());
            }
            if cursor.is_eof() {
                return Err(scope.error(start, "unterminated attribute-list declaration"));
            }
            if !spaced {
                return Err(scope.error(cursor.position(), "whitespace required before the attribute name"));
            }

            let at = cursor.position();
            let attribute = scope.name(cursor, "attribute name")?;
            scope.require_space(cursor, "after the attribute name")?;
            let att_type = read_att_type(cursor).map_err(|msg| scope.error(at, msg))?;
            scope.require_space(cursor, "after the attribute type")?;

            let (mode, default) = if cursor.eat("#REQUIRED") {
                (Some("#REQUIRED"), None)
            } else if cursor.eat("#IMPLIED") {
                (Some("#IMPLIED"), None)
            } else {
                let mode = if cursor.eat("#FIXED") {
                    scope.require_space(cursor, "after '#FIXED'")?;
                    Some("#FIXED")
                } else {
                    None
                };
                let literal = cursor
                    .read_quoted()
                    .ok_or_else(|| scope.error(cursor.position(), "quoted default value expected"))?;
                let value = normalize_attribute_value(literal, &|name: &str| self.general.get(name).cloned())
                    .map_err(|msg| scope.error(at, msg))?;
                (mode, Some(value))
            };

            scope.mark(at);
            emit!(
                self.dtd_handler,
                attribute_decl(element, attribute, &att_type, mode, default.as_deref())
            )?;
        }
    }

    fn entity_decl(&mut self, cursor: &mut Cursor<'_>, scope: &Scope<'_>, start: usize) -> Result<()> {
        scope.require_space(cursor, "after '<!ENTITY'")?;
        let parameter = cursor.eat_byte(b'%');
        if parameter {
            scope.require_space(cursor, "after '%'")?;
        }
        let name = scope.name(cursor, "entity name")?;
        scope.require_space(cursor, "after the entity name")?;
        let reported = if parameter {
            format!("%{name}")
        } else {
            name.to_string()
        };
        let first = if parameter {
            !self.parameter.contains_key(name)
        } else {
            !self.general.contains_key(name)
        };

        if matches!(cursor.peek(), Some(b'"' | b'\'')) {
            let literal = cursor
                .read_quoted()
                .ok_or_else(|| scope.error(start, "unterminated entity value"))?;
            if literal.contains('%') {
                return Err(scope.error(
                    start,
                    "parameter entity references are not allowed within markup in the internal subset",
                ));
            }
            let value: Rc<str> = Rc::from(expand_char_refs(literal).map_err(|msg| scope.error(start, msg))?);
            scope.close(cursor, start, "entity declaration")?;

            if !first {
                debug!(entity = %reported, "ignoring redeclared entity");
                return Ok(());
            }
            if parameter {
                self.parameter
                    .insert(name.to_string(), ParameterEntity::Internal(Rc::clone(&value)));
            } else {
                self.general
                    .insert(name.to_string(), DeclaredEntity::Internal(Rc::clone(&value)));
            }
            scope.mark(start);
            return emit!(self.dtd_handler, internal_entity_decl(&reported, &value));
        }

        let id = read_external_id(cursor, true).map_err(|msg| scope.error(start, msg))?;
        let public_id = id.public_id;
        let system_id = id.system_id.unwrap_or_default();

        let spaced = cursor.skip_whitespace();
        let notation = if spaced && cursor.eat("NDATA") {
            if parameter {
                return Err(scope.error(start, "parameter entities cannot be unparsed"));
            }
            scope.require_space(cursor, "after 'NDATA'")?;
            Some(scope.name(cursor, "notation name")?)
        } else {
            None
        };
        scope.close(cursor, start, "entity declaration")?;

        if !first {
            debug!(entity = %reported, "ignoring redeclared entity");
            return Ok(());
        }
        scope.mark(start);
        match notation {
            Some(notation) => {
                self.general.insert(
                    name.to_string(),
                    DeclaredEntity::Unparsed {
                        public_id: public_id.map(str::to_string),
                        system_id: system_id.to_string(),
                        notation: notation.to_string(),
                    },
                );
                emit!(self.dtd_handler, unparsed_entity_decl(name, public_id, system_id, notation))
            }
            None => {
                if parameter {
                    self.parameter.insert(name.to_string(), ParameterEntity::External);
                } else {
                    self.general.insert(
                        name.to_string(),
                        DeclaredEntity::External {
                            public_id: public_id.map(str::to_string),
                            system_id: system_id.to_string(),
                        },
                    );
                }
                emit!(self.dtd_handler, external_entity_decl(&reported, public_id, system_id))
            }
        }
    }

    fn notation_decl(&mut self, cursor: &mut Cursor<'_>, scope: &Scope<'_>, start: usize) -> Result<()> {
        scope.require_space(cursor, "after '<!NOTATION'")?;
        let name = scope.name(cursor, "notation name")?;
        scope.require_space(cursor, "after the notation name")?;
        let id = read_external_id(cursor, false).map_err(|msg| scope.error(start, msg))?;
        scope.close(cursor, start, "notation declaration")?;

        scope.mark(start);
        emit!(self.dtd_handler, notation_decl(name, id.public_id, id.system_id))
    }

    fn parameter_reference(&mut self, cursor: &mut Cursor<'_>, scope: &Scope<'_>, start: usize) -> Result<()> {
        let name = scope.name(cursor, "parameter entity name")?;
        if !cursor.eat_byte(b';') {
            return Err(scope.error(start, format!("reference to parameter entity '{name}' must end with ';'")));
        }

        match self.parameter.get(name).cloned() {
            Some(ParameterEntity::Internal(text)) => {
                if self.expanding.iter().any(|n| n == name) {
                    return Err(scope.error(start, format!("recursive reference to parameter entity '{name}'")));
                }
                if self.expanding.len() >= MAX_ENTITY_DEPTH {
                    return Err(scope.error(start, format!("parameter entity '{name}' is nested too deeply")));
                }
                trace!(entity = name, "expanding parameter entity");
                self.expanding.push(name.to_string());
                let nested = Scope {
                    locator: scope.locator,
                    base: scope.offset(start),
                    nested: true,
                };
                let result = self.scan_subset(&text, &nested);
                self.expanding.pop();
                result
            }
            Some(ParameterEntity::External) => {
                debug!(entity = name, "external parameter entity not read");
                Ok(())
            }
            None => Err(scope.error(
                start,
                format!("parameter entity '{name}' was referenced but not declared"),
            )),
        }
    }
}

impl Default for DefaultDtdScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a declared attribute type, normalized: `CDATA`, `(a|b)`,
/// `NOTATION (x|y)`
fn read_att_type(cursor: &mut Cursor<'_>) -> std::result::Result<String, String> {
    if cursor.peek() == Some(b'(') {
        return read_enumeration(cursor);
    }
    let keyword = cursor
        .read_name()
        .ok_or_else(|| "attribute type expected".to_string())?;
    match keyword {
        "CDATA" | "ID" | "IDREF" | "IDREFS" | "ENTITY" | "ENTITIES" | "NMTOKEN" | "NMTOKENS" => {
            Ok(keyword.to_string())
        }
        "NOTATION" => {
            if !cursor.skip_whitespace() {
                return Err("whitespace required after 'NOTATION'".to_string());
            }
            Ok(format!("NOTATION {}", read_enumeration(cursor)?))
        }
        other => Err(format!("unknown attribute type '{other}'")),
    }
}

fn read_enumeration(cursor: &mut Cursor<'_>) -> std::result::Result<String, String> {
    let start = cursor.position();
    let end = cursor
        .find_byte(b')')
        .ok_or_else(|| "unterminated enumeration".to_string())?;
    let inner = cursor.slice(start + 1, end);
    cursor.set_position(end + 1);

    let values: Vec<&str> = inner.split('|').map(str::trim).collect();
    if let Some(bad) = values
        .iter()
        .find(|v| !crate::core::scanner::is_nmtoken(v))
    {
        return Err(format!("invalid enumeration value '{bad}'"));
    }
    Ok(format!("({})", values.join("|")))
}

/// Break a content model down into content model channel events
fn emit_content_model(handler: &mut dyn DtdContentModelHandler, element: &str, spec: &ContentSpec) -> Result<()> {
    handler.start_content_model(element)?;
    match spec {
        ContentSpec::Empty => handler.empty()?,
        ContentSpec::Any => handler.any()?,
        ContentSpec::Mixed(names) => {
            handler.start_group()?;
            handler.pcdata()?;
            for name in names {
                handler.separator(Separator::Choice)?;
                handler.element(name)?;
            }
            handler.end_group()?;
            if !names.is_empty() {
                handler.occurrence(Occurrence::ZeroOrMore)?;
            }
        }
        ContentSpec::Children(particle) => emit_particle(handler, particle)?,
    }
    handler.end_content_model()
}

fn emit_particle(handler: &mut dyn DtdContentModelHandler, particle: &ContentParticle) -> Result<()> {
    let (items, separator, occurrence) = match particle {
        ContentParticle::Name(name, occurrence) => {
            handler.element(name)?;
            if let Some(o) = occurrence {
                handler.occurrence(*o)?;
            }
            return Ok(());
        }
        ContentParticle::Seq(items, o) => (items, Separator::Sequence, *o),
        ContentParticle::Choice(items, o) => (items, Separator::Choice, *o),
    };
    handler.start_group()?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            handler.separator(separator)?;
        }
        emit_particle(handler, item)?;
    }
    handler.end_group()?;
    match occurrence {
        Some(o) => handler.occurrence(o),
        None => Ok(()),
    }
}

impl Component for DefaultDtdScanner {
    fn reset(&mut self, _config: &ConfigurationRegistry) -> Result<()> {
        self.clear();
        Ok(())
    }
}

impl DtdScanner for DefaultDtdScanner {
    fn set_dtd_handler(&mut self, handler: Option<Box<dyn DtdHandler>>) {
        self.dtd_handler = handler;
    }

    fn set_dtd_content_model_handler(&mut self, handler: Option<Box<dyn DtdContentModelHandler>>) {
        self.content_model_handler = handler;
    }

    fn scan_doctype(&mut self, doctype: &Doctype<'_>, locator: &Locator) -> Result<()> {
        self.clear();
        debug!(
            root = doctype.root,
            system_id = ?doctype.system_id,
            internal_subset = doctype.internal_subset.is_some(),
            "scanning document type declaration"
        );

        emit!(self.dtd_handler, start_dtd(doctype.root, doctype.public_id, doctype.system_id))?;
        if let Some(subset) = doctype.internal_subset {
            let scope = Scope {
                locator,
                base: doctype.subset_offset,
                nested: false,
            };
            self.scan_subset(subset, &scope)?;
        }
        emit!(self.dtd_handler, end_dtd())
    }

    fn general_entity(&self, name: &str) -> Option<DeclaredEntity> {
        self.general.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use crate::input::DocumentEntity;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl DtdHandler for Log {
        fn start_dtd(&mut self, root: &str, _public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
            self.0.push(format!("start_dtd {root} {system_id:?}"));
            Ok(())
        }

        fn element_decl(&mut self, name: &str, model: &str) -> Result<()> {
            self.0.push(format!("element {name} {model}"));
            Ok(())
        }

        fn attribute_decl(
            &mut self,
            element: &str,
            attribute: &str,
            att_type: &str,
            mode: Option<&str>,
            default: Option<&str>,
        ) -> Result<()> {
            self.0
                .push(format!("attribute {element} {attribute} {att_type} {mode:?} {default:?}"));
            Ok(())
        }

        fn internal_entity_decl(&mut self, name: &str, value: &str) -> Result<()> {
            self.0.push(format!("entity {name} {value:?}"));
            Ok(())
        }

        fn external_entity_decl(&mut self, name: &str, _public_id: Option<&str>, system_id: &str) -> Result<()> {
            self.0.push(format!("external {name} {system_id}"));
            Ok(())
        }

        fn unparsed_entity_decl(
            &mut self,
            name: &str,
            _public_id: Option<&str>,
            _system_id: &str,
            notation: &str,
        ) -> Result<()> {
            self.0.push(format!("unparsed {name} {notation}"));
            Ok(())
        }

        fn notation_decl(&mut self, name: &str, public_id: Option<&str>, _system_id: Option<&str>) -> Result<()> {
            self.0.push(format!("notation {name} {public_id:?}"));
            Ok(())
        }

        fn dtd_comment(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("comment {text:?}"));
            Ok(())
        }

        fn dtd_processing_instruction(&mut self, target: &str, _data: Option<&str>) -> Result<()> {
            self.0.push(format!("pi {target}"));
            Ok(())
        }

        fn end_dtd(&mut self) -> Result<()> {
            self.0.push("end_dtd".to_string());
            Ok(())
        }
    }

    impl DtdContentModelHandler for Log {
        fn start_content_model(&mut self, element: &str) -> Result<()> {
            self.0.push(format!("model {element}"));
            Ok(())
        }

        fn empty(&mut self) -> Result<()> {
            self.0.push("EMPTY".to_string());
            Ok(())
        }

        fn start_group(&mut self) -> Result<()> {
            self.0.push("(".to_string());
            Ok(())
        }

        fn pcdata(&mut self) -> Result<()> {
            self.0.push("#PCDATA".to_string());
            Ok(())
        }

        fn element(&mut self, name: &str) -> Result<()> {
            self.0.push(name.to_string());
            Ok(())
        }

        fn separator(&mut self, separator: Separator) -> Result<()> {
            self.0.push(format!("{separator:?}"));
            Ok(())
        }

        fn occurrence(&mut self, occurrence: Occurrence) -> Result<()> {
            self.0.push(occurrence.as_char().to_string());
            Ok(())
        }

        fn end_group(&mut self) -> Result<()> {
            self.0.push(")".to_string());
            Ok(())
        }

        fn end_content_model(&mut self) -> Result<()> {
            self.0.push("end model".to_string());
            Ok(())
        }
    }

    /// Scan the internal subset of `doc`, which must contain exactly one `[...]`
    fn scan(doc: &str) -> (DefaultDtdScanner, Result<()>, Vec<String>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut scanner = DefaultDtdScanner::new();
        scanner.set_dtd_handler(Some(Box::new(Rc::clone(&log))));
        scanner.set_dtd_content_model_handler(Some(Box::new(Rc::clone(&log))));

        let open = doc.find('[').unwrap() + 1;
        let close = doc.rfind(']').unwrap();
        let entity = DocumentEntity::from_text(doc);
        let locator = entity.locator();
        let doctype = Doctype {
            root: "doc",
            public_id: None,
            system_id: None,
            internal_subset: Some(&doc[open..close]),
            subset_offset: open,
        };
        let result = scanner.scan_doctype(&doctype, &locator);
        let events = log.borrow().0.clone();
        (scanner, result, events)
    }

    #[test]
    fn test_declarations_in_order() {
        let (_, result, events) = scan(
            r#"<!DOCTYPE doc [
  <!ELEMENT doc (head, (p | list)*, foot?)>
  <!ATTLIST doc lang NMTOKEN #IMPLIED
                kind (a|b) "a">
  <!ENTITY who "World">
  <!NOTATION gif PUBLIC "image/gif">
  <!-- done -->
  <?tool run?>
]><doc/>"#,
        );
        result.unwrap();
        assert_eq!(
            events,
            vec![
                "start_dtd doc None",
                "model doc",
                "(",
                "head",
                "Sequence",
                "(",
                "p",
                "Choice",
                "list",
                ")",
                "*",
                "Sequence",
                "foot",
                "?",
                ")",
                "end model",
                "element doc (head,(p|list)*,foot?)",
                "attribute doc lang NMTOKEN Some(\"#IMPLIED\") None",
                "attribute doc kind (a|b) None Some(\"a\")",
                "entity who \"World\"",
                "notation gif Some(\"image/gif\")",
                "comment \" done \"",
                "pi tool",
                "end_dtd",
            ]
        );
    }

    #[test]
    fn test_mixed_and_empty_models() {
        let (_, result, events) = scan("<!DOCTYPE doc [<!ELEMENT p (#PCDATA|em)*><!ELEMENT br EMPTY>]>");
        result.unwrap();
        assert_eq!(
            events[1..events.len() - 1].to_vec(),
            vec![
                "model p",
                "(",
                "#PCDATA",
                "Choice",
                "em",
                ")",
                "*",
                "end model",
                "element p (#PCDATA|em)*",
                "model br",
                "EMPTY",
                "end model",
                "element br EMPTY",
            ]
        );
    }

    #[test]
    fn test_entities_first_declaration_wins() {
        let (scanner, result, events) = scan(
            r#"<!DOCTYPE doc [
  <!ENTITY e "&#65;bc">
  <!ENTITY e "ignored">
  <!ENTITY ext SYSTEM "ext.xml">
  <!ENTITY pic SYSTEM "pic.gif" NDATA gif>
]>"#,
        );
        result.unwrap();
        assert_eq!(scanner.general_entity("e"), Some(DeclaredEntity::Internal(Rc::from("Abc"))));
        assert!(matches!(
            scanner.general_entity("ext"),
            Some(DeclaredEntity::External { system_id, .. }) if system_id == "ext.xml"
        ));
        assert!(matches!(
            scanner.general_entity("pic"),
            Some(DeclaredEntity::Unparsed { notation, .. }) if notation == "gif"
        ));
        assert_eq!(events.iter().filter(|e| e.starts_with("entity e")).count(), 1);
        assert!(events.contains(&"unparsed pic gif".to_string()));
    }

    #[test]
    fn test_parameter_entity_expansion() {
        let (_, result, events) = scan(
            r#"<!DOCTYPE doc [
  <!ENTITY % decls "<!ELEMENT doc EMPTY>">
  <!ENTITY % remote SYSTEM "remote.ent">
  %decls;
  %remote;
]>"#,
        );
        result.unwrap();
        assert!(events.contains(&"entity %decls \"<!ELEMENT doc EMPTY>\"".to_string()));
        assert!(events.contains(&"external %remote remote.ent".to_string()));
        assert!(events.contains(&"element doc EMPTY".to_string()));
    }

    #[test]
    fn test_undeclared_parameter_entity() {
        let (_, result, _) = scan("<!DOCTYPE doc [\n%missing;\n]>");
        let err = result.unwrap_err();
        let structured = err.as_structured().unwrap();
        assert_eq!(structured.kind, ParseErrorKind::WellFormedness);
        assert_eq!(structured.location.line, 2);
        assert!(structured.message.contains("missing"));
    }

    #[test]
    fn test_malformed_declaration_reports_line() {
        let (_, result, events) = scan("<!DOCTYPE doc [\n<!ELEMENT a (b,c|d)>\n]>");
        let err = result.unwrap_err();
        let structured = err.as_structured().unwrap();
        assert_eq!(structured.kind, ParseErrorKind::WellFormedness);
        assert_eq!(structured.location.line, 2);
        assert!(!events.contains(&"end_dtd".to_string()));
    }

    #[test]
    fn test_reset_forgets_entities() {
        let (mut scanner, result, _) = scan(r#"<!DOCTYPE doc [<!ENTITY e "x">]>"#);
        result.unwrap();
        assert!(scanner.general_entity("e").is_some());
        let registry = ConfigurationRegistry::new(
            crate::core::symbols::SymbolTable::new(),
            crate::validation::grammar::GrammarPool::new(),
        );
        scanner.reset(&registry).unwrap();
        assert!(scanner.general_entity("e").is_none());
    }
}
