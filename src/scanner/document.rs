//! Default Document Scanner
//!
//! Single-pass scanner over the decoded document entity. Markup is found
//! with the memchr-backed `Cursor`; every event goes straight to the bound
//! document handler, so nothing is buffered beyond the current tag.
//!
//! The scanner handles:
//! - XML declaration, prolog and epilog
//! - DOCTYPE, handing the internal subset to the bound DTD scanner
//! - namespace processing (when the namespaces feature is on)
//! - character references and internal entity expansion
//!
//! External entities are never read. A reference to one is reported as a
//! skipped entity.

use std::rc::Rc;

use memchr::memchr;
use tracing::{debug, trace};

use super::{
    normalize_attribute_value, read_comment, read_external_id, read_pi, MAX_ENTITY_DEPTH, MAX_ENTITY_EXPANSIONS,
};
use crate::config::{ConfigurationRegistry, FeatureId};
use crate::core::entities::{builtin_entity, decode_char_ref, find_invalid_char};
use crate::core::namespace::NamespaceContext;
use crate::core::scanner::{is_name, Cursor};
use crate::core::symbols::SymbolTable;
use crate::error::{Result, StructuredError, XmlError};
use crate::handler::{Attribute, Attributes, DocumentHandler, NullSink, QName};
use crate::input::{DocumentEntity, Locator};
use crate::stage::{Component, DeclaredEntity, Doctype, DocumentScanner, DtdScannerRef};

/// Configuration captured at reset
#[derive(Clone)]
struct ScanConfig {
    symbols: SymbolTable,
    dtd_scanner: Option<DtdScannerRef>,
    namespaces: bool,
    namespace_prefixes: bool,
}

/// Document scanner stage
pub struct DefaultDocumentScanner {
    handler: Option<Box<dyn DocumentHandler>>,
    config: ScanConfig,
}

impl DefaultDocumentScanner {
    pub fn new() -> Self {
        DefaultDocumentScanner {
            handler: None,
            config: ScanConfig {
                symbols: SymbolTable::new(),
                dtd_scanner: None,
                namespaces: true,
                namespace_prefixes: false,
            },
        }
    }
}

impl Default for DefaultDocumentScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for DefaultDocumentScanner {
    fn reset(&mut self, config: &ConfigurationRegistry) -> Result<()> {
        self.config = ScanConfig {
            symbols: config.symbol_table().clone(),
            dtd_scanner: config.dtd_scanner(),
            namespaces: config.feature(&FeatureId::Namespaces),
            namespace_prefixes: config.feature(&FeatureId::NamespacePrefixes),
        };
        trace!(
            namespaces = self.config.namespaces,
            namespace_prefixes = self.config.namespace_prefixes,
            dtd_scanner = self.config.dtd_scanner.is_some(),
            "document scanner reset"
        );
        Ok(())
    }

    fn set_feature(&mut self, id: &FeatureId, state: bool) -> Result<()> {
        match id {
            FeatureId::Namespaces => self.config.namespaces = state,
            FeatureId::NamespacePrefixes => self.config.namespace_prefixes = state,
            _ => {}
        }
        Ok(())
    }
}

impl DocumentScanner for DefaultDocumentScanner {
    fn set_document_handler(&mut self, handler: Option<Box<dyn DocumentHandler>>) {
        self.handler = handler;
    }

    fn scan_document(&mut self, entity: &DocumentEntity) -> Result<()> {
        let normalized = normalize_newlines(entity);
        let entity = normalized.as_ref().unwrap_or(entity);
        let config = self.config.clone();

        match self.handler.as_deref_mut() {
            Some(handler) => Scan::new(config, entity, handler).run(&entity.text),
            None => Scan::new(config, entity, &mut NullSink).run(&entity.text),
        }
    }
}

/// Map `\r\n` and lone `\r` to `\n`, as every XML processor must
fn normalize_newlines(entity: &DocumentEntity) -> Option<DocumentEntity> {
    memchr(b'\r', entity.text.as_bytes())?;
    let text = entity.text.replace("\r\n", "\n").replace('\r', "\n");
    Some(DocumentEntity {
        text: Rc::from(text),
        ..entity.clone()
    })
}

/// Where positions in the text being scanned map to in the document
#[derive(Debug, Clone, Copy)]
enum Origin {
    Document,
    /// Replacement text of an entity referenced at this document offset
    Entity(usize),
}

impl Origin {
    fn offset(self, pos: usize) -> usize {
        match self {
            Origin::Document => pos,
            Origin::Entity(at) => at,
        }
    }
}

fn not_well_formed(locator: &Locator, origin: Origin, pos: usize, message: impl Into<String>) -> XmlError {
    StructuredError::well_formedness(message, locator.location_at(origin.offset(pos))).into()
}

struct OpenElement {
    name: QName,
    offset: usize,
}

/// Attribute as written in a start tag, value already normalized
struct RawAttribute<'a> {
    name: &'a str,
    value: String,
    pos: usize,
}

/// State of one `scan_document` call
struct Scan<'s, H: ?Sized> {
    handler: &'s mut H,
    config: ScanConfig,
    locator: Locator,
    encoding: Option<&'static str>,
    ns: Option<NamespaceContext>,
    open: Vec<OpenElement>,
    expanding: Vec<String>,
    expansions: usize,
    has_doctype: bool,
    has_external_subset: bool,
    standalone: bool,
}

impl<'s, H: DocumentHandler + ?Sized> Scan<'s, H> {
    fn new(config: ScanConfig, entity: &DocumentEntity, handler: &'s mut H) -> Self {
        let ns = config
            .namespaces
            .then(|| NamespaceContext::new(&config.symbols));
        Scan {
            handler,
            locator: entity.locator(),
            encoding: entity.encoding.map(|e| e.name()),
            ns,
            config,
            open: Vec::new(),
            expanding: Vec::new(),
            expansions: 0,
            has_doctype: false,
            has_external_subset: false,
            standalone: false,
        }
    }

    fn error(&self, origin: Origin, pos: usize, message: impl Into<String>) -> XmlError {
        not_well_formed(&self.locator, origin, pos, message)
    }

    fn mark(&self, origin: Origin, pos: usize) {
        self.locator.set_offset(origin.offset(pos));
    }

    fn run(mut self, text: &str) -> Result<()> {
        let doc = Origin::Document;
        debug!(
            system_id = ?self.locator.system_id(),
            encoding = ?self.encoding,
            namespaces = self.ns.is_some(),
            "scanning document"
        );

        self.handler.start_document(&self.locator, self.encoding)?;
        if let Some((offset, c)) = find_invalid_char(text) {
            return Err(self.error(doc, offset, format!("invalid XML character U+{:04X}", c as u32)));
        }

        let mut cursor = Cursor::new(text);
        cursor.eat("\u{feff}");
        self.prolog(&mut cursor)?;
        self.start_tag(&mut cursor, doc)?;
        self.content(&mut cursor, doc)?;
        self.epilog(&mut cursor)?;

        self.mark(doc, text.len());
        self.handler.end_document()
    }

    // ------------------------------------------------------------------------
    // Prolog and epilog
    // ------------------------------------------------------------------------

    fn prolog(&mut self, cursor: &mut Cursor<'_>) -> Result<()> {
        let doc = Origin::Document;
        if cursor.starts_with("<?xml") && matches!(cursor.peek_at(5), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.xml_decl(cursor)?;
        }

        loop {
            cursor.skip_whitespace();
            let start = cursor.position();
            self.mark(doc, start);
            if cursor.is_eof() {
                return Err(self.error(doc, start, "document has no root element"));
            }
            if cursor.eat("<!--") {
                let text = read_comment(cursor).map_err(|msg| self.error(doc, start, msg))?;
                self.handler.comment(text)?;
            } else if cursor.eat("<?") {
                let (target, data) = read_pi(cursor).map_err(|msg| self.error(doc, start, msg))?;
                self.handler.processing_instruction(target, data)?;
            } else if cursor.eat("<!DOCTYPE") {
                if self.has_doctype {
                    return Err(self.error(doc, start, "only one document type declaration is allowed"));
                }
                self.doctype(cursor, start)?;
            } else if cursor.peek() == Some(b'<') {
                return Ok(());
            } else {
                return Err(self.error(doc, start, "content is not allowed in prolog"));
            }
        }
    }

    fn xml_decl(&mut self, cursor: &mut Cursor<'_>) -> Result<()> {
        let doc = Origin::Document;
        let start = cursor.position();
        cursor.advance(5);
        let body = cursor
            .read_until("?>")
            .ok_or_else(|| self.error(doc, start, "unterminated XML declaration"))?;
        let decl = parse_xml_decl(body).map_err(|msg| self.error(doc, start, msg))?;

        self.standalone = decl.standalone == Some(true);
        self.mark(doc, start);
        self.handler.xml_decl(decl.version, decl.encoding, decl.standalone)
    }

    fn doctype(&mut self, cursor: &mut Cursor<'_>, start: usize) -> Result<()> {
        let doc = Origin::Document;
        if !cursor.skip_whitespace() {
            return Err(self.error(doc, cursor.position(), "whitespace required after '<!DOCTYPE'"));
        }
        let root = cursor
            .read_name()
            .ok_or_else(|| self.error(doc, cursor.position(), "root element type expected"))?;

        let spaced = cursor.skip_whitespace();
        let (public_id, system_id) = if spaced && (cursor.starts_with("SYSTEM") || cursor.starts_with("PUBLIC")) {
            let id = read_external_id(cursor, true).map_err(|msg| self.error(doc, start, msg))?;
            cursor.skip_whitespace();
            (id.public_id, id.system_id)
        } else {
            (None, None)
        };

        let mut internal_subset = None;
        let mut subset_offset = 0;
        if cursor.eat_byte(b'[') {
            subset_offset = cursor.position();
            let len = find_subset_end(cursor.remaining())
                .ok_or_else(|| self.error(doc, start, "unterminated internal subset"))?;
            internal_subset = Some(cursor.slice(subset_offset, subset_offset + len));
            cursor.set_position(subset_offset + len + 1);
            cursor.skip_whitespace();
        }
        if !cursor.eat_byte(b'>') {
            return Err(self.error(doc, start, "'>' expected to close the document type declaration"));
        }

        self.has_doctype = true;
        self.has_external_subset = system_id.is_some();
        self.mark(doc, start);
        self.handler.doctype_decl(root, public_id, system_id)?;

        let Some(dtd) = self.config.dtd_scanner.clone() else {
            debug!(root, "no DTD scanner bound, document type declaration not scanned");
            return Ok(());
        };
        let mut dtd = dtd
            .try_borrow_mut()
            .map_err(|_| XmlError::unexpected_msg("DTD scanner is busy"))?;
        dtd.scan_doctype(
            &Doctype {
                root,
                public_id,
                system_id,
                internal_subset,
                subset_offset,
            },
            &self.locator,
        )
    }

    fn epilog(&mut self, cursor: &mut Cursor<'_>) -> Result<()> {
        let doc = Origin::Document;
        loop {
            cursor.skip_whitespace();
            if cursor.is_eof() {
                return Ok(());
            }
            let start = cursor.position();
            self.mark(doc, start);
            if cursor.eat("<!--") {
                let text = read_comment(cursor).map_err(|msg| self.error(doc, start, msg))?;
                self.handler.comment(text)?;
            } else if cursor.eat("<?") {
                let (target, data) = read_pi(cursor).map_err(|msg| self.error(doc, start, msg))?;
                self.handler.processing_instruction(target, data)?;
            } else {
                return Err(self.error(doc, start, "content is not allowed after the root element"));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    /// Scan element content. In the document this runs until the root
    /// element closes; in entity replacement text it runs to the end of
    /// the text, which must leave the element stack as it found it.
    fn content(&mut self, cursor: &mut Cursor<'_>, origin: Origin) -> Result<()> {
        let floor = match origin {
            Origin::Document => 0,
            Origin::Entity(_) => self.open.len(),
        };

        loop {
            if matches!(origin, Origin::Document) && self.open.is_empty() {
                return Ok(());
            }
            if cursor.is_eof() {
                return match (origin, self.open.last()) {
                    (Origin::Entity(_), _) if self.open.len() == floor => Ok(()),
                    (Origin::Entity(_), _) => Err(self.error(
                        origin,
                        0,
                        "entity replacement text must contain balanced elements",
                    )),
                    (Origin::Document, Some(open)) => Err(self.error(
                        origin,
                        open.offset,
                        format!("element '{}' is not closed", open.name.raw_name),
                    )),
                    (Origin::Document, None) => Ok(()),
                };
            }

            let start = cursor.position();
            match cursor.peek() {
                Some(b'<') => {
                    if cursor.eat("</") {
                        self.end_tag(cursor, origin, start, floor)?;
                    } else if cursor.eat("<!--") {
                        let text = read_comment(cursor).map_err(|msg| self.error(origin, start, msg))?;
                        self.mark(origin, start);
                        self.handler.comment(text)?;
                    } else if cursor.eat("<![CDATA[") {
                        let text = cursor
                            .read_until("]]>")
                            .ok_or_else(|| self.error(origin, start, "unterminated CDATA section"))?;
                        self.mark(origin, start);
                        self.handler.cdata(text)?;
                    } else if cursor.eat("<?") {
                        let (target, data) = read_pi(cursor).map_err(|msg| self.error(origin, start, msg))?;
                        self.mark(origin, start);
                        self.handler.processing_instruction(target, data)?;
                    } else if cursor.starts_with("<!") {
                        return Err(self.error(origin, start, "markup declarations are not allowed in content"));
                    } else {
                        self.start_tag(cursor, origin)?;
                    }
                }
                Some(b'&') => self.reference(cursor, origin, start)?,
                _ => self.text(cursor, origin, start)?,
            }
        }
    }

    fn text(&mut self, cursor: &mut Cursor<'_>, origin: Origin, start: usize) -> Result<()> {
        let end = cursor.find_byte2(b'<', b'&').unwrap_or(cursor.input().len());
        let text = cursor.slice(start, end);
        if let Some(i) = text.find("]]>") {
            return Err(self.error(origin, start + i, "']]>' is not allowed in content"));
        }
        cursor.set_position(end);
        self.mark(origin, start);
        self.handler.characters(text)
    }

    fn reference(&mut self, cursor: &mut Cursor<'_>, origin: Origin, start: usize) -> Result<()> {
        cursor.advance(1);
        let semi = cursor
            .find_byte(b';')
            .ok_or_else(|| self.error(origin, start, "reference is missing ';'"))?;
        let body = cursor.slice(cursor.position(), semi);
        cursor.set_position(semi + 1);
        self.mark(origin, start);

        if let Some(num) = body.strip_prefix('#') {
            let c = decode_char_ref(num)
                .ok_or_else(|| self.error(origin, start, format!("invalid character reference '&{body};'")))?;
            let mut buf = [0u8; 4];
            return self.handler.characters(c.encode_utf8(&mut buf));
        }
        if !is_name(body) {
            return Err(self.error(origin, start, format!("invalid entity reference '&{body};'")));
        }
        if let Some(text) = builtin_entity(body) {
            return self.handler.characters(text);
        }

        match self.general_entity(body) {
            Some(DeclaredEntity::Internal(replacement)) => self.expand(body, replacement, origin, start),
            Some(DeclaredEntity::External { .. }) => {
                trace!(entity = body, "external entity not read");
                self.handler.skipped_entity(body)
            }
            Some(DeclaredEntity::Unparsed { .. }) => Err(self.error(
                origin,
                start,
                format!("reference to unparsed entity '{body}'"),
            )),
            None if self.has_external_subset && !self.standalone => self.handler.skipped_entity(body),
            None => Err(self.error(
                origin,
                start,
                format!("entity '{body}' was referenced but not declared"),
            )),
        }
    }

    fn expand(&mut self, name: &str, replacement: Rc<str>, origin: Origin, start: usize) -> Result<()> {
        if self.expanding.iter().any(|e| e == name) {
            return Err(self.error(origin, start, format!("recursive reference to entity '{name}'")));
        }
        if self.expanding.len() >= MAX_ENTITY_DEPTH {
            return Err(self.error(origin, start, format!("entity '{name}' is nested too deeply")));
        }
        self.expansions += 1;
        if self.expansions > MAX_ENTITY_EXPANSIONS {
            return Err(self.error(
                origin,
                start,
                format!("more than {MAX_ENTITY_EXPANSIONS} entity expansions in one document"),
            ));
        }

        self.expanding.push(name.to_string());
        let mut cursor = Cursor::new(&replacement);
        let result = self.content(&mut cursor, Origin::Entity(origin.offset(start)));
        self.expanding.pop();
        result
    }

    fn general_entity(&self, name: &str) -> Option<DeclaredEntity> {
        if !self.has_doctype {
            return None;
        }
        let dtd = self.config.dtd_scanner.as_ref()?.try_borrow().ok()?;
        dtd.general_entity(name)
    }

    // ------------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------------

    fn start_tag(&mut self, cursor: &mut Cursor<'_>, origin: Origin) -> Result<()> {
        let start = cursor.position();
        cursor.advance(1);
        let raw = cursor
            .read_name()
            .ok_or_else(|| self.error(origin, start, "element name expected"))?;

        let mut attrs: Vec<RawAttribute<'_>> = Vec::new();
        let empty = loop {
            let spaced = cursor.skip_whitespace();
            match cursor.peek() {
                Some(b'>') => {
                    cursor.advance(1);
                    break false;
                }
                Some(b'/') => {
                    if cursor.eat("/>") {
                        break true;
                    }
                    return Err(self.error(origin, cursor.position(), "'>' expected after '/'"));
                }
                None => {
                    return Err(self.error(origin, start, format!("start tag '{raw}' is not terminated")));
                }
                Some(_) => {
                    if !spaced {
                        return Err(self.error(origin, cursor.position(), "whitespace required before attribute"));
                    }
                    let pos = cursor.position();
                    let name = cursor
                        .read_name()
                        .ok_or_else(|| self.error(origin, pos, "attribute name expected"))?;
                    cursor.skip_whitespace();
                    if !cursor.eat_byte(b'=') {
                        return Err(self.error(origin, pos, format!("'=' expected after attribute '{name}'")));
                    }
                    cursor.skip_whitespace();
                    let literal = cursor
                        .read_quoted()
                        .ok_or_else(|| self.error(origin, pos, format!("quoted value expected for attribute '{name}'")))?;
                    if attrs.iter().any(|a| a.name == name) {
                        return Err(self.error(origin, pos, format!("attribute '{name}' appears more than once")));
                    }
                    let value = normalize_attribute_value(literal, &|n: &str| self.general_entity(n))
                        .map_err(|msg| self.error(origin, pos, msg))?;
                    attrs.push(RawAttribute { name, value, pos });
                }
            }
        };

        self.mark(origin, start);
        self.start_element(raw, attrs, empty, origin, start)
    }

    fn start_element(
        &mut self,
        raw: &str,
        attrs: Vec<RawAttribute<'_>>,
        empty: bool,
        origin: Origin,
        start: usize,
    ) -> Result<()> {
        let symbols = self.config.symbols.clone();
        let mut name = QName::parse(&symbols, raw);
        let mut attributes = Attributes::new();

        match self.ns.as_mut() {
            None => {
                for a in attrs {
                    attributes.push(Attribute {
                        name: QName::parse(&symbols, a.name),
                        value: a.value,
                        att_type: "CDATA",
                        specified: true,
                    });
                }
            }
            Some(ns) => {
                ns.push_scope();
                let mut declared = Vec::new();
                for a in &attrs {
                    let prefix = match a.name.strip_prefix("xmlns") {
                        Some("") => None,
                        Some(rest) => match rest.strip_prefix(':') {
                            Some(p) => Some(p),
                            None => continue,
                        },
                        None => continue,
                    };
                    if let Err(msg) = ns.declare(prefix.map(|p| symbols.intern(p)), symbols.intern(&a.value)) {
                        return Err(not_well_formed(&self.locator, origin, a.pos, msg));
                    }
                    declared.push((prefix, a.value.clone()));
                }

                name.uri = match name.prefix.as_deref() {
                    Some(prefix) => Some(ns.resolve(Some(prefix)).ok_or_else(|| {
                        not_well_formed(
                            &self.locator,
                            origin,
                            start,
                            format!("element prefix '{prefix}' is not bound"),
                        )
                    })?),
                    None => ns.resolve(None),
                };

                for a in attrs {
                    let is_decl = a.name == "xmlns" || a.name.starts_with("xmlns:");
                    if is_decl && !self.config.namespace_prefixes {
                        continue;
                    }
                    let mut attr_name = QName::parse(&symbols, a.name);
                    if !is_decl {
                        if let Some(prefix) = attr_name.prefix.as_deref() {
                            attr_name.uri = Some(ns.resolve(Some(prefix)).ok_or_else(|| {
                                not_well_formed(
                                    &self.locator,
                                    origin,
                                    a.pos,
                                    format!("attribute prefix '{prefix}' is not bound"),
                                )
                            })?);
                        }
                    }
                    if let Some(uri) = attr_name.uri.as_deref() {
                        if attributes.index_of_ns(uri, &attr_name.local_name).is_some() {
                            return Err(not_well_formed(
                                &self.locator,
                                origin,
                                a.pos,
                                format!("attribute '{}' in namespace '{uri}' appears more than once", attr_name.local_name),
                            ));
                        }
                    }
                    attributes.push(Attribute {
                        name: attr_name,
                        value: a.value,
                        att_type: "CDATA",
                        specified: true,
                    });
                }

                for (prefix, uri) in declared {
                    self.handler.start_prefix_mapping(prefix, &uri)?;
                }
            }
        }

        self.handler.start_element(&name, &attributes)?;
        if empty {
            self.handler.end_element(&name)?;
            self.end_scope()
        } else {
            self.open.push(OpenElement {
                name,
                offset: origin.offset(start),
            });
            Ok(())
        }
    }

    fn end_tag(&mut self, cursor: &mut Cursor<'_>, origin: Origin, start: usize, floor: usize) -> Result<()> {
        let raw = cursor
            .read_name()
            .ok_or_else(|| self.error(origin, start, "element name expected in end tag"))?;
        cursor.skip_whitespace();
        if !cursor.eat_byte(b'>') {
            return Err(self.error(origin, start, format!("end tag '{raw}' is not terminated")));
        }
        if self.open.len() <= floor {
            return Err(self.error(
                origin,
                start,
                format!("end tag '{raw}' closes an element started outside the entity"),
            ));
        }
        let Some(open) = self.open.pop() else {
            return Err(self.error(origin, start, format!("unexpected end tag '{raw}'")));
        };
        if open.name.raw_name != raw {
            return Err(self.error(
                origin,
                start,
                format!(
                    "end tag '{raw}' does not match start tag '{}'",
                    open.name.raw_name
                ),
            ));
        }

        self.mark(origin, start);
        self.handler.end_element(&open.name)?;
        self.end_scope()
    }

    fn end_scope(&mut self) -> Result<()> {
        let Some(ns) = self.ns.as_mut() else {
            return Ok(());
        };
        for prefix in ns.pop_scope() {
            self.handler.end_prefix_mapping(prefix.as_deref())?;
        }
        Ok(())
    }
}

struct XmlDecl<'a> {
    version: &'a str,
    encoding: Option<&'a str>,
    standalone: Option<bool>,
}

/// Parse the pseudo-attributes between `<?xml` and `?>`
fn parse_xml_decl(body: &str) -> std::result::Result<XmlDecl<'_>, String> {
    let mut cursor = Cursor::new(body);
    let mut pairs = Vec::new();
    loop {
        let spaced = cursor.skip_whitespace();
        if cursor.is_eof() {
            break;
        }
        if !spaced {
            return Err("whitespace required between XML declaration attributes".to_string());
        }
        let name = cursor
            .read_name()
            .ok_or_else(|| "malformed XML declaration".to_string())?;
        cursor.skip_whitespace();
        if !cursor.eat_byte(b'=') {
            return Err(format!("'=' expected after '{name}' in XML declaration"));
        }
        cursor.skip_whitespace();
        let value = cursor
            .read_quoted()
            .ok_or_else(|| format!("quoted value expected for '{name}' in XML declaration"))?;
        pairs.push((name, value));
    }

    let mut pairs = pairs.into_iter().peekable();
    let version = match pairs.next() {
        Some(("version", v)) => v,
        _ => return Err("XML declaration must start with the version".to_string()),
    };
    let valid_version = version
        .strip_prefix("1.")
        .is_some_and(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()));
    if !valid_version {
        return Err(format!("unsupported XML version '{version}'"));
    }

    let encoding = match pairs.peek() {
        Some(&("encoding", e)) => {
            pairs.next();
            let valid = e.as_bytes().first().is_some_and(u8::is_ascii_alphabetic)
                && e.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
            if !valid {
                return Err(format!("invalid encoding name '{e}'"));
            }
            Some(e)
        }
        _ => None,
    };

    let standalone = match pairs.peek() {
        Some(&("standalone", v)) => {
            pairs.next();
            match v {
                "yes" => Some(true),
                "no" => Some(false),
                other => return Err(format!("standalone must be 'yes' or 'no', not '{other}'")),
            }
        }
        _ => None,
    };

    if let Some((name, _)) = pairs.next() {
        return Err(format!("unexpected '{name}' in XML declaration"));
    }

    Ok(XmlDecl {
        version,
        encoding,
        standalone,
    })
}

/// Length of the internal subset: offset of the `]` that closes it,
/// skipping literals, comments and processing instructions
fn find_subset_end(subset: &str) -> Option<usize> {
    let bytes = subset.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b']' => return Some(i),
            q @ (b'"' | b'\'') => {
                i += memchr(q, &bytes[i + 1..])? + 2;
                continue;
            }
            b'<' if bytes[i..].starts_with(b"<!--") => {
                i += memchr::memmem::find(&bytes[i + 4..], b"-->")? + 7;
                continue;
            }
            b'<' if bytes[i..].starts_with(b"<?") => {
                i += memchr::memmem::find(&bytes[i + 2..], b"?>")? + 4;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use crate::scanner::DefaultDtdScanner;
    use crate::stage::{dtd_scanner, DtdScanner};
    use crate::validation::grammar::GrammarPool;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl DocumentHandler for Log {
        fn start_document(&mut self, _locator: &Locator, _encoding: Option<&str>) -> Result<()> {
            self.0.push("start_document".to_string());
            Ok(())
        }

        fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<bool>) -> Result<()> {
            self.0.push(format!("xml_decl {version} {encoding:?} {standalone:?}"));
            Ok(())
        }

        fn doctype_decl(&mut self, root: &str, _public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
            self.0.push(format!("doctype {root} {system_id:?}"));
            Ok(())
        }

        fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> Result<()> {
            self.0.push(format!("start_prefix {prefix:?} {uri}"));
            Ok(())
        }

        fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> Result<()> {
            self.0.push(format!("end_prefix {prefix:?}"));
            Ok(())
        }

        fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
            let attrs: Vec<String> = attributes
                .iter()
                .map(|a| match &a.name.uri {
                    Some(uri) => format!("{{{uri}}}{}={}", a.name.local_name, a.value),
                    None => format!("{}={}", a.name.raw_name, a.value),
                })
                .collect();
            match &name.uri {
                Some(uri) => self.0.push(format!("start {{{uri}}}{} {attrs:?}", name.local_name)),
                None => self.0.push(format!("start {} {attrs:?}", name.raw_name)),
            }
            Ok(())
        }

        fn end_element(&mut self, name: &QName) -> Result<()> {
            self.0.push(format!("end {}", name.raw_name));
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("chars {text:?}"));
            Ok(())
        }

        fn cdata(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("cdata {text:?}"));
            Ok(())
        }

        fn comment(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("comment {text:?}"));
            Ok(())
        }

        fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
            self.0.push(format!("pi {target} {data:?}"));
            Ok(())
        }

        fn skipped_entity(&mut self, name: &str) -> Result<()> {
            self.0.push(format!("skipped {name}"));
            Ok(())
        }

        fn end_document(&mut self) -> Result<()> {
            self.0.push("end_document".to_string());
            Ok(())
        }
    }

    fn scanner(namespaces: bool) -> (DefaultDocumentScanner, Rc<RefCell<Log>>) {
        let registry = ConfigurationRegistry::new(SymbolTable::new(), GrammarPool::new());
        let mut scanner = DefaultDocumentScanner::new();
        scanner.reset(&registry).unwrap();
        scanner.config.dtd_scanner = Some(dtd_scanner(DefaultDtdScanner::new()));
        scanner.set_feature(&FeatureId::Namespaces, namespaces).unwrap();
        let log = Rc::new(RefCell::new(Log::default()));
        scanner.set_document_handler(Some(Box::new(Rc::clone(&log))));
        (scanner, log)
    }

    fn scan(text: &str) -> Vec<String> {
        let (mut scanner, log) = scanner(true);
        scanner.scan_document(&DocumentEntity::from_text(text)).unwrap();
        let events = log.borrow().0.clone();
        events
    }

    fn scan_err(text: &str) -> StructuredError {
        let (mut scanner, _) = scanner(true);
        match scanner.scan_document(&DocumentEntity::from_text(text)) {
            Err(XmlError::Parse(e)) => e,
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_minimal_document() {
        assert_eq!(
            scan("<doc/>"),
            vec!["start_document", "start doc []", "end doc", "end_document"]
        );
    }

    #[test]
    fn test_prolog_content_and_epilog() {
        let events = scan(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <!-- c --><?pi data?>\n\
             <doc a=\"1\">x<![CDATA[<y>]]>&amp;&#65;</doc>\n<!-- after -->",
        );
        assert_eq!(
            events,
            vec![
                "start_document",
                "xml_decl 1.0 Some(\"UTF-8\") Some(true)",
                "comment \" c \"",
                "pi pi Some(\"data\")",
                "start doc [\"a=1\"]",
                "chars \"x\"",
                "cdata \"<y>\"",
                "chars \"&\"",
                "chars \"A\"",
                "end doc",
                "comment \" after \"",
                "end_document",
            ]
        );
    }

    #[test]
    fn test_namespaces() {
        let events = scan(r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:c p:x="1" y="2"/></r>"#);
        assert_eq!(
            events,
            vec![
                "start_document",
                "start_prefix None urn:d",
                "start_prefix Some(\"p\") urn:p",
                "start {urn:d}r []",
                "start {urn:p}c [\"{urn:p}x=1\", \"y=2\"]",
                "end p:c",
                "end r",
                "end_prefix Some(\"p\")",
                "end_prefix None",
                "end_document",
            ]
        );
    }

    #[test]
    fn test_namespace_prefixes_feature() {
        let (mut scanner, log) = scanner(true);
        scanner
            .set_feature(&FeatureId::NamespacePrefixes, true)
            .unwrap();
        scanner
            .scan_document(&DocumentEntity::from_text(r#"<r xmlns:p="urn:p"/>"#))
            .unwrap();
        assert!(log.borrow().0.contains(&"start r [\"xmlns:p=urn:p\"]".to_string()));
    }

    #[test]
    fn test_namespaces_off() {
        let (mut scanner, log) = scanner(false);
        scanner
            .scan_document(&DocumentEntity::from_text(r#"<p:r xmlns:p="urn:p"/>"#))
            .unwrap();
        assert_eq!(log.borrow().0[1], "start p:r [\"xmlns:p=urn:p\"]");
    }

    #[test]
    fn test_unbound_prefix() {
        let err = scan_err("<doc>\n  <p:a/>\n</doc>");
        assert_eq!(err.kind, ParseErrorKind::WellFormedness);
        assert_eq!(err.location.line, 2);
        assert!(err.message.contains("'p'"));
    }

    #[test]
    fn test_internal_entities_expand() {
        let events = scan(
            r#"<!DOCTYPE doc [
<!ENTITY who "World">
<!ENTITY greet "Hello, &who;!">
<!ENTITY bold "<b>&who;</b>">
]><doc t="&greet;">&bold;</doc>"#,
        );
        assert_eq!(
            events,
            vec![
                "start_document",
                "doctype doc None",
                "start doc [\"t=Hello, World!\"]",
                "start b []",
                "chars \"World\"",
                "end b",
                "end doc",
                "end_document",
            ]
        );
    }

    #[test]
    fn test_markup_in_attribute_entity() {
        let err = scan_err(r#"<!DOCTYPE doc [<!ENTITY tag "<b/>">]><doc t="&tag;"/>"#);
        assert!(err.message.contains("'<'"));
    }

    #[test]
    fn test_undeclared_entity() {
        let err = scan_err("<doc>&nope;</doc>");
        assert!(err.message.contains("nope"));

        let events = scan("<!DOCTYPE doc SYSTEM \"doc.dtd\"><doc>&nope;</doc>");
        assert!(events.contains(&"skipped nope".to_string()));

        let err = scan_err("<?xml version='1.0' standalone='yes'?><!DOCTYPE doc SYSTEM 'doc.dtd'><doc>&nope;</doc>");
        assert!(err.message.contains("not declared"));
    }

    #[test]
    fn test_recursive_entity() {
        let err = scan_err(r#"<!DOCTYPE doc [<!ENTITY a "&b;"><!ENTITY b "&a;">]><doc>&a;</doc>"#);
        assert!(err.message.contains("recursive"));
    }

    #[test]
    fn test_expansion_limit() {
        let mut subset = String::from(r#"<!ENTITY e0 "lol">"#);
        for level in 1..6 {
            let refs = format!("&e{};", level - 1).repeat(10);
            subset.push_str(&format!(r#"<!ENTITY e{level} "{refs}">"#));
        }
        let err = scan_err(&format!("<!DOCTYPE doc [{subset}]><doc>&e5;</doc>"));
        assert!(err.message.contains("entity expansions"));

        let events = scan(&format!("<!DOCTYPE doc [{subset}]><doc>&e1;</doc>"));
        let lols: usize = events.iter().map(|e| e.matches("lol").count()).sum();
        assert_eq!(lols, 10);
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = scan_err("<a>\n<b>\n</a>");
        assert_eq!(err.location.line, 3);
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_unclosed_and_trailing() {
        assert!(scan_err("<a><b></b>").message.contains("not closed"));
        assert!(scan_err("<a/><b/>").message.contains("after the root"));
        assert!(scan_err("text<a/>").message.contains("prolog"));
        assert!(scan_err("").message.contains("no root"));
        assert!(scan_err("<a x='1' x='2'/>").message.contains("more than once"));
    }

    #[test]
    fn test_crlf_normalized() {
        let events = scan("<a>x\r\ny\rz</a>");
        assert_eq!(events[2], "chars \"x\\ny\\nz\"");
    }

    #[test]
    fn test_subset_end_skips_literals() {
        assert_eq!(find_subset_end(r#"<!ENTITY x "]">]>"#), Some(15));
        assert_eq!(find_subset_end("<!-- ] -->]"), Some(10));
        assert_eq!(find_subset_end("<!ENTITY x 'y'>"), None);
    }

    #[test]
    fn test_xml_decl_rules() {
        assert!(parse_xml_decl(" version='1.0'").is_ok());
        assert!(parse_xml_decl(" encoding='UTF-8'").is_err());
        assert!(parse_xml_decl(" version='2.0'").is_err());
        assert!(parse_xml_decl(" version='1.0' standalone='maybe'").is_err());
        assert!(parse_xml_decl(" version='1.0' standalone='no' encoding='UTF-8'").is_err());
    }

    #[test]
    fn test_dtd_scanner_sees_subset() {
        let (mut scanner, _) = scanner(true);
        scanner
            .scan_document(&DocumentEntity::from_text(
                r#"<!DOCTYPE doc [<!ENTITY e "v">]><doc/>"#,
            ))
            .unwrap();
        let dtd = scanner.config.dtd_scanner.clone().unwrap();
        assert_eq!(
            dtd.borrow().general_entity("e"),
            Some(DeclaredEntity::Internal(Rc::from("v")))
        );
    }
}
