//! Default DTD Validator
//!
//! Sits in the middle of all three channels. DTD and content model events
//! are recorded into a `DtdGrammar` on their way to the sink; document
//! events are checked against that grammar when validation is on.
//!
//! Validation is active when the validation feature is on and either
//! dynamic validation is off or the document has a grammar. Validity
//! errors abort the parse.
//!
//! With a grammar present (validating or not) the validator also:
//! - adds defaulted attributes, marked unspecified
//! - normalizes non-CDATA attribute values
//! - reports whitespace in element-only content as ignorable

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, trace};

use super::datatypes::{BuiltinDatatypes, DatatypeValidatorFactory};
use super::grammar::{
    parse_content_spec, AttDef, AttDefault, AttType, ContentModelBuilder, ContentSpec, DtdGrammar,
    GrammarPool, NotationDecl,
};
use crate::config::{ConfigurationRegistry, FeatureId};
use crate::core::scanner::is_whitespace;
use crate::core::symbols::SymbolTable;
use crate::error::{Location, Result, StructuredError, XmlError};
use crate::handler::{
    Attribute, Attributes, DocumentHandler, DtdContentModelHandler, DtdHandler, Occurrence, QName,
    Separator,
};
use crate::input::Locator;
use crate::stage::{Component, DeclaredEntity, Validator};

macro_rules! emit {
    ($slot:expr, $method:ident($($arg:expr),*)) => {
        match $slot.as_mut() {
            Some(handler) => handler.$method($($arg),*),
            None => Ok(()),
        }
    };
}

#[derive(Debug, Clone)]
struct Doctype {
    root: String,
    public_id: Option<String>,
    system_id: Option<String>,
}

#[derive(Debug)]
struct ElementFrame {
    name: String,
    children: Vec<String>,
    has_text: bool,
}

/// DTD validator stage
pub struct DefaultValidator {
    document_handler: Option<Box<dyn DocumentHandler>>,
    dtd_handler: Option<Box<dyn DtdHandler>>,
    content_model_handler: Option<Box<dyn DtdContentModelHandler>>,

    // Configuration, refreshed on reset
    validation: bool,
    dynamic: bool,
    load_dtd_grammar: bool,
    load_external_dtd: bool,
    symbols: SymbolTable,
    pool: GrammarPool,
    datatypes: Rc<dyn DatatypeValidatorFactory>,

    // Per-parse state
    locator: Option<Locator>,
    doctype: Option<Doctype>,
    building: Option<DtdGrammar>,
    builder: ContentModelBuilder,
    grammar: Option<Rc<DtdGrammar>>,
    grammar_resolved: bool,
    validating: bool,
    elements: Vec<ElementFrame>,
    seen_root: bool,
    ids: HashSet<String>,
    idrefs: Vec<(String, Location)>,
}

impl DefaultValidator {
    pub fn new() -> Self {
        DefaultValidator {
            document_handler: None,
            dtd_handler: None,
            content_model_handler: None,
            validation: false,
            dynamic: false,
            load_dtd_grammar: true,
            load_external_dtd: true,
            symbols: SymbolTable::new(),
            pool: GrammarPool::new(),
            datatypes: Rc::new(BuiltinDatatypes::new()),
            locator: None,
            doctype: None,
            building: None,
            builder: ContentModelBuilder::default(),
            grammar: None,
            grammar_resolved: false,
            validating: false,
            elements: Vec::new(),
            seen_root: false,
            ids: HashSet::new(),
            idrefs: Vec::new(),
        }
    }

    /// Grammar in effect for the current document, if any
    pub fn grammar(&self) -> Option<&Rc<DtdGrammar>> {
        self.grammar.as_ref()
    }

    pub fn is_validating(&self) -> bool {
        self.validating
    }

    fn location(&self) -> Location {
        self.locator.as_ref().map(Locator::location).unwrap_or_default()
    }

    fn invalid(&self, message: impl Into<String>) -> XmlError {
        StructuredError::validity(message, self.location()).into()
    }

    fn grammar_error(&self, message: impl Into<String>) -> XmlError {
        StructuredError::grammar(message, self.location()).into()
    }

    fn wants_grammar(&self) -> bool {
        self.validation || self.load_dtd_grammar
    }

    /// Settle the grammar for this document: the internal subset merged
    /// with any pooled external subset.
    fn resolve_grammar(&mut self) -> Result<()> {
        if self.grammar_resolved {
            return Ok(());
        }
        self.grammar_resolved = true;

        let internal = self.building.take();
        let external = match &self.doctype {
            Some(d) if self.load_external_dtd || self.validation => self
                .pool
                .lookup(d.system_id.as_deref(), d.public_id.as_deref()),
            _ => None,
        };

        let grammar = match (internal, external) {
            (Some(internal), None) => Rc::new(internal),
            (None, Some(external)) => external,
            (Some(internal), Some(external)) if internal.is_empty() => external,
            (Some(mut internal), Some(external)) => {
                internal.merge_external(&external);
                Rc::new(internal)
            }
            (None, None) => return Ok(()),
        };

        grammar.validate().map_err(|msg| self.grammar_error(msg))?;
        debug!(elements = grammar.element_count(), "grammar resolved");
        self.grammar = Some(grammar);
        Ok(())
    }

    fn check_root(&mut self, name: &str) -> Result<()> {
        if self.seen_root {
            return Ok(());
        }
        self.seen_root = true;
        if self.doctype.is_some() && self.wants_grammar() {
            self.resolve_grammar()?;
        }

        self.validating = self.validation && (!self.dynamic || self.grammar.is_some());
        trace!(validating = self.validating, "root element reached");
        if !self.validating {
            return Ok(());
        }
        match &self.doctype {
            None => Err(self.invalid(format!(
                "document is invalid: no grammar found for root element '{name}'"
            ))),
            Some(d) if d.root != name => Err(self.invalid(format!(
                "root element '{name}' does not match the document type name '{}'",
                d.root
            ))),
            Some(_) => Ok(()),
        }
    }

    fn check_child(&mut self, name: &str) -> Result<()> {
        let Some(grammar) = self.grammar.clone() else {
            return Ok(());
        };
        if self.validating && grammar.element(name).is_none() {
            return Err(self.invalid(format!("element type '{name}' must be declared")));
        }

        let Some(parent) = self.elements.last_mut() else {
            return Ok(());
        };
        parent.children.push(name.to_string());
        if !self.validating {
            return Ok(());
        }
        let parent_name = parent.name.clone();
        match grammar.element(&parent_name) {
            Some(ContentSpec::Empty) => Err(self.invalid(format!(
                "element '{parent_name}' is declared EMPTY but contains '{name}'"
            ))),
            Some(ContentSpec::Mixed(allowed)) if !allowed.iter().any(|a| a == name) => {
                Err(self.invalid(format!(
                    "element '{name}' is not allowed in the mixed content of '{parent_name}'"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Apply declared types and defaults; `None` when nothing changes
    fn process_attributes(&mut self, element: &str, attributes: &Attributes) -> Result<Option<Attributes>> {
        let Some(grammar) = self.grammar.clone() else {
            return Ok(None);
        };
        let defs = grammar.attributes(element);
        if defs.is_empty() && !self.validating {
            return Ok(None);
        }

        let mut out = attributes.clone();
        for index in 0..out.len() {
            let Some(attr) = out.get_mut(index) else {
                continue;
            };
            let raw = attr.name.raw_name.clone();
            let Some(def) = grammar.attribute(element, &raw) else {
                if self.validating && !is_namespace_decl(&raw) {
                    return Err(self.invalid(format!(
                        "attribute '{raw}' must be declared for element type '{element}'"
                    )));
                }
                continue;
            };
            attr.att_type = def.att_type.name();
            if !def.att_type.is_cdata() {
                attr.value = normalize_tokens(&attr.value);
            }
            if self.validating {
                let value = attr.value.clone();
                self.check_attribute_value(&grammar, element, def, &value)?;
            }
        }

        for def in defs {
            if out.index_of(&def.name).is_some() {
                continue;
            }
            match &def.default {
                AttDefault::Required if self.validating => {
                    return Err(self.invalid(format!(
                        "attribute '{}' is required for element type '{element}'",
                        def.name
                    )));
                }
                AttDefault::Default(value) | AttDefault::Fixed(value) => {
                    let value = if def.att_type.is_cdata() {
                        value.clone()
                    } else {
                        normalize_tokens(value)
                    };
                    if self.validating {
                        self.check_attribute_value(&grammar, element, def, &value)?;
                    }
                    out.push(Attribute {
                        name: QName::parse(&self.symbols, &def.name),
                        value,
                        att_type: def.att_type.name(),
                        specified: false,
                    });
                }
                _ => {}
            }
        }
        Ok(Some(out))
    }

    fn check_attribute_value(
        &mut self,
        grammar: &DtdGrammar,
        element: &str,
        def: &AttDef,
        value: &str,
    ) -> Result<()> {
        if let AttDefault::Fixed(fixed) = &def.default {
            if fixed != value {
                return Err(self.invalid(format!(
                    "attribute '{}' of '{element}' must have the fixed value '{fixed}'",
                    def.name
                )));
            }
        }

        if let Some(datatype) = self.datatypes.validator(def.att_type.name()) {
            datatype
                .validate(value)
                .map_err(|msg| self.invalid(format!("attribute '{}': {msg}", def.name)))?;
        }

        match &def.att_type {
            AttType::Enumeration(allowed) | AttType::Notation(allowed) => {
                if !allowed.iter().any(|a| a == value) {
                    return Err(self.invalid(format!(
                        "value '{value}' of attribute '{}' is not among the enumerated values",
                        def.name
                    )));
                }
            }
            AttType::Id => {
                if !self.ids.insert(value.to_string()) {
                    return Err(self.invalid(format!("ID '{value}' is not unique")));
                }
            }
            AttType::IdRef | AttType::IdRefs => {
                let location = self.location();
                for id in value.split_ascii_whitespace() {
                    self.idrefs.push((id.to_string(), location.clone()));
                }
            }
            AttType::Entity | AttType::Entities => {
                for name in value.split_ascii_whitespace() {
                    if !matches!(grammar.entity(name), Some(DeclaredEntity::Unparsed { .. })) {
                        return Err(self.invalid(format!(
                            "attribute '{}' must name an unparsed entity, found '{name}'",
                            def.name
                        )));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_content(&self, frame: &ElementFrame) -> Result<()> {
        let Some(grammar) = self.grammar.as_ref() else {
            return Ok(());
        };
        match grammar.element(&frame.name) {
            Some(ContentSpec::Empty) if frame.has_text || !frame.children.is_empty() => Err(
                self.invalid(format!("element '{}' is declared EMPTY but has content", frame.name)),
            ),
            Some(ContentSpec::Children(model)) => {
                let names: Vec<&str> = frame.children.iter().map(String::as_str).collect();
                if model.matches(&names) {
                    Ok(())
                } else {
                    Err(self.invalid(format!(
                        "the content of element '{}' must match '{model}'",
                        frame.name
                    )))
                }
            }
            _ => Ok(()),
        }
    }

    fn current_spec(&self) -> Option<&ContentSpec> {
        let frame = self.elements.last()?;
        self.grammar.as_ref()?.element(&frame.name)
    }
}

impl Default for DefaultValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_namespace_decl(raw: &str) -> bool {
    raw == "xmlns" || raw.starts_with("xmlns:")
}

/// Collapse whitespace runs and trim, as for tokenized attribute types
fn normalize_tokens(value: &str) -> String {
    value.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Component
// ============================================================================

impl Component for DefaultValidator {
    fn reset(&mut self, config: &ConfigurationRegistry) -> Result<()> {
        self.validation = config.feature(&FeatureId::Validation);
        self.dynamic = config.feature(&FeatureId::DynamicValidation);
        self.load_dtd_grammar = config.feature(&FeatureId::LoadDtdGrammar);
        self.load_external_dtd = config.feature(&FeatureId::LoadExternalDtd);
        self.symbols = config.symbol_table().clone();
        self.pool = config.grammar_pool().clone();
        if let Some(factory) = config.datatype_validator_factory() {
            self.datatypes = factory;
        }

        self.locator = None;
        self.doctype = None;
        self.building = None;
        self.builder = ContentModelBuilder::default();
        self.grammar = None;
        self.grammar_resolved = false;
        self.validating = false;
        self.elements.clear();
        self.seen_root = false;
        self.ids.clear();
        self.idrefs.clear();
        trace!(validation = self.validation, dynamic = self.dynamic, "validator reset");
        Ok(())
    }

    fn set_feature(&mut self, id: &FeatureId, state: bool) -> Result<()> {
        match id {
            FeatureId::Validation => self.validation = state,
            FeatureId::DynamicValidation => self.dynamic = state,
            FeatureId::LoadDtdGrammar => self.load_dtd_grammar = state,
            FeatureId::LoadExternalDtd => self.load_external_dtd = state,
            _ => {}
        }
        Ok(())
    }
}

impl Validator for DefaultValidator {
    fn set_document_handler(&mut self, handler: Option<Box<dyn DocumentHandler>>) {
        self.document_handler = handler;
    }

    fn set_dtd_handler(&mut self, handler: Option<Box<dyn DtdHandler>>) {
        self.dtd_handler = handler;
    }

    fn set_dtd_content_model_handler(&mut self, handler: Option<Box<dyn DtdContentModelHandler>>) {
        self.content_model_handler = handler;
    }
}

// ============================================================================
// Document channel
// ============================================================================

impl DocumentHandler for DefaultValidator {
    fn start_document(&mut self, locator: &Locator, encoding: Option<&str>) -> Result<()> {
        self.locator = Some(locator.clone());
        emit!(self.document_handler, start_document(locator, encoding))
    }

    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<bool>) -> Result<()> {
        emit!(self.document_handler, xml_decl(version, encoding, standalone))
    }

    fn doctype_decl(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        self.doctype = Some(Doctype {
            root: root.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        });
        emit!(self.document_handler, doctype_decl(root, public_id, system_id))
    }

    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> Result<()> {
        emit!(self.document_handler, start_prefix_mapping(prefix, uri))
    }

    fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> Result<()> {
        emit!(self.document_handler, end_prefix_mapping(prefix))
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
        let raw = name.raw_name.as_str();
        self.check_root(raw)?;
        self.check_child(raw)?;
        let processed = self.process_attributes(raw, attributes)?;

        self.elements.push(ElementFrame {
            name: raw.to_string(),
            children: Vec::new(),
            has_text: false,
        });
        emit!(
            self.document_handler,
            start_element(name, processed.as_ref().unwrap_or(attributes))
        )
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        if let Some(frame) = self.elements.pop() {
            if self.validating {
                self.check_content(&frame)?;
            }
        }
        emit!(self.document_handler, end_element(name))
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        let element_only = matches!(self.current_spec(), Some(ContentSpec::Children(_)));
        let empty = matches!(self.current_spec(), Some(ContentSpec::Empty));

        if element_only && is_whitespace(text) {
            return emit!(self.document_handler, ignorable_whitespace(text));
        }
        if self.validating {
            if let Some(frame) = self.elements.last_mut() {
                frame.has_text = true;
            }
            if element_only {
                return Err(self.invalid("character data is not allowed in element-only content"));
            }
            if empty {
                let name = self.elements.last().map(|f| f.name.clone()).unwrap_or_default();
                return Err(self.invalid(format!("element '{name}' is declared EMPTY but has content")));
            }
        }
        emit!(self.document_handler, characters(text))
    }

    fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
        emit!(self.document_handler, ignorable_whitespace(text))
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        if self.validating {
            if let Some(frame) = self.elements.last_mut() {
                frame.has_text = true;
            }
            if matches!(self.current_spec(), Some(ContentSpec::Children(_))) {
                return Err(self.invalid("CDATA section is not allowed in element-only content"));
            }
        }
        emit!(self.document_handler, cdata(text))
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        emit!(self.document_handler, comment(text))
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        emit!(self.document_handler, processing_instruction(target, data))
    }

    fn skipped_entity(&mut self, name: &str) -> Result<()> {
        emit!(self.document_handler, skipped_entity(name))
    }

    fn end_document(&mut self) -> Result<()> {
        if self.validating {
            if let Some((id, location)) = self.idrefs.iter().find(|(id, _)| !self.ids.contains(id)) {
                return Err(StructuredError::validity(
                    format!("IDREF '{id}' does not match any ID in the document"),
                    location.clone(),
                )
                .into());
            }
        }
        emit!(self.document_handler, end_document())
    }
}

// ============================================================================
// DTD channel
// ============================================================================

impl DtdHandler for DefaultValidator {
    fn start_dtd(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        if self.wants_grammar() {
            self.building = Some(DtdGrammar::for_doctype(root, public_id, system_id));
        }
        emit!(self.dtd_handler, start_dtd(root, public_id, system_id))
    }

    fn element_decl(&mut self, name: &str, model: &str) -> Result<()> {
        let built = if self.builder.element_name() == Some(name) {
            self.builder.finish()
        } else {
            None
        };
        if self.building.is_some() {
            let spec = match built {
                Some((_, spec)) => spec,
                None => parse_content_spec(model).map_err(|msg| self.grammar_error(msg))?,
            };
            let validation = self.validation;
            let duplicate = self
                .building
                .as_mut()
                .map(|g| g.add_element(name, spec))
                .and_then(|r| r.err());
            if let (Some(msg), true) = (duplicate, validation) {
                return Err(self.invalid(msg));
            }
        }
        emit!(self.dtd_handler, element_decl(name, model))
    }

    fn attribute_decl(
        &mut self,
        element: &str,
        attribute: &str,
        att_type: &str,
        mode: Option<&str>,
        default: Option<&str>,
    ) -> Result<()> {
        if self.building.is_some() {
            let parsed_type = AttType::parse(att_type);
            let parsed_default = AttDefault::from_decl(mode, default);
            let (Some(att_type), Some(default)) = (parsed_type, parsed_default) else {
                return Err(self.grammar_error(format!(
                    "malformed declaration of attribute '{attribute}' on '{element}'"
                )));
            };
            if let Some(grammar) = self.building.as_mut() {
                grammar.add_attribute(
                    element,
                    AttDef {
                        name: attribute.to_string(),
                        att_type,
                        default,
                    },
                );
            }
        }
        emit!(self.dtd_handler, attribute_decl(element, attribute, att_type, mode, default))
    }

    fn internal_entity_decl(&mut self, name: &str, value: &str) -> Result<()> {
        if let Some(grammar) = self.building.as_mut() {
            if !name.starts_with('%') {
                grammar.add_entity(name, DeclaredEntity::Internal(Rc::from(value)));
            }
        }
        emit!(self.dtd_handler, internal_entity_decl(name, value))
    }

    fn external_entity_decl(&mut self, name: &str, public_id: Option<&str>, system_id: &str) -> Result<()> {
        if let Some(grammar) = self.building.as_mut() {
            if !name.starts_with('%') {
                grammar.add_entity(
                    name,
                    DeclaredEntity::External {
                        public_id: public_id.map(str::to_string),
                        system_id: system_id.to_string(),
                    },
                );
            }
        }
        emit!(self.dtd_handler, external_entity_decl(name, public_id, system_id))
    }

    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: &str,
        notation: &str,
    ) -> Result<()> {
        if let Some(grammar) = self.building.as_mut() {
            grammar.add_entity(
                name,
                DeclaredEntity::Unparsed {
                    public_id: public_id.map(str::to_string),
                    system_id: system_id.to_string(),
                    notation: notation.to_string(),
                },
            );
        }
        emit!(self.dtd_handler, unparsed_entity_decl(name, public_id, system_id, notation))
    }

    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        let duplicate = self
            .building
            .as_mut()
            .map(|g| {
                g.add_notation(
                    name,
                    NotationDecl {
                        public_id: public_id.map(str::to_string),
                        system_id: system_id.map(str::to_string),
                    },
                )
            })
            .and_then(|r| r.err());
        if let (Some(msg), true) = (duplicate, self.validation) {
            return Err(self.invalid(msg));
        }
        emit!(self.dtd_handler, notation_decl(name, public_id, system_id))
    }

    fn dtd_comment(&mut self, text: &str) -> Result<()> {
        emit!(self.dtd_handler, dtd_comment(text))
    }

    fn dtd_processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        emit!(self.dtd_handler, dtd_processing_instruction(target, data))
    }

    fn end_dtd(&mut self) -> Result<()> {
        if self.wants_grammar() {
            self.resolve_grammar()?;
        }
        emit!(self.dtd_handler, end_dtd())
    }
}

// ============================================================================
// Content model channel
// ============================================================================

impl DtdContentModelHandler for DefaultValidator {
    fn start_content_model(&mut self, element: &str) -> Result<()> {
        self.builder.start(element);
        emit!(self.content_model_handler, start_content_model(element))
    }

    fn any(&mut self) -> Result<()> {
        self.builder.any();
        emit!(self.content_model_handler, any())
    }

    fn empty(&mut self) -> Result<()> {
        self.builder.empty();
        emit!(self.content_model_handler, empty())
    }

    fn start_group(&mut self) -> Result<()> {
        self.builder.start_group();
        emit!(self.content_model_handler, start_group())
    }

    fn pcdata(&mut self) -> Result<()> {
        self.builder.pcdata();
        emit!(self.content_model_handler, pcdata())
    }

    fn element(&mut self, name: &str) -> Result<()> {
        self.builder.element(name);
        emit!(self.content_model_handler, element(name))
    }

    fn separator(&mut self, separator: Separator) -> Result<()> {
        self.builder.separator(separator);
        emit!(self.content_model_handler, separator(separator))
    }

    fn occurrence(&mut self, occurrence: Occurrence) -> Result<()> {
        self.builder.occurrence(occurrence);
        emit!(self.content_model_handler, occurrence(occurrence))
    }

    fn end_group(&mut self) -> Result<()> {
        self.builder.end_group();
        emit!(self.content_model_handler, end_group())
    }

    fn end_content_model(&mut self) -> Result<()> {
        emit!(self.content_model_handler, end_content_model())
    }
}
