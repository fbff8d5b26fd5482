//! Handler Capabilities
//!
//! The three event channels of the pipeline, as traits:
//!
//! ```text
//! document:       DocumentScanner ---> Validator ---> EventSink
//! DTD:            DtdScanner ------> Validator ---> EventSink
//! content model:  DtdScanner ------> Validator ---> EventSink
//! ```
//!
//! Every method has a no-op default so a stage or sink implements only what
//! it cares about. Returning an error from any callback aborts the parse.
//!
//! Stages are shared as `Rc<RefCell<_>>`; the blanket impls at the bottom
//! let such a handle stand in wherever a handler is expected. A callback
//! that re-enters a stage already on the stack gets an error instead of a
//! borrow panic.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::symbols::{Symbol, SymbolTable};
use crate::error::{Result, XmlError};
use crate::input::Locator;

// ============================================================================
// Event payloads
// ============================================================================

/// A qualified name: raw `prefix:local` plus the namespace URI, if resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<Symbol>,
    pub local_name: Symbol,
    pub raw_name: Symbol,
    pub uri: Option<Symbol>,
}

impl QName {
    /// Split a raw name at its first colon, interning every part
    pub fn parse(symbols: &SymbolTable, raw: &str) -> Self {
        let raw_name = symbols.intern(raw);
        match raw.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => QName {
                prefix: Some(symbols.intern(prefix)),
                local_name: symbols.intern(local),
                raw_name,
                uri: None,
            },
            _ => QName {
                prefix: None,
                local_name: raw_name.clone(),
                raw_name,
                uri: None,
            },
        }
    }

    pub fn with_uri(mut self, uri: Option<Symbol>) -> Self {
        self.uri = uri;
        self
    }

    pub fn as_str(&self) -> &str {
        &self.raw_name
    }
}

/// One attribute of a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    /// Normalized value, references expanded
    pub value: String,
    /// Declared type ("CDATA" when undeclared)
    pub att_type: &'static str,
    /// False for values supplied from a DTD default
    pub specified: bool,
}

/// Ordered attribute list of a start tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    list: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attr: Attribute) {
        self.list.push(attr);
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.list.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Attribute> {
        self.list.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.list.iter()
    }

    pub fn index_of(&self, raw_name: &str) -> Option<usize> {
        self.list.iter().position(|a| a.name.raw_name == raw_name)
    }

    /// Look up by namespace URI and local name
    pub fn index_of_ns(&self, uri: &str, local_name: &str) -> Option<usize> {
        self.list.iter().position(|a| {
            a.name.uri.as_deref() == Some(uri) && a.name.local_name == local_name
        })
    }

    /// Value of the attribute with this raw name
    pub fn value(&self, raw_name: &str) -> Option<&str> {
        self.index_of(raw_name).map(|i| self.list[i].value.as_str())
    }

    pub fn remove(&mut self, index: usize) -> Attribute {
        self.list.remove(index)
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

/// Connector between the children of a content-model group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `,`
    Sequence,
    /// `|`
    Choice,
}

/// Occurrence indicator after a content particle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// `?`
    ZeroOrOne,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Occurrence {
    pub fn as_char(self) -> char {
        match self {
            Occurrence::ZeroOrOne => '?',
            Occurrence::ZeroOrMore => '*',
            Occurrence::OneOrMore => '+',
        }
    }
}

// ============================================================================
// Channel traits
// ============================================================================

/// Receives document content events
#[allow(unused_variables)]
pub trait DocumentHandler {
    fn start_document(&mut self, locator: &Locator, encoding: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<bool>) -> Result<()> {
        Ok(())
    }

    fn doctype_decl(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// `prefix` is `None` for the default namespace
    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> Result<()> {
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// An entity reference that was not expanded
    fn skipped_entity(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives DTD declaration events
///
/// Parameter entity names carry their leading `%`.
#[allow(unused_variables)]
pub trait DtdHandler {
    fn start_dtd(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// `model` is the normalized content model text, e.g. `(a,b*)`
    fn element_decl(&mut self, name: &str, model: &str) -> Result<()> {
        Ok(())
    }

    /// `att_type` is the declared type as written (`CDATA`, `(a|b)`,
    /// `NOTATION (x|y)`); `mode` is `#REQUIRED`, `#IMPLIED` or `#FIXED`.
    fn attribute_decl(
        &mut self,
        element: &str,
        attribute: &str,
        att_type: &str,
        mode: Option<&str>,
        default: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    fn internal_entity_decl(&mut self, name: &str, value: &str) -> Result<()> {
        Ok(())
    }

    fn external_entity_decl(&mut self, name: &str, public_id: Option<&str>, system_id: &str) -> Result<()> {
        Ok(())
    }

    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: &str,
        notation: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn dtd_comment(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    fn dtd_processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn end_dtd(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives the structure of one element's content model, emitted just
/// before the matching `element_decl`
#[allow(unused_variables)]
pub trait DtdContentModelHandler {
    fn start_content_model(&mut self, element: &str) -> Result<()> {
        Ok(())
    }

    fn any(&mut self) -> Result<()> {
        Ok(())
    }

    fn empty(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_group(&mut self) -> Result<()> {
        Ok(())
    }

    fn pcdata(&mut self) -> Result<()> {
        Ok(())
    }

    fn element(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    fn separator(&mut self, separator: Separator) -> Result<()> {
        Ok(())
    }

    fn occurrence(&mut self, occurrence: Occurrence) -> Result<()> {
        Ok(())
    }

    fn end_group(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_content_model(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Terminal consumer of all three channels
pub trait EventSink: DocumentHandler + DtdHandler + DtdContentModelHandler {}

impl<T: DocumentHandler + DtdHandler + DtdContentModelHandler + ?Sized> EventSink for T {}

/// A sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DocumentHandler for NullSink {}
impl DtdHandler for NullSink {}
impl DtdContentModelHandler for NullSink {}

// ============================================================================
// Shared handles
// ============================================================================

fn busy<T: ?Sized>(cell: &RefCell<T>) -> Result<std::cell::RefMut<'_, T>> {
    cell.try_borrow_mut().map_err(|_| {
        XmlError::unexpected_msg(format!(
            "handler {} re-entered while already dispatching an event",
            std::any::type_name::<T>()
        ))
    })
}

macro_rules! forward {
    ($( fn $name:ident(&mut self $(, $arg:ident : $ty:ty)* ); )*) => {
        $(
            fn $name(&mut self $(, $arg: $ty)*) -> Result<()> {
                busy(&**self)?.$name($($arg),*)
            }
        )*
    };
}

impl<T: DocumentHandler + ?Sized> DocumentHandler for Rc<RefCell<T>> {
    forward! {
        fn start_document(&mut self, locator: &Locator, encoding: Option<&str>);
        fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<bool>);
        fn doctype_decl(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>);
        fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str);
        fn end_prefix_mapping(&mut self, prefix: Option<&str>);
        fn start_element(&mut self, name: &QName, attributes: &Attributes);
        fn end_element(&mut self, name: &QName);
        fn characters(&mut self, text: &str);
        fn ignorable_whitespace(&mut self, text: &str);
        fn cdata(&mut self, text: &str);
        fn comment(&mut self, text: &str);
        fn processing_instruction(&mut self, target: &str, data: Option<&str>);
        fn skipped_entity(&mut self, name: &str);
        fn end_document(&mut self);
    }
}

impl<T: DtdHandler + ?Sized> DtdHandler for Rc<RefCell<T>> {
    forward! {
        fn start_dtd(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>);
        fn element_decl(&mut self, name: &str, model: &str);
        fn attribute_decl(
            &mut self,
            element: &str,
            attribute: &str,
            att_type: &str,
            mode: Option<&str>,
            default: Option<&str>
        );
        fn internal_entity_decl(&mut self, name: &str, value: &str);
        fn external_entity_decl(&mut self, name: &str, public_id: Option<&str>, system_id: &str);
        fn unparsed_entity_decl(
            &mut self,
            name: &str,
            public_id: Option<&str>,
            system_id: &str,
            notation: &str
        );
        fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>);
        fn dtd_comment(&mut self, text: &str);
        fn dtd_processing_instruction(&mut self, target: &str, data: Option<&str>);
        fn end_dtd(&mut self);
    }
}

impl<T: DtdContentModelHandler + ?Sized> DtdContentModelHandler for Rc<RefCell<T>> {
    forward! {
        fn start_content_model(&mut self, element: &str);
        fn any(&mut self);
        fn empty(&mut self);
        fn start_group(&mut self);
        fn pcdata(&mut self);
        fn element(&mut self, name: &str);
        fn separator(&mut self, separator: Separator);
        fn occurrence(&mut self, occurrence: Occurrence);
        fn end_group(&mut self);
        fn end_content_model(&mut self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Count {
        elements: usize,
    }

    impl DocumentHandler for Count {
        fn start_element(&mut self, _name: &QName, _attributes: &Attributes) -> Result<()> {
            self.elements += 1;
            Ok(())
        }
    }

    #[test]
    fn test_qname_parse() {
        let symbols = SymbolTable::new();
        let q = QName::parse(&symbols, "svg:rect");
        assert_eq!(q.prefix.as_deref(), Some("svg"));
        assert_eq!(q.local_name, "rect");
        assert_eq!(q.raw_name, "svg:rect");

        let q = QName::parse(&symbols, "rect");
        assert_eq!(q.prefix, None);
        assert!(q.local_name.ptr_eq(&q.raw_name));
    }

    #[test]
    fn test_attributes_lookup() {
        let symbols = SymbolTable::new();
        let mut attrs = Attributes::new();
        attrs.push(Attribute {
            name: QName::parse(&symbols, "x:id").with_uri(Some(symbols.intern("urn:x"))),
            value: "1".to_string(),
            att_type: "CDATA",
            specified: true,
        });
        assert_eq!(attrs.value("x:id"), Some("1"));
        assert_eq!(attrs.index_of_ns("urn:x", "id"), Some(0));
        assert_eq!(attrs.index_of("id"), None);
    }

    #[test]
    fn test_shared_handle_forwards() {
        let shared = Rc::new(RefCell::new(Count::default()));
        let mut handle: Box<dyn DocumentHandler> = Box::new(Rc::clone(&shared));
        let symbols = SymbolTable::new();
        handle
            .start_element(&QName::parse(&symbols, "a"), &Attributes::new())
            .unwrap();
        assert_eq!(shared.borrow().elements, 1);
    }

    #[test]
    fn test_reentrant_borrow_is_an_error() {
        let shared = Rc::new(RefCell::new(Count::default()));
        let mut handle = Rc::clone(&shared);
        let _held = shared.borrow_mut();
        let err = handle.characters("x").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::WrappedUnexpected);
    }
}
