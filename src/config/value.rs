//! Property Values

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::ids::PropertyId;
use crate::core::symbols::SymbolTable;
use crate::stage::{DocumentScannerRef, DtdScannerRef, ValidatorRef};
use crate::validation::datatypes::DatatypeValidatorFactory;
use crate::validation::grammar::GrammarPool;

/// Value stored under a property id
///
/// Component-valued variants carry shared handles, so cloning a value
/// never copies a stage.
#[derive(Clone)]
pub enum PropertyValue {
    SymbolTable(SymbolTable),
    GrammarPool(GrammarPool),
    DocumentScanner(DocumentScannerRef),
    DtdScanner(DtdScannerRef),
    Validator(ValidatorRef),
    DatatypeValidatorFactory(Rc<dyn DatatypeValidatorFactory>),
    Text(String),
    Integer(i64),
    Object(Rc<dyn Any>),
}

impl PropertyValue {
    /// Whether this value has the shape `id` requires.
    ///
    /// Extension properties take any value.
    pub fn fits(&self, id: &PropertyId) -> bool {
        match id {
            PropertyId::SymbolTable => matches!(self, PropertyValue::SymbolTable(_)),
            PropertyId::GrammarPool => matches!(self, PropertyValue::GrammarPool(_)),
            PropertyId::DocumentScanner => matches!(self, PropertyValue::DocumentScanner(_)),
            PropertyId::DtdScanner => matches!(self, PropertyValue::DtdScanner(_)),
            PropertyId::Validator => matches!(self, PropertyValue::Validator(_)),
            PropertyId::DatatypeValidatorFactory => {
                matches!(self, PropertyValue::DatatypeValidatorFactory(_))
            }
            PropertyId::DomNode => matches!(self, PropertyValue::Object(_)),
            PropertyId::XmlString => matches!(self, PropertyValue::Text(_)),
            PropertyId::Extension { .. } => true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::SymbolTable(_) => "symbol-table",
            PropertyValue::GrammarPool(_) => "grammar-pool",
            PropertyValue::DocumentScanner(_) => "document-scanner",
            PropertyValue::DtdScanner(_) => "dtd-scanner",
            PropertyValue::Validator(_) => "validator",
            PropertyValue::DatatypeValidatorFactory(_) => "datatype-validator-factory",
            PropertyValue::Text(_) => "text",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Object(_) => "object",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// True if both values are the same shared object (or equal scalars)
    pub fn same_as(&self, other: &PropertyValue) -> bool {
        match (self, other) {
            (PropertyValue::SymbolTable(a), PropertyValue::SymbolTable(b)) => a.same_table(b),
            (PropertyValue::GrammarPool(a), PropertyValue::GrammarPool(b)) => a.same_pool(b),
            (PropertyValue::DocumentScanner(a), PropertyValue::DocumentScanner(b)) => {
                Rc::ptr_eq(a, b)
            }
            (PropertyValue::DtdScanner(a), PropertyValue::DtdScanner(b)) => Rc::ptr_eq(a, b),
            (PropertyValue::Validator(a), PropertyValue::Validator(b)) => Rc::ptr_eq(a, b),
            (
                PropertyValue::DatatypeValidatorFactory(a),
                PropertyValue::DatatypeValidatorFactory(b),
            ) => Rc::ptr_eq(a, b),
            (PropertyValue::Text(a), PropertyValue::Text(b)) => a == b,
            (PropertyValue::Integer(a), PropertyValue::Integer(b)) => a == b,
            (PropertyValue::Object(a), PropertyValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::SymbolTable(t) => t.fmt(f),
            PropertyValue::GrammarPool(p) => p.fmt(f),
            PropertyValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            PropertyValue::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            other => write!(f, "PropertyValue::{}(..)", other.kind_name()),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Integer(n)
    }
}

impl From<DocumentScannerRef> for PropertyValue {
    fn from(stage: DocumentScannerRef) -> Self {
        PropertyValue::DocumentScanner(stage)
    }
}

impl From<DtdScannerRef> for PropertyValue {
    fn from(stage: DtdScannerRef) -> Self {
        PropertyValue::DtdScanner(stage)
    }
}

impl From<ValidatorRef> for PropertyValue {
    fn from(stage: ValidatorRef) -> Self {
        PropertyValue::Validator(stage)
    }
}
