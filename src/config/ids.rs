//! Feature and Property Identifiers
//!
//! Configuration ids arrive as namespaced URIs. `NamespaceTable` resolves a
//! URI to a typed id by walking the namespace prefixes in a fixed order:
//! SAX, then the parser's own namespace, then caller-registered extension
//! namespaces in registration order.

use std::fmt;
use std::rc::Rc;

use crate::error::{Result, XmlError};

pub const SAX_FEATURES: &str = "http://xml.org/sax/features/";
pub const SAX_PROPERTIES: &str = "http://xml.org/sax/properties/";
pub const PARSER_FEATURES: &str = "http://apache.org/xml/features/";
pub const PARSER_PROPERTIES: &str = "http://apache.org/xml/properties/";

/// A recognized feature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureId {
    // SAX namespace
    Namespaces,
    NamespacePrefixes,
    StringInterning,
    Validation,
    ExternalGeneralEntities,
    ExternalParameterEntities,
    // Parser namespace
    SchemaValidation,
    DynamicValidation,
    LoadDtdGrammar,
    LoadExternalDtd,
    DefaultAttributeValues,
    ValidateContentModels,
    ValidateDatatypes,
    /// Any name inside a registered extension namespace
    Extension { namespace: Rc<str>, name: String },
}

const SAX_FEATURE_NAMES: &[(&str, FeatureId)] = &[
    ("namespaces", FeatureId::Namespaces),
    ("namespace-prefixes", FeatureId::NamespacePrefixes),
    ("string-interning", FeatureId::StringInterning),
    ("validation", FeatureId::Validation),
    ("external-general-entities", FeatureId::ExternalGeneralEntities),
    ("external-parameter-entities", FeatureId::ExternalParameterEntities),
];

const PARSER_FEATURE_NAMES: &[(&str, FeatureId)] = &[
    ("validation/schema", FeatureId::SchemaValidation),
    ("validation/dynamic", FeatureId::DynamicValidation),
    ("nonvalidating/load-dtd-grammar", FeatureId::LoadDtdGrammar),
    ("nonvalidating/load-external-dtd", FeatureId::LoadExternalDtd),
    ("validation/default-attribute-values", FeatureId::DefaultAttributeValues),
    ("validation/content-models", FeatureId::ValidateContentModels),
    ("validation/datatypes", FeatureId::ValidateDatatypes),
];

/// Feature values stored by a freshly constructed registry
pub const DEFAULT_FEATURES: &[(FeatureId, bool)] = &[
    (FeatureId::Namespaces, true),
    (FeatureId::Validation, false),
    (FeatureId::ExternalGeneralEntities, true),
    (FeatureId::ExternalParameterEntities, true),
];

impl FeatureId {
    /// Full URI of this feature
    pub fn uri(&self) -> String {
        match self {
            FeatureId::Extension { namespace, name } => format!("{namespace}{name}"),
            known => {
                let (prefix, table) = if known.is_sax() {
                    (SAX_FEATURES, SAX_FEATURE_NAMES)
                } else {
                    (PARSER_FEATURES, PARSER_FEATURE_NAMES)
                };
                let suffix = table
                    .iter()
                    .find(|(_, id)| id == known)
                    .map_or("", |(s, _)| s);
                format!("{prefix}{suffix}")
            }
        }
    }

    fn is_sax(&self) -> bool {
        SAX_FEATURE_NAMES.iter().any(|(_, id)| id == self)
    }

    /// Value reported for a recognized feature that was never stored
    pub fn default_state(&self) -> bool {
        match self {
            FeatureId::Namespaces
            | FeatureId::StringInterning
            | FeatureId::ExternalGeneralEntities
            | FeatureId::ExternalParameterEntities
            | FeatureId::LoadDtdGrammar
            | FeatureId::LoadExternalDtd => true,
            _ => false,
        }
    }

    /// Whether `state` may be set on this feature
    pub fn check_supported(&self, state: bool) -> std::result::Result<(), &'static str> {
        match self {
            FeatureId::DefaultAttributeValues
            | FeatureId::ValidateContentModels
            | FeatureId::ValidateDatatypes => Err("reserved feature"),
            FeatureId::StringInterning if !state => Err("names are always interned"),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// A recognized property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyId {
    // SAX namespace
    DomNode,
    XmlString,
    // Parser namespace
    SymbolTable,
    GrammarPool,
    DocumentScanner,
    DtdScanner,
    Validator,
    DatatypeValidatorFactory,
    Extension { namespace: Rc<str>, name: String },
}

const SAX_PROPERTY_NAMES: &[(&str, PropertyId)] = &[
    ("dom-node", PropertyId::DomNode),
    ("xml-string", PropertyId::XmlString),
];

const PARSER_PROPERTY_NAMES: &[(&str, PropertyId)] = &[
    ("internal/symbol-table", PropertyId::SymbolTable),
    ("internal/grammar-pool", PropertyId::GrammarPool),
    ("internal/document-scanner", PropertyId::DocumentScanner),
    ("internal/dtd-scanner", PropertyId::DtdScanner),
    ("internal/validator", PropertyId::Validator),
    ("internal/datatype-validator-factory", PropertyId::DatatypeValidatorFactory),
];

impl PropertyId {
    pub fn uri(&self) -> String {
        match self {
            PropertyId::Extension { namespace, name } => format!("{namespace}{name}"),
            known => {
                let sax = SAX_PROPERTY_NAMES.iter().find(|(_, id)| id == known);
                match sax {
                    Some((s, _)) => format!("{SAX_PROPERTIES}{s}"),
                    None => {
                        let suffix = PARSER_PROPERTY_NAMES
                            .iter()
                            .find(|(_, id)| id == known)
                            .map_or("", |(s, _)| s);
                        format!("{PARSER_PROPERTIES}{suffix}")
                    }
                }
            }
        }
    }

    /// Whether this property may be written after construction
    pub fn check_writable(&self) -> std::result::Result<(), &'static str> {
        match self {
            PropertyId::DomNode | PropertyId::XmlString => Err("not available while streaming"),
            PropertyId::SymbolTable | PropertyId::GrammarPool => Err("fixed at construction"),
            _ => Ok(()),
        }
    }

    /// True for the ids that hold a replaceable pipeline component
    pub fn is_component(&self) -> bool {
        matches!(
            self,
            PropertyId::DocumentScanner
                | PropertyId::DtdScanner
                | PropertyId::Validator
                | PropertyId::DatatypeValidatorFactory
        )
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Prefix dispatch table for configuration ids
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    extensions: Vec<Rc<str>>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension namespace; every name under it becomes
    /// recognized. Returns false if the prefix is empty, built in, or
    /// already registered.
    pub fn register(&mut self, prefix: &str) -> bool {
        if prefix.is_empty()
            || [SAX_FEATURES, SAX_PROPERTIES, PARSER_FEATURES, PARSER_PROPERTIES].contains(&prefix)
            || self.extensions.iter().any(|ns| &**ns == prefix)
        {
            return false;
        }
        self.extensions.push(Rc::from(prefix));
        true
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|ns| &**ns)
    }

    pub fn resolve_feature(&self, uri: &str) -> Result<FeatureId> {
        let not_recognized = || XmlError::FeatureNotRecognized(uri.to_string());

        if let Some(suffix) = uri.strip_prefix(SAX_FEATURES) {
            return lookup(SAX_FEATURE_NAMES, suffix).ok_or_else(not_recognized);
        }
        if let Some(suffix) = uri.strip_prefix(PARSER_FEATURES) {
            return lookup(PARSER_FEATURE_NAMES, suffix).ok_or_else(not_recognized);
        }
        self.extension(uri)
            .map(|(namespace, name)| FeatureId::Extension { namespace, name })
            .ok_or_else(not_recognized)
    }

    pub fn resolve_property(&self, uri: &str) -> Result<PropertyId> {
        let not_recognized = || XmlError::PropertyNotRecognized(uri.to_string());

        if let Some(suffix) = uri.strip_prefix(SAX_PROPERTIES) {
            return lookup(SAX_PROPERTY_NAMES, suffix).ok_or_else(not_recognized);
        }
        if let Some(suffix) = uri.strip_prefix(PARSER_PROPERTIES) {
            return lookup(PARSER_PROPERTY_NAMES, suffix).ok_or_else(not_recognized);
        }
        self.extension(uri)
            .map(|(namespace, name)| PropertyId::Extension { namespace, name })
            .ok_or_else(not_recognized)
    }

    fn extension(&self, uri: &str) -> Option<(Rc<str>, String)> {
        self.extensions.iter().find_map(|ns| {
            uri.strip_prefix(&**ns)
                .filter(|name| !name.is_empty())
                .map(|name| (Rc::clone(ns), name.to_string()))
        })
    }
}

fn lookup<T: Clone>(table: &[(&str, T)], suffix: &str) -> Option<T> {
    table
        .iter()
        .find(|(name, _)| *name == suffix)
        .map(|(_, id)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_resolve_sax_feature() {
        let table = NamespaceTable::new();
        let id = table
            .resolve_feature("http://xml.org/sax/features/namespaces")
            .unwrap();
        assert_eq!(id, FeatureId::Namespaces);
        assert_eq!(id.uri(), "http://xml.org/sax/features/namespaces");
    }

    #[test]
    fn test_resolve_parser_feature() {
        let table = NamespaceTable::new();
        let id = table
            .resolve_feature("http://apache.org/xml/features/nonvalidating/load-external-dtd")
            .unwrap();
        assert_eq!(id, FeatureId::LoadExternalDtd);
        assert_eq!(id.uri(), "http://apache.org/xml/features/nonvalidating/load-external-dtd");
    }

    #[test]
    fn test_unknown_suffix_in_closed_namespace() {
        let table = NamespaceTable::new();
        let err = table
            .resolve_feature("http://xml.org/sax/features/no-such-thing")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureNotRecognized);

        let err = table
            .resolve_property("http://apache.org/xml/properties/internal/nope")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyNotRecognized);
    }

    #[test]
    fn test_foreign_namespace_not_recognized() {
        let table = NamespaceTable::new();
        assert!(table.resolve_feature("urn:other:feature").is_err());
        assert!(table.resolve_property("urn:other:property").is_err());
    }

    #[test]
    fn test_extension_namespace() {
        let mut table = NamespaceTable::new();
        assert!(table.register("urn:acme:"));
        assert!(!table.register("urn:acme:"));
        assert!(!table.register(SAX_FEATURES));

        let id = table.resolve_feature("urn:acme:fast-mode").unwrap();
        assert!(matches!(&id, FeatureId::Extension { name, .. } if name == "fast-mode"));
        assert_eq!(id.uri(), "urn:acme:fast-mode");

        let id = table.resolve_property("urn:acme:buffer").unwrap();
        assert_eq!(id.uri(), "urn:acme:buffer");

        assert!(table.resolve_feature("urn:acme:").is_err());
    }

    #[test]
    fn test_reserved_features_unsupported() {
        for id in [
            FeatureId::DefaultAttributeValues,
            FeatureId::ValidateContentModels,
            FeatureId::ValidateDatatypes,
        ] {
            assert!(id.check_supported(true).is_err());
            assert!(id.check_supported(false).is_err());
        }
        assert!(FeatureId::StringInterning.check_supported(true).is_ok());
        assert!(FeatureId::StringInterning.check_supported(false).is_err());
    }

    #[test]
    fn test_property_writability() {
        assert!(PropertyId::DomNode.check_writable().is_err());
        assert!(PropertyId::SymbolTable.check_writable().is_err());
        assert!(PropertyId::DtdScanner.check_writable().is_ok());
        assert!(PropertyId::DtdScanner.is_component());
        assert_eq!(
            PropertyId::DtdScanner.uri(),
            "http://apache.org/xml/properties/internal/dtd-scanner"
        );
        assert_eq!(PropertyId::XmlString.uri(), "http://xml.org/sax/properties/xml-string");
    }
}
