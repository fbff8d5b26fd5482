//! Configuration Registry
//!
//! One owned store of features and properties. Writes are checked, stored,
//! then forwarded to the bound stages in a fixed order: document scanner,
//! DTD scanner, validator. The first stage to reject a write stops the
//! propagation; the stored value and the stages already visited keep the
//! new value.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::ids::{FeatureId, NamespaceTable, PropertyId, DEFAULT_FEATURES};
use super::value::PropertyValue;
use crate::core::symbols::SymbolTable;
use crate::error::{Result, XmlError};
use crate::stage::{Component, DocumentScannerRef, DtdScannerRef, ValidatorRef};
use crate::validation::datatypes::DatatypeValidatorFactory;
use crate::validation::grammar::GrammarPool;

/// Feature and property store shared by every stage of one parser
#[derive(Debug)]
pub struct ConfigurationRegistry {
    namespaces: NamespaceTable,
    features: HashMap<FeatureId, bool>,
    properties: HashMap<PropertyId, PropertyValue>,
    symbols: SymbolTable,
    grammar_pool: GrammarPool,
}

impl ConfigurationRegistry {
    /// Create a registry holding the default feature snapshot and the two
    /// construction-time components
    pub fn new(symbols: SymbolTable, grammar_pool: GrammarPool) -> Self {
        let mut registry = ConfigurationRegistry {
            namespaces: NamespaceTable::new(),
            features: DEFAULT_FEATURES.iter().cloned().collect(),
            properties: HashMap::new(),
            symbols: symbols.clone(),
            grammar_pool: grammar_pool.clone(),
        };
        registry.install(PropertyId::SymbolTable, PropertyValue::SymbolTable(symbols));
        registry.install(PropertyId::GrammarPool, PropertyValue::GrammarPool(grammar_pool));
        registry
    }

    /// Bind a value without checks or forwarding. Used while the owning
    /// parser is being assembled.
    pub(crate) fn install(&mut self, id: PropertyId, value: PropertyValue) {
        trace!(property = %id, value = value.kind_name(), "installing component");
        self.properties.insert(id, value);
    }

    /// Recognize an extension namespace for both features and properties
    pub fn register_namespace(&mut self, prefix: &str) -> bool {
        let added = self.namespaces.register(prefix);
        if added {
            debug!(prefix, "registered configuration namespace");
        }
        added
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    // ------------------------------------------------------------------------
    // Features
    // ------------------------------------------------------------------------

    /// Set a feature by URI
    pub fn set_feature(&mut self, uri: &str, state: bool) -> Result<()> {
        let id = self.namespaces.resolve_feature(uri)?;
        self.set_feature_id(id, state)
    }

    /// Read a feature by URI
    pub fn get_feature(&self, uri: &str) -> Result<bool> {
        let id = self.namespaces.resolve_feature(uri)?;
        check_feature(&id, None)?;
        Ok(self.feature(&id))
    }

    pub fn set_feature_id(&mut self, id: FeatureId, state: bool) -> Result<()> {
        check_feature(&id, Some(state))?;

        debug!(feature = %id, state, "set feature");
        self.features.insert(id.clone(), state);

        for (role, stage) in self.bound_stages() {
            trace!(feature = %id, stage = role, "forwarding feature");
            let result = stage.with(|c| c.set_feature(&id, state));
            if let Err(err) = result {
                warn!(feature = %id, stage = role, error = %err, "stage rejected feature");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Current value of a recognized feature, falling back to its default
    pub fn feature(&self, id: &FeatureId) -> bool {
        self.features
            .get(id)
            .copied()
            .unwrap_or_else(|| id.default_state())
    }

    /// Every stored feature, in URI order
    pub fn stored_features(&self) -> Vec<(FeatureId, bool)> {
        let mut stored: Vec<_> = self.features.iter().map(|(k, v)| (k.clone(), *v)).collect();
        stored.sort_by_key(|(id, _)| id.uri());
        stored
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    /// Set a property by URI
    pub fn set_property(&mut self, uri: &str, value: PropertyValue) -> Result<()> {
        let id = self.namespaces.resolve_property(uri)?;
        self.set_property_id(id, value)
    }

    /// Read a property by URI; `None` if recognized but never set
    pub fn get_property(&self, uri: &str) -> Result<Option<PropertyValue>> {
        let id = self.namespaces.resolve_property(uri)?;
        if matches!(id, PropertyId::DomNode | PropertyId::XmlString) {
            return Err(XmlError::PropertyNotSupported {
                id: id.uri(),
                reason: "not available while streaming",
            });
        }
        Ok(self.property(&id).cloned())
    }

    pub fn set_property_id(&mut self, id: PropertyId, value: PropertyValue) -> Result<()> {
        id.check_writable().map_err(|reason| XmlError::PropertyNotSupported {
            id: id.uri(),
            reason,
        })?;
        if !value.fits(&id) {
            return Err(XmlError::PropertyNotSupported {
                id: id.uri(),
                reason: "value has the wrong type for this property",
            });
        }

        if id.is_component() {
            debug!(property = %id, value = value.kind_name(), "stage replaced for the next parse");
        } else {
            debug!(property = %id, value = value.kind_name(), "set property");
        }
        self.properties.insert(id.clone(), value.clone());

        for (role, stage) in self.bound_stages() {
            trace!(property = %id, stage = role, "forwarding property");
            let result = stage.with(|c| c.set_property(&id, &value));
            if let Err(err) = result {
                warn!(property = %id, stage = role, error = %err, "stage rejected property");
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn property(&self, id: &PropertyId) -> Option<&PropertyValue> {
        self.properties.get(id)
    }

    // ------------------------------------------------------------------------
    // Typed component access
    // ------------------------------------------------------------------------

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn grammar_pool(&self) -> &GrammarPool {
        &self.grammar_pool
    }

    pub fn document_scanner(&self) -> Option<DocumentScannerRef> {
        match self.properties.get(&PropertyId::DocumentScanner) {
            Some(PropertyValue::DocumentScanner(s)) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    pub fn dtd_scanner(&self) -> Option<DtdScannerRef> {
        match self.properties.get(&PropertyId::DtdScanner) {
            Some(PropertyValue::DtdScanner(s)) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    pub fn validator(&self) -> Option<ValidatorRef> {
        match self.properties.get(&PropertyId::Validator) {
            Some(PropertyValue::Validator(s)) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    pub fn datatype_validator_factory(&self) -> Option<Rc<dyn DatatypeValidatorFactory>> {
        match self.properties.get(&PropertyId::DatatypeValidatorFactory) {
            Some(PropertyValue::DatatypeValidatorFactory(f)) => Some(Rc::clone(f)),
            _ => None,
        }
    }

    /// Stages currently bound, in forwarding order
    fn bound_stages(&self) -> Vec<(&'static str, BoundStage)> {
        let mut stages = Vec::with_capacity(3);
        if let Some(s) = self.document_scanner() {
            stages.push(("document-scanner", BoundStage::Document(s)));
        }
        if let Some(s) = self.dtd_scanner() {
            stages.push(("dtd-scanner", BoundStage::Dtd(s)));
        }
        if let Some(s) = self.validator() {
            stages.push(("validator", BoundStage::Validator(s)));
        }
        stages
    }
}

/// Recognition and support checks for a feature; `state` is `None` on reads
fn check_feature(id: &FeatureId, state: Option<bool>) -> Result<()> {
    let result = match state {
        Some(state) => id.check_supported(state),
        // Reads only fail for the reserved ids
        None => id.check_supported(true),
    };
    result.map_err(|reason| XmlError::FeatureNotSupported {
        id: id.uri(),
        reason,
    })
}

enum BoundStage {
    Document(DocumentScannerRef),
    Dtd(DtdScannerRef),
    Validator(ValidatorRef),
}

impl BoundStage {
    fn with<R>(&self, f: impl FnOnce(&mut dyn Component) -> Result<R>) -> Result<R> {
        let busy = |_: std::cell::BorrowMutError| {
            XmlError::unexpected_msg("stage is busy and cannot be reconfigured")
        };
        match self {
            BoundStage::Document(s) => {
                let mut stage = s.try_borrow_mut().map_err(busy)?;
                f(&mut *stage)
            }
            BoundStage::Dtd(s) => {
                let mut stage = s.try_borrow_mut().map_err(busy)?;
                f(&mut *stage)
            }
            BoundStage::Validator(s) => {
                let mut stage = s.try_borrow_mut().map_err(busy)?;
                f(&mut *stage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ids::{PARSER_FEATURES, PARSER_PROPERTIES, SAX_FEATURES, SAX_PROPERTIES};
    use crate::error::ErrorKind;
    use crate::handler::DocumentHandler;
    use crate::input::DocumentEntity;
    use crate::stage::{document_scanner, DocumentScanner};
    use std::cell::RefCell;

    fn registry() -> ConfigurationRegistry {
        ConfigurationRegistry::new(SymbolTable::new(), GrammarPool::new())
    }

    /// Scanner that records forwarded writes into a shared log
    struct Tracer {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        reject: bool,
    }

    impl Component for Tracer {
        fn reset(&mut self, _config: &ConfigurationRegistry) -> Result<()> {
            Ok(())
        }

        fn set_feature(&mut self, id: &FeatureId, state: bool) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:{}={}", self.name, id, state));
            if self.reject {
                return Err(XmlError::FeatureNotSupported {
                    id: id.uri(),
                    reason: "refused",
                });
            }
            Ok(())
        }
    }

    impl DocumentScanner for Tracer {
        fn set_document_handler(&mut self, _handler: Option<Box<dyn DocumentHandler>>) {}

        fn scan_document(&mut self, _entity: &DocumentEntity) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_snapshot() {
        let reg = registry();
        let stored = reg.stored_features();
        assert_eq!(stored.len(), 4);
        assert!(reg.get_feature(&format!("{SAX_FEATURES}namespaces")).unwrap());
        assert!(!reg.get_feature(&format!("{SAX_FEATURES}validation")).unwrap());
        assert!(reg.get_feature(&format!("{SAX_FEATURES}external-general-entities")).unwrap());
        assert!(reg.get_feature(&format!("{SAX_FEATURES}external-parameter-entities")).unwrap());
    }

    #[test]
    fn test_unstored_feature_reads_default() {
        let reg = registry();
        assert!(!reg.get_feature(&format!("{SAX_FEATURES}namespace-prefixes")).unwrap());
        assert!(reg.get_feature(&format!("{PARSER_FEATURES}nonvalidating/load-dtd-grammar")).unwrap());
    }

    #[test]
    fn test_set_then_get_every_supported_feature() {
        let mut reg = registry();
        let ids = [
            format!("{SAX_FEATURES}namespaces"),
            format!("{SAX_FEATURES}namespace-prefixes"),
            format!("{SAX_FEATURES}validation"),
            format!("{SAX_FEATURES}external-general-entities"),
            format!("{SAX_FEATURES}external-parameter-entities"),
            format!("{PARSER_FEATURES}validation/schema"),
            format!("{PARSER_FEATURES}validation/dynamic"),
            format!("{PARSER_FEATURES}nonvalidating/load-dtd-grammar"),
            format!("{PARSER_FEATURES}nonvalidating/load-external-dtd"),
        ];
        for id in &ids {
            for state in [true, false, true] {
                reg.set_feature(id, state).unwrap();
                assert_eq!(reg.get_feature(id).unwrap(), state, "{id}");
            }
        }
    }

    #[test]
    fn test_unrecognized_feature_leaves_state() {
        let mut reg = registry();
        let before = reg.stored_features();
        let err = reg.set_feature("urn:nobody:feature", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureNotRecognized);
        assert_eq!(reg.stored_features(), before);
    }

    #[test]
    fn test_reserved_feature_not_supported() {
        let mut reg = registry();
        let id = format!("{PARSER_FEATURES}validation/default-attribute-values");
        for state in [true, false] {
            let err = reg.set_feature(&id, state).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FeatureNotSupported);
        }
        assert_eq!(reg.get_feature(&id).unwrap_err().kind(), ErrorKind::FeatureNotSupported);
        assert_eq!(reg.stored_features().len(), 4);
    }

    #[test]
    fn test_fixed_properties_readable_not_writable() {
        let mut reg = registry();
        let uri = format!("{PARSER_PROPERTIES}internal/symbol-table");
        let value = reg.get_property(&uri).unwrap().unwrap();
        assert!(matches!(value, PropertyValue::SymbolTable(ref t) if t.same_table(reg.symbol_table())));

        let err = reg
            .set_property(&uri, PropertyValue::SymbolTable(SymbolTable::new()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyNotSupported);
    }

    #[test]
    fn test_sax_properties_never_supported() {
        let mut reg = registry();
        let uri = format!("{SAX_PROPERTIES}xml-string");
        assert_eq!(reg.get_property(&uri).unwrap_err().kind(), ErrorKind::PropertyNotSupported);
        assert_eq!(
            reg.set_property(&uri, "x".into()).unwrap_err().kind(),
            ErrorKind::PropertyNotSupported
        );
    }

    #[test]
    fn test_stage_property_wrong_variant() {
        let mut reg = registry();
        let uri = format!("{PARSER_PROPERTIES}internal/dtd-scanner");
        let err = reg.set_property(&uri, "not a stage".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyNotSupported);
        assert!(reg.get_property(&uri).unwrap().is_none());
    }

    #[test]
    fn test_extension_property_round_trip() {
        let mut reg = registry();
        assert!(reg.register_namespace("urn:acme:"));
        reg.set_property("urn:acme:limit", PropertyValue::Integer(10)).unwrap();
        let value = reg.get_property("urn:acme:limit").unwrap().unwrap();
        assert_eq!(value.as_integer(), Some(10));
        assert!(reg.get_property("urn:acme:other").unwrap().is_none());
    }

    #[test]
    fn test_writes_forward_to_bound_stage() {
        let mut reg = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        reg.install(
            PropertyId::DocumentScanner,
            PropertyValue::DocumentScanner(document_scanner(Tracer {
                name: "doc",
                log: Rc::clone(&log),
                reject: false,
            })),
        );
        reg.set_feature(&format!("{SAX_FEATURES}validation"), true).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![format!("doc:{SAX_FEATURES}validation=true")]
        );
    }

    #[test]
    fn test_rejection_keeps_stored_value() {
        let mut reg = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        reg.install(
            PropertyId::DocumentScanner,
            PropertyValue::DocumentScanner(document_scanner(Tracer {
                name: "doc",
                log: Rc::clone(&log),
                reject: true,
            })),
        );
        let uri = format!("{SAX_FEATURES}validation");
        let err = reg.set_feature(&uri, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureNotSupported);
        assert!(reg.get_feature(&uri).unwrap());
        assert_eq!(log.borrow().len(), 1);
    }
}
