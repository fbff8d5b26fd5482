//! Pipeline Wiring
//!
//! Three fixed chains, rebuilt for every parse from whatever stages the
//! registry holds at that moment:
//!
//! ```text
//! document:       DocumentScanner -> Validator -> sink
//! DTD:            DtdScanner      -> Validator -> sink
//! content model:  DtdScanner      -> Validator -> sink
//! ```
//!
//! A missing validator is skipped; the scanners then feed the sink directly.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::ConfigurationRegistry;
use crate::error::{Result, XmlError};
use crate::handler::{DocumentHandler, DtdContentModelHandler, DtdHandler, EventSink};
use crate::stage::{Component, DocumentScannerRef, DtdScannerRef, ValidatorRef};

/// Snapshot of the bound stages plus the sink for one parse
pub struct PipelineGraph {
    document_scanner: Option<DocumentScannerRef>,
    dtd_scanner: Option<DtdScannerRef>,
    validator: Option<ValidatorRef>,
    sink: Rc<RefCell<dyn EventSink>>,
}

impl PipelineGraph {
    pub fn build(registry: &ConfigurationRegistry, sink: Rc<RefCell<dyn EventSink>>) -> Self {
        PipelineGraph {
            document_scanner: registry.document_scanner(),
            dtd_scanner: registry.dtd_scanner(),
            validator: registry.validator(),
            sink,
        }
    }

    pub fn document_scanner(&self) -> Option<&DocumentScannerRef> {
        self.document_scanner.as_ref()
    }

    pub fn dtd_scanner(&self) -> Option<&DtdScannerRef> {
        self.dtd_scanner.as_ref()
    }

    pub fn validator(&self) -> Option<&ValidatorRef> {
        self.validator.as_ref()
    }

    /// Point every stage at its downstream neighbour. Safe to repeat.
    pub fn connect(&self) -> Result<()> {
        if let Some(v) = &self.validator {
            let mut v = borrow_stage(v, "validator")?;
            v.set_document_handler(Some(Box::new(Rc::clone(&self.sink))));
            v.set_dtd_handler(Some(Box::new(Rc::clone(&self.sink))));
            v.set_dtd_content_model_handler(Some(Box::new(Rc::clone(&self.sink))));
        }

        if let Some(scanner) = &self.document_scanner {
            borrow_stage(scanner, "document-scanner")?.set_document_handler(Some(self.document_next()));
        }

        if let Some(scanner) = &self.dtd_scanner {
            let mut scanner = borrow_stage(scanner, "dtd-scanner")?;
            scanner.set_dtd_handler(Some(self.dtd_next()));
            scanner.set_dtd_content_model_handler(Some(self.content_model_next()));
        }

        debug!(
            validator = self.validator.is_some(),
            dtd_scanner = self.dtd_scanner.is_some(),
            "pipeline connected"
        );
        Ok(())
    }

    /// Reset every stage: document scanner, DTD scanner, validator
    pub fn reset(&self, registry: &ConfigurationRegistry) -> Result<()> {
        if let Some(s) = &self.document_scanner {
            reset_stage(&mut *borrow_stage(s, "document-scanner")?, registry, "document-scanner")?;
        }
        if let Some(s) = &self.dtd_scanner {
            reset_stage(&mut *borrow_stage(s, "dtd-scanner")?, registry, "dtd-scanner")?;
        }
        if let Some(s) = &self.validator {
            reset_stage(&mut *borrow_stage(s, "validator")?, registry, "validator")?;
        }
        Ok(())
    }

    /// Drop every link so no stage keeps the sink or a neighbour alive
    /// past the parse. Stages still on the stack are left alone.
    pub fn disconnect(&self) {
        if let Some(Ok(mut s)) = self.document_scanner.as_ref().map(|s| s.try_borrow_mut()) {
            s.set_document_handler(None);
        }
        if let Some(Ok(mut s)) = self.dtd_scanner.as_ref().map(|s| s.try_borrow_mut()) {
            s.set_dtd_handler(None);
            s.set_dtd_content_model_handler(None);
        }
        if let Some(Ok(mut v)) = self.validator.as_ref().map(|v| v.try_borrow_mut()) {
            v.set_document_handler(None);
            v.set_dtd_handler(None);
            v.set_dtd_content_model_handler(None);
        }
        trace!("pipeline disconnected");
    }

    fn document_next(&self) -> Box<dyn DocumentHandler> {
        match &self.validator {
            Some(v) => Box::new(Rc::clone(v)),
            None => Box::new(Rc::clone(&self.sink)),
        }
    }

    fn dtd_next(&self) -> Box<dyn DtdHandler> {
        match &self.validator {
            Some(v) => Box::new(Rc::clone(v)),
            None => Box::new(Rc::clone(&self.sink)),
        }
    }

    fn content_model_next(&self) -> Box<dyn DtdContentModelHandler> {
        match &self.validator {
            Some(v) => Box::new(Rc::clone(v)),
            None => Box::new(Rc::clone(&self.sink)),
        }
    }
}

fn borrow_stage<'a, T: ?Sized>(stage: &'a RefCell<T>, role: &str) -> Result<RefMut<'a, T>> {
    stage
        .try_borrow_mut()
        .map_err(|_| XmlError::unexpected_msg(format!("{role} is busy and cannot be wired")))
}

fn reset_stage<C: Component + ?Sized>(stage: &mut C, registry: &ConfigurationRegistry, role: &str) -> Result<()> {
    trace!(stage = role, "resetting");
    stage.reset(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::SymbolTable;
    use crate::handler::QName;
    use crate::input::{DocumentEntity, Locator};
    use crate::stage::{document_scanner, dtd_scanner, validator, Doctype, DocumentScanner, DtdScanner};
    use crate::validation::{DefaultValidator, GrammarPool};
    use crate::config::{PropertyId, PropertyValue};
    use crate::handler::Attributes;

    /// Emits a fixed document and DOCTYPE through whatever it is wired to
    #[derive(Default)]
    struct Fixed {
        handler: Option<Box<dyn DocumentHandler>>,
        dtd: Option<Box<dyn DtdHandler>>,
        resets: usize,
    }

    impl Component for Fixed {
        fn reset(&mut self, _config: &ConfigurationRegistry) -> Result<()> {
            self.resets += 1;
            Ok(())
        }
    }

    impl DocumentScanner for Fixed {
        fn set_document_handler(&mut self, handler: Option<Box<dyn DocumentHandler>>) {
            self.handler = handler;
        }

        fn scan_document(&mut self, entity: &DocumentEntity) -> Result<()> {
            let symbols = SymbolTable::new();
            if let Some(h) = self.handler.as_mut() {
                h.start_document(&entity.locator(), None)?;
                h.start_element(&QName::parse(&symbols, "a"), &Attributes::new())?;
                h.end_element(&QName::parse(&symbols, "a"))?;
                h.end_document()?;
            }
            Ok(())
        }
    }

    impl DtdScanner for Fixed {
        fn set_dtd_handler(&mut self, handler: Option<Box<dyn DtdHandler>>) {
            self.dtd = handler;
        }

        fn set_dtd_content_model_handler(&mut self, _handler: Option<Box<dyn DtdContentModelHandler>>) {}

        fn scan_doctype(&mut self, doctype: &Doctype<'_>, _locator: &Locator) -> Result<()> {
            if let Some(h) = self.dtd.as_mut() {
                h.start_dtd(doctype.root, None, None)?;
                h.end_dtd()?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Log(Vec<String>);

    impl DocumentHandler for Log {
        fn start_element(&mut self, name: &QName, _attributes: &Attributes) -> Result<()> {
            self.0.push(format!("start {}", name.as_str()));
            Ok(())
        }
    }

    impl DtdHandler for Log {
        fn start_dtd(&mut self, root: &str, _public_id: Option<&str>, _system_id: Option<&str>) -> Result<()> {
            self.0.push(format!("dtd {root}"));
            Ok(())
        }
    }

    impl DtdContentModelHandler for Log {}

    fn registry() -> ConfigurationRegistry {
        ConfigurationRegistry::new(SymbolTable::new(), GrammarPool::new())
    }

    #[test]
    fn test_document_chain_through_validator() {
        let mut reg = registry();
        let scanner = Rc::new(RefCell::new(Fixed::default()));
        reg.install(PropertyId::DocumentScanner, PropertyValue::DocumentScanner(scanner.clone()));
        reg.install(PropertyId::Validator, PropertyValue::Validator(validator(DefaultValidator::new())));

        let log = Rc::new(RefCell::new(Log::default()));
        let graph = PipelineGraph::build(&reg, log.clone());
        graph.connect().unwrap();
        graph.reset(&reg).unwrap();

        scanner
            .borrow_mut()
            .scan_document(&DocumentEntity::from_text("<a/>"))
            .unwrap();
        assert_eq!(log.borrow().0, vec!["start a".to_string()]);
        assert_eq!(scanner.borrow().resets, 1);
    }

    #[test]
    fn test_dtd_chain_without_validator() {
        let mut reg = registry();
        let dtd = Rc::new(RefCell::new(Fixed::default()));
        reg.install(PropertyId::DtdScanner, PropertyValue::DtdScanner(dtd.clone()));

        let log = Rc::new(RefCell::new(Log::default()));
        let graph = PipelineGraph::build(&reg, log.clone());
        assert!(graph.validator().is_none());
        graph.connect().unwrap();

        let entity = DocumentEntity::from_text("<!DOCTYPE r><r/>");
        let doctype = Doctype {
            root: "r",
            public_id: None,
            system_id: None,
            internal_subset: None,
            subset_offset: 0,
        };
        dtd.borrow_mut().scan_doctype(&doctype, &entity.locator()).unwrap();
        assert_eq!(log.borrow().0, vec!["dtd r".to_string()]);
    }

    #[test]
    fn test_disconnect_releases_sink() {
        let mut reg = registry();
        reg.install(
            PropertyId::DocumentScanner,
            PropertyValue::DocumentScanner(document_scanner(Fixed::default())),
        );
        reg.install(PropertyId::DtdScanner, PropertyValue::DtdScanner(dtd_scanner(Fixed::default())));
        reg.install(PropertyId::Validator, PropertyValue::Validator(validator(DefaultValidator::new())));

        let log = Rc::new(RefCell::new(Log::default()));
        let graph = PipelineGraph::build(&reg, log.clone());
        graph.connect().unwrap();
        assert!(Rc::strong_count(&log) > 2);

        graph.disconnect();
        drop(graph);
        assert_eq!(Rc::strong_count(&log), 1);
    }

    #[test]
    fn test_busy_stage_cannot_be_wired() {
        let mut reg = registry();
        let scanner = Rc::new(RefCell::new(Fixed::default()));
        reg.install(PropertyId::DocumentScanner, PropertyValue::DocumentScanner(scanner.clone()));

        let graph = PipelineGraph::build(&reg, Rc::new(RefCell::new(Log::default())));
        let _held = scanner.borrow_mut();
        let err = graph.connect().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::WrappedUnexpected);
    }
}
