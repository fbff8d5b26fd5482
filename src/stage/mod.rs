//! Pipeline Stages
//!
//! The three replaceable stages and the capability contract they share.
//! A stage is bound in the configuration registry under its property id
//! and shared through an `Rc<RefCell<_>>` handle; replacing the property
//! value replaces the stage for the next parse.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{ConfigurationRegistry, FeatureId, PropertyId, PropertyValue};
use crate::error::Result;
use crate::handler::{DocumentHandler, DtdContentModelHandler, DtdHandler};
use crate::input::{DocumentEntity, Locator};

pub mod factory;

pub use factory::{DefaultStageFactory, StageFactory};

/// Anything the registry configures
///
/// `reset` runs at the start of every parse, after the pipeline is wired.
/// Implementations pull the features, properties and collaborating stages
/// they need from the registry there rather than caching them across
/// parses.
#[allow(unused_variables)]
pub trait Component {
    fn reset(&mut self, config: &ConfigurationRegistry) -> Result<()>;

    /// Called after the registry stored a feature write. Returning an
    /// error stops propagation to later stages.
    fn set_feature(&mut self, id: &FeatureId, state: bool) -> Result<()> {
        Ok(())
    }

    /// Called after the registry stored a property write
    fn set_property(&mut self, id: &PropertyId, value: &PropertyValue) -> Result<()> {
        Ok(())
    }
}

/// Tokenizes the document entity and drives the document channel
pub trait DocumentScanner: Component {
    fn set_document_handler(&mut self, handler: Option<Box<dyn DocumentHandler>>);

    /// Scan the whole entity in one pass
    fn scan_document(&mut self, entity: &DocumentEntity) -> Result<()>;
}

/// A document type declaration as seen by the document scanner
#[derive(Debug, Clone, Copy)]
pub struct Doctype<'a> {
    pub root: &'a str,
    pub public_id: Option<&'a str>,
    pub system_id: Option<&'a str>,
    /// Text between `[` and `]`, if present
    pub internal_subset: Option<&'a str>,
    /// Byte offset of `internal_subset` in the document entity
    pub subset_offset: usize,
}

/// A general entity declared in the DTD
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredEntity {
    /// Replacement text, character references already expanded
    Internal(Rc<str>),
    External {
        public_id: Option<String>,
        system_id: String,
    },
    Unparsed {
        public_id: Option<String>,
        system_id: String,
        notation: String,
    },
}

/// Scans the document type declaration and drives the DTD and content
/// model channels
pub trait DtdScanner: Component {
    fn set_dtd_handler(&mut self, handler: Option<Box<dyn DtdHandler>>);

    fn set_dtd_content_model_handler(&mut self, handler: Option<Box<dyn DtdContentModelHandler>>);

    /// Emit `start_dtd`, the declarations of the internal subset, then
    /// `end_dtd`. `locator` points into the document entity.
    fn scan_doctype(&mut self, doctype: &Doctype<'_>, locator: &Locator) -> Result<()>;

    /// General entity declared by the last scanned DTD
    fn general_entity(&self, name: &str) -> Option<DeclaredEntity> {
        let _ = name;
        None
    }
}

/// Sits between the scanners and the sink on all three channels
pub trait Validator: Component + DocumentHandler + DtdHandler + DtdContentModelHandler {
    fn set_document_handler(&mut self, handler: Option<Box<dyn DocumentHandler>>);

    fn set_dtd_handler(&mut self, handler: Option<Box<dyn DtdHandler>>);

    fn set_dtd_content_model_handler(&mut self, handler: Option<Box<dyn DtdContentModelHandler>>);
}

pub type DocumentScannerRef = Rc<RefCell<dyn DocumentScanner>>;
pub type DtdScannerRef = Rc<RefCell<dyn DtdScanner>>;
pub type ValidatorRef = Rc<RefCell<dyn Validator>>;

/// Share a concrete stage as a document scanner handle
pub fn document_scanner<S: DocumentScanner + 'static>(stage: S) -> DocumentScannerRef {
    Rc::new(RefCell::new(stage))
}

/// Share a concrete stage as a DTD scanner handle
pub fn dtd_scanner<S: DtdScanner + 'static>(stage: S) -> DtdScannerRef {
    Rc::new(RefCell::new(stage))
}

/// Share a concrete stage as a validator handle
pub fn validator<S: Validator + 'static>(stage: S) -> ValidatorRef {
    Rc::new(RefCell::new(stage))
}
