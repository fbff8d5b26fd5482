//! Stage Factory
//!
//! Produces the stages a parser registers at construction. Stages can be
//! swapped later through property writes; the factory only decides the
//! starting set.

use std::rc::Rc;

use super::{document_scanner, dtd_scanner, validator, DocumentScannerRef, DtdScannerRef, ValidatorRef};
use crate::scanner::{DefaultDocumentScanner, DefaultDtdScanner};
use crate::validation::datatypes::{BuiltinDatatypes, DatatypeValidatorFactory};
use crate::validation::validator::DefaultValidator;

/// Builds the initial stage set for a parser
pub trait StageFactory {
    fn document_scanner(&self) -> DocumentScannerRef;

    fn dtd_scanner(&self) -> DtdScannerRef;

    fn validator(&self) -> ValidatorRef;

    fn datatype_validator_factory(&self) -> Rc<dyn DatatypeValidatorFactory>;
}

/// Factory for the crate's own stages
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStageFactory;

impl StageFactory for DefaultStageFactory {
    fn document_scanner(&self) -> DocumentScannerRef {
        document_scanner(DefaultDocumentScanner::new())
    }

    fn dtd_scanner(&self) -> DtdScannerRef {
        dtd_scanner(DefaultDtdScanner::new())
    }

    fn validator(&self) -> ValidatorRef {
        validator(DefaultValidator::new())
    }

    fn datatype_validator_factory(&self) -> Rc<dyn DatatypeValidatorFactory> {
        Rc::new(BuiltinDatatypes::new())
    }
}
