//! RustySAX - a SAX parser assembled from replaceable stages
//!
//! Pipeline:
//! - Document scanner: tokenizes the document entity (document channel)
//! - DTD scanner: reads the document type declaration (DTD and content model channels)
//! - Validator: sits between both scanners and the caller's sink
//!
//! Stages, features and properties live in one configuration registry.
//! Any stage can be swapped with a property write; the swap takes effect at
//! the next `parse`.
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use rustysax::{EventRecorder, SaxParser};
//!
//! let parser = SaxParser::new();
//! let recorder = Rc::new(RefCell::new(EventRecorder::new()));
//! parser.set_event_sink(Rc::clone(&recorder));
//! parser.parse("<greeting>hello</greeting>")?;
//! assert_eq!(recorder.borrow().text(), "hello");
//! # Ok::<(), rustysax::XmlError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod handler;
pub mod input;
pub mod parser;
pub mod sax;
pub mod scanner;
pub mod stage;
pub mod strategy;
pub mod validation;

#[cfg(feature = "nif")]
mod nif;

pub use config::{ConfigurationRegistry, FeatureId, PropertyId, PropertyValue};
pub use crate::core::{Symbol, SymbolTable};
pub use error::{ErrorKind, InputError, Location, ParseErrorKind, Result, StructuredError, XmlError};
pub use handler::{Attribute, Attributes, DocumentHandler, DtdContentModelHandler, DtdHandler, EventSink, QName};
pub use input::{DocumentEntity, InputSource, Locator};
pub use parser::{SaxParser, SessionState};
pub use sax::{EventRecorder, SaxEvent};
pub use stage::{DefaultStageFactory, StageFactory};
pub use validation::{DtdGrammar, GrammarPool};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
