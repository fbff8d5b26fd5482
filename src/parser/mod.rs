//! SAX Parser
//!
//! `SaxParser` owns the configuration registry and the session state. Each
//! call to `parse` claims the parser, wires the bound stages to the current
//! sink, resets them and runs the document scanner over the whole input.
//!
//! ```text
//! Idle -> Resetting -> Running -> Completed -> Idle
//!              \            \---> Failed ----/
//!               \-----------------^
//! ```

pub mod pipeline;
pub mod session;

pub use pipeline::PipelineGraph;
pub use session::{ParseSession, SessionState};

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use tracing::{debug, debug_span, warn};

use crate::config::{ConfigurationRegistry, PropertyId, PropertyValue};
use crate::core::symbols::SymbolTable;
use crate::error::{Result, XmlError};
use crate::handler::{EventSink, NullSink};
use crate::input::{load_document_entity, InputSource};
use crate::stage::{DefaultStageFactory, StageFactory};
use crate::validation::grammar::GrammarPool;

/// Orchestrates one scanner/validator pipeline
pub struct SaxParser {
    registry: RefCell<ConfigurationRegistry>,
    sink: RefCell<Option<Rc<RefCell<dyn EventSink>>>>,
    state: Cell<SessionState>,
}

impl SaxParser {
    pub fn new() -> Self {
        Self::with_components(SymbolTable::new(), GrammarPool::new())
    }

    pub fn with_symbol_table(symbols: SymbolTable) -> Self {
        Self::with_components(symbols, GrammarPool::new())
    }

    pub fn with_components(symbols: SymbolTable, grammar_pool: GrammarPool) -> Self {
        Self::with_factory(symbols, grammar_pool, &DefaultStageFactory)
    }

    /// Build a parser whose starting stages come from `factory`
    pub fn with_factory(symbols: SymbolTable, grammar_pool: GrammarPool, factory: &dyn StageFactory) -> Self {
        let mut registry = ConfigurationRegistry::new(symbols, grammar_pool);
        registry.install(
            PropertyId::DocumentScanner,
            PropertyValue::DocumentScanner(factory.document_scanner()),
        );
        registry.install(PropertyId::DtdScanner, PropertyValue::DtdScanner(factory.dtd_scanner()));
        registry.install(PropertyId::Validator, PropertyValue::Validator(factory.validator()));
        registry.install(
            PropertyId::DatatypeValidatorFactory,
            PropertyValue::DatatypeValidatorFactory(factory.datatype_validator_factory()),
        );
        debug!("parser assembled");

        SaxParser {
            registry: RefCell::new(registry),
            sink: RefCell::new(None),
            state: Cell::new(SessionState::Idle),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    pub fn set_feature(&self, uri: &str, state: bool) -> Result<()> {
        let id = self.registry()?.namespaces().resolve_feature(uri)?;
        if !self.state.get().is_idle() {
            warn!(feature = %id, "feature write during parse refused");
            return Err(XmlError::FeatureNotSupported {
                id: id.uri(),
                reason: "parse in progress",
            });
        }
        self.registry_mut()?.set_feature_id(id, state)
    }

    pub fn get_feature(&self, uri: &str) -> Result<bool> {
        self.registry()?.get_feature(uri)
    }

    /// Set a property. Stage values take effect at the next parse.
    pub fn set_property(&self, uri: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let id = self.registry()?.namespaces().resolve_property(uri)?;
        if !self.state.get().is_idle() {
            warn!(property = %id, "property write during parse refused");
            return Err(XmlError::PropertyNotSupported {
                id: id.uri(),
                reason: "parse in progress",
            });
        }
        self.registry_mut()?.set_property_id(id, value.into())
    }

    pub fn get_property(&self, uri: &str) -> Result<Option<PropertyValue>> {
        self.registry()?.get_property(uri)
    }

    /// Recognize every feature and property URI under `prefix`
    pub fn register_namespace(&self, prefix: &str) -> Result<bool> {
        Ok(self.registry_mut()?.register_namespace(prefix))
    }

    pub fn symbol_table(&self) -> Result<SymbolTable> {
        Ok(self.registry()?.symbol_table().clone())
    }

    pub fn grammar_pool(&self) -> Result<GrammarPool> {
        Ok(self.registry()?.grammar_pool().clone())
    }

    /// Terminal consumer for the next parse
    pub fn set_event_sink<S: EventSink + 'static>(&self, sink: Rc<RefCell<S>>) {
        *self.sink.borrow_mut() = Some(sink);
    }

    pub fn clear_event_sink(&self) {
        *self.sink.borrow_mut() = None;
    }

    // ------------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------------

    /// Parse one document, delivering its events to the sink
    pub fn parse(&self, source: impl Into<InputSource>) -> Result<()> {
        let session = ParseSession::begin(&self.state)?;
        let source = source.into();
        let span = debug_span!("parse", system_id = ?source.system_id());
        let _enter = span.enter();

        self.run(session, source).map_err(|err| {
            debug!(error = %err, "parse failed");
            err.into_parse_failure()
        })
    }

    fn run(&self, session: ParseSession<'_, session::Resetting>, source: InputSource) -> Result<()> {
        let pipeline = match self.prepare() {
            Ok(pipeline) => pipeline,
            Err(err) => {
                session.fail();
                return Err(err);
            }
        };

        let running = session.running();
        let outcome = scan(&pipeline, source);
        pipeline.disconnect();
        match outcome {
            Ok(()) => {
                running.complete();
                Ok(())
            }
            Err(err) => {
                running.fail();
                Err(err)
            }
        }
    }

    /// Snapshot the stages, wire them and reset them. The registry is only
    /// borrowed for the duration of this call.
    fn prepare(&self) -> Result<PipelineGraph> {
        let registry = self.registry()?;
        let sink = self.sink.borrow().clone().unwrap_or_else(null_sink);
        let pipeline = PipelineGraph::build(&registry, sink);
        if let Err(err) = pipeline.connect().and_then(|()| pipeline.reset(&registry)) {
            pipeline.disconnect();
            return Err(err);
        }
        Ok(pipeline)
    }

    fn registry(&self) -> Result<Ref<'_, ConfigurationRegistry>> {
        self.registry
            .try_borrow()
            .map_err(|_| XmlError::unexpected_msg("configuration is being updated"))
    }

    fn registry_mut(&self) -> Result<RefMut<'_, ConfigurationRegistry>> {
        self.registry
            .try_borrow_mut()
            .map_err(|_| XmlError::unexpected_msg("configuration is in use"))
    }
}

impl Default for SaxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SaxParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaxParser")
            .field("state", &self.state.get())
            .field("has_sink", &self.sink.borrow().is_some())
            .finish_non_exhaustive()
    }
}

fn null_sink() -> Rc<RefCell<dyn EventSink>> {
    Rc::new(RefCell::new(NullSink))
}

fn scan(pipeline: &PipelineGraph, source: InputSource) -> Result<()> {
    let entity = load_document_entity(source)?;
    let scanner = pipeline
        .document_scanner()
        .ok_or_else(|| XmlError::unexpected_msg("no document scanner is bound"))?;
    let mut scanner = scanner
        .try_borrow_mut()
        .map_err(|_| XmlError::unexpected_msg("document scanner is already running"))?;
    scanner.scan_document(&entity)
}
