//! SAX Event Recording
//!
//! Callers usually implement `EventSink` themselves. For tests, batch jobs
//! and the NIF surface this module provides a sink that records everything:
//!
//! ```text
//! SaxParser ---> EventRecorder ---> SaxEvent[]
//!                      |
//!                      v
//!               Elixir terms (via NIF)
//! ```
//!
//! Every event is tagged with the channel it travelled on, so document
//! content and DTD declarations can be separated after the fact.

pub mod collector;
pub mod events;

pub use collector::EventRecorder;
pub use events::{Channel, Name, SaxAttribute, SaxEvent};
