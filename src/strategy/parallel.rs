//! Parallel Batch Parsing
//!
//! Uses Rayon to parse independent documents side by side. Parsers are
//! single-threaded, so every document gets its own parser on the worker
//! that picks it up; only owned events and errors cross threads.

use std::cell::RefCell;
use std::rc::Rc;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{ErrorKind, Result, XmlError};
use crate::parser::SaxParser;
use crate::sax::{EventRecorder, SaxEvent};

/// A failed document in a batch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BatchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<XmlError> for BatchError {
    fn from(err: XmlError) -> Self {
        BatchError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Parse every input on its own parser, with `features` applied first.
/// Results come back in input order.
pub fn parse_batch<I>(inputs: &[I], features: &[(&str, bool)]) -> Vec<std::result::Result<Vec<SaxEvent>, BatchError>>
where
    I: AsRef<[u8]> + Sync,
{
    debug!(documents = inputs.len(), "parsing batch");
    inputs
        .par_iter()
        .map(|input| parse_events(input.as_ref(), features).map_err(BatchError::from))
        .collect()
}

/// Parse one document and return its recorded events
pub fn parse_events(input: &[u8], features: &[(&str, bool)]) -> Result<Vec<SaxEvent>> {
    let parser = SaxParser::new();
    for (uri, state) in features {
        parser.set_feature(uri, *state)?;
    }

    let recorder = Rc::new(RefCell::new(EventRecorder::new()));
    parser.set_event_sink(Rc::clone(&recorder));
    parser.parse(input.to_vec())?;

    let events = recorder.borrow_mut().take_events();
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALIDATION: &str = "http://xml.org/sax/features/validation";

    #[test]
    fn test_batch_keeps_order() {
        let inputs = [b"<a/>".to_vec(), b"<b>x</b>".to_vec(), b"<c>".to_vec()];
        let results = parse_batch(&inputs, &[]);
        assert_eq!(results.len(), 3);

        let first = results[0].as_ref().unwrap();
        assert!(first.contains(&SaxEvent::start_element("a", None)));
        let second = results[1].as_ref().unwrap();
        assert!(second.contains(&SaxEvent::Characters("x".to_string())));
        assert_eq!(results[2].as_ref().unwrap_err().kind, ErrorKind::StructuredParse);
    }

    #[test]
    fn test_batch_applies_features() {
        let inputs = ["<a/>"];
        let results = parse_batch(&inputs, &[(VALIDATION, true)]);
        // validation without a grammar
        assert_eq!(results[0].as_ref().unwrap_err().kind, ErrorKind::StructuredParse);

        let results = parse_batch(&inputs, &[("urn:unknown", true)]);
        assert_eq!(results[0].as_ref().unwrap_err().kind, ErrorKind::FeatureNotRecognized);
    }

    #[test]
    fn test_single_document() {
        let events = parse_events(b"<r/>", &[]).unwrap();
        assert_eq!(events.first(), Some(&SaxEvent::StartDocument { encoding: Some("UTF-8".to_string()) }));
        assert_eq!(events.last(), Some(&SaxEvent::EndDocument));
    }
}
