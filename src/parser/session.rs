//! Parse Session
//!
//! One parse, as a typestate value over the parser's state cell. Each
//! transition consumes the session; dropping it (including on unwind)
//! puts the parser back to `Idle`.

use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;

use tracing::debug;

use crate::error::{Result, XmlError};

/// Lifecycle state of a parser instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Resetting,
    Running,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_idle(self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

/// Stages are being reset and wired
#[derive(Debug)]
pub struct Resetting;

/// The document scanner is running
#[derive(Debug)]
pub struct Running;

#[derive(Debug)]
pub struct ParseSession<'p, Phase> {
    state: &'p Cell<SessionState>,
    _phase: PhantomData<Phase>,
}

impl<'p> ParseSession<'p, Resetting> {
    /// Claim the parser for one parse
    pub fn begin(state: &'p Cell<SessionState>) -> Result<Self> {
        let current = state.get();
        if !current.is_idle() {
            debug!(state = ?current, "parse rejected, session already active");
            return Err(XmlError::ReentrantParse);
        }
        transition(state, SessionState::Resetting);
        Ok(ParseSession {
            state,
            _phase: PhantomData,
        })
    }

    pub fn running(self) -> ParseSession<'p, Running> {
        let state = self.release();
        transition(state, SessionState::Running);
        ParseSession {
            state,
            _phase: PhantomData,
        }
    }

    /// Reset or wiring failed
    pub fn fail(self) {
        self.finish(SessionState::Failed);
    }
}

impl ParseSession<'_, Running> {
    pub fn complete(self) {
        self.finish(SessionState::Completed);
    }

    pub fn fail(self) {
        self.finish(SessionState::Failed);
    }
}

impl<'p, Phase> ParseSession<'p, Phase> {
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    fn release(self) -> &'p Cell<SessionState> {
        let this = ManuallyDrop::new(self);
        this.state
    }

    /// Record the outcome, then drop back to idle
    fn finish(self, outcome: SessionState) {
        transition(self.state, outcome);
    }
}

impl<Phase> Drop for ParseSession<'_, Phase> {
    fn drop(&mut self) {
        transition(self.state, SessionState::Idle);
    }
}

fn transition(state: &Cell<SessionState>, to: SessionState) {
    let from = state.replace(to);
    if from != to {
        debug!(?from, ?to, "session state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_success_path() {
        let cell = Cell::new(SessionState::Idle);
        let session = ParseSession::begin(&cell).unwrap();
        assert_eq!(cell.get(), SessionState::Resetting);

        let running = session.running();
        assert_eq!(running.state(), SessionState::Running);

        running.complete();
        assert_eq!(cell.get(), SessionState::Idle);
    }

    #[test]
    fn test_failure_paths_return_to_idle() {
        let cell = Cell::new(SessionState::Idle);
        ParseSession::begin(&cell).unwrap().fail();
        assert_eq!(cell.get(), SessionState::Idle);

        ParseSession::begin(&cell).unwrap().running().fail();
        assert_eq!(cell.get(), SessionState::Idle);
    }

    #[test]
    fn test_second_session_rejected() {
        let cell = Cell::new(SessionState::Idle);
        let running = ParseSession::begin(&cell).unwrap().running();

        let err = ParseSession::begin(&cell).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReentrantParse);
        assert_eq!(cell.get(), SessionState::Running);

        drop(running);
        assert!(ParseSession::begin(&cell).is_ok());
    }

    #[test]
    fn test_unwind_restores_idle() {
        let cell = Cell::new(SessionState::Idle);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _running = ParseSession::begin(&cell).unwrap().running();
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(cell.get(), SessionState::Idle);
    }
}
