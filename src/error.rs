//! Error Taxonomy
//!
//! One error type for the whole pipeline. Configuration checks, input
//! loading and every stage report through `XmlError`; `XmlError::kind()`
//! gives the flat classification callers match on.

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, XmlError>;

/// Position in the document entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    /// 1-based line number (0 when unknown)
    pub line: u32,
    /// 1-based column number (0 when unknown)
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .system_id
            .as_deref()
            .or(self.public_id.as_deref())
            .unwrap_or("<input>");
        write!(f, "{}:{}:{}", id, self.line, self.column)
    }
}

/// What rule a structured parse error broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed markup
    WellFormedness,
    /// Document does not match its grammar
    Validity,
    /// Malformed or inconsistent DTD declarations
    Grammar,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::WellFormedness => "not well-formed",
            ParseErrorKind::Validity => "invalid",
            ParseErrorKind::Grammar => "grammar error",
        };
        f.write_str(s)
    }
}

/// Error raised by a stage while scanning or validating
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {kind}: {message}")]
pub struct StructuredError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub location: Location,
}

impl StructuredError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }

    pub fn well_formedness(message: impl Into<String>, location: Location) -> Self {
        Self::new(ParseErrorKind::WellFormedness, message, location)
    }

    pub fn validity(message: impl Into<String>, location: Location) -> Self {
        Self::new(ParseErrorKind::Validity, message, location)
    }

    pub fn grammar(message: impl Into<String>, location: Location) -> Self {
        Self::new(ParseErrorKind::Grammar, message, location)
    }
}

/// Failure to obtain or decode the document entity
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Reading the byte stream failed.
    #[error("I/O error reading {system_id}: {source}")]
    Io {
        system_id: String,
        #[source]
        source: std::io::Error,
    },

    /// Bytes are not valid in the detected or declared encoding.
    #[error("invalid {encoding} byte sequence at offset {offset}")]
    Decoding {
        encoding: &'static str,
        offset: usize,
    },

    /// The declared encoding is not one the loader can decode.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The input source carries neither bytes, text nor a reader.
    #[error("input source {0} has no byte stream; entity resolution is not available")]
    MissingStream(String),
}

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Feature id lies outside every known namespace, or is unknown in a closed one.
    #[error("feature not recognized: {0}")]
    FeatureNotRecognized(String),

    /// Feature id is recognized but the requested state cannot be set.
    #[error("feature not supported: {id} ({reason})")]
    FeatureNotSupported { id: String, reason: &'static str },

    /// Property id lies outside every known namespace, or is unknown in a closed one.
    #[error("property not recognized: {0}")]
    PropertyNotRecognized(String),

    /// Property id is recognized but the value cannot be set.
    #[error("property not supported: {id} ({reason})")]
    PropertyNotSupported { id: String, reason: &'static str },

    /// `parse` was called while another parse on the same instance is in progress.
    #[error("parse may not be called while parsing")]
    ReentrantParse,

    /// Passed through from the input source.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Passed through from a stage.
    #[error(transparent)]
    Parse(#[from] StructuredError),

    /// Anything a stage contract did not anticipate.
    #[error("unexpected error: {0}")]
    Unexpected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Flat classification of `XmlError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FeatureNotRecognized,
    FeatureNotSupported,
    PropertyNotRecognized,
    PropertyNotSupported,
    ReentrantParse,
    Input,
    StructuredParse,
    WrappedUnexpected,
}

impl XmlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XmlError::FeatureNotRecognized(_) => ErrorKind::FeatureNotRecognized,
            XmlError::FeatureNotSupported { .. } => ErrorKind::FeatureNotSupported,
            XmlError::PropertyNotRecognized(_) => ErrorKind::PropertyNotRecognized,
            XmlError::PropertyNotSupported { .. } => ErrorKind::PropertyNotSupported,
            XmlError::ReentrantParse => ErrorKind::ReentrantParse,
            XmlError::Input(_) => ErrorKind::Input,
            XmlError::Parse(_) => ErrorKind::StructuredParse,
            XmlError::Unexpected(_) => ErrorKind::WrappedUnexpected,
        }
    }

    /// Wrap an implementation-specific error from a stage
    pub fn unexpected<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        XmlError::Unexpected(Box::new(err))
    }

    /// Wrap a bare message as an unexpected error
    pub fn unexpected_msg(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        XmlError::Unexpected(msg.into())
    }

    /// Classify an error leaving a parse session.
    ///
    /// Input and structured errors pass through untouched, as do errors that
    /// are already wrapped. Everything else is wrapped so the caller never
    /// sees a configuration or reentrancy error from inside a stage as if it
    /// were its own.
    pub fn into_parse_failure(self) -> Self {
        match self {
            XmlError::Input(_) | XmlError::Parse(_) | XmlError::Unexpected(_) => self,
            other => XmlError::Unexpected(Box::new(other)),
        }
    }

    /// The structured error, if this is one
    pub fn as_structured(&self) -> Option<&StructuredError> {
        match self {
            XmlError::Parse(e) => Some(e),
            _ => None,
        }
    }
}
