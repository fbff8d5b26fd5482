//! Input Sources
//!
//! An `InputSource` names where a document comes from; the loader turns it
//! into a decoded `DocumentEntity` before the document scanner runs.
//! Resolution of bare system ids (files, URLs) is left to the caller.

use std::cell::Cell;
use std::fmt;
use std::io::Read;
use std::rc::Rc;

use crate::core::encoding::{decode_document, XmlEncoding};
use crate::error::{InputError, Location};

/// The raw content of an input source
pub enum InputStream {
    Bytes(Vec<u8>),
    /// Already-decoded text; encoding detection is skipped
    Text(String),
    Reader(Box<dyn Read>),
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputStream::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            InputStream::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            InputStream::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// A single input source for an XML entity
#[derive(Debug, Default)]
pub struct InputSource {
    stream: Option<InputStream>,
    public_id: Option<String>,
    system_id: Option<String>,
    encoding: Option<String>,
}

impl InputSource {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            stream: Some(InputStream::Bytes(bytes.into())),
            ..Self::default()
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            stream: Some(InputStream::Text(text.into())),
            ..Self::default()
        }
    }

    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        Self {
            stream: Some(InputStream::Reader(Box::new(reader))),
            ..Self::default()
        }
    }

    /// A source identified only by its system id
    pub fn from_system_id(system_id: impl Into<String>) -> Self {
        Self {
            system_id: Some(system_id.into()),
            ..Self::default()
        }
    }

    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.public_id = Some(public_id.into());
        self
    }

    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    /// Encoding to use instead of the one the document declares
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }
}

impl From<&str> for InputSource {
    fn from(text: &str) -> Self {
        InputSource::from_text(text)
    }
}

impl From<Vec<u8>> for InputSource {
    fn from(bytes: Vec<u8>) -> Self {
        InputSource::from_bytes(bytes)
    }
}

/// A decoded document entity, ready for scanning
#[derive(Debug, Clone)]
pub struct DocumentEntity {
    pub text: Rc<str>,
    /// Encoding the bytes were decoded from (`None` for text sources)
    pub encoding: Option<XmlEncoding>,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

impl DocumentEntity {
    /// Build an entity straight from text, mainly for tests and custom scanners
    pub fn from_text(text: &str) -> Self {
        Self {
            text: Rc::from(text),
            encoding: None,
            public_id: None,
            system_id: None,
        }
    }

    /// A fresh locator positioned at the start of the entity
    pub fn locator(&self) -> Locator {
        Locator::new(self)
    }
}

/// Decode an input source into a document entity
pub fn load_document_entity(source: InputSource) -> Result<DocumentEntity, InputError> {
    let InputSource {
        stream,
        public_id,
        system_id,
        encoding,
    } = source;

    let (text, detected) = match stream {
        Some(InputStream::Text(text)) => (text, None),
        Some(InputStream::Bytes(bytes)) => {
            let (text, enc) = decode_document(bytes, encoding.as_deref())?;
            (text, Some(enc))
        }
        Some(InputStream::Reader(mut reader)) => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).map_err(|source| InputError::Io {
                system_id: display_id(&system_id, &public_id),
                source,
            })?;
            let (text, enc) = decode_document(bytes, encoding.as_deref())?;
            (text, Some(enc))
        }
        None => return Err(InputError::MissingStream(display_id(&system_id, &public_id))),
    };

    Ok(DocumentEntity {
        text: Rc::from(text),
        encoding: detected,
        public_id,
        system_id,
    })
}

fn display_id(system_id: &Option<String>, public_id: &Option<String>) -> String {
    system_id
        .as_deref()
        .or(public_id.as_deref())
        .unwrap_or("<input>")
        .to_string()
}

/// Live position in the document being scanned
///
/// The scanner moves the offset as it goes; line and column are computed on
/// demand, so handlers only pay for positions they actually ask for.
#[derive(Clone)]
pub struct Locator {
    inner: Rc<LocatorState>,
}

struct LocatorState {
    text: Rc<str>,
    offset: Cell<usize>,
    public_id: Option<String>,
    system_id: Option<String>,
}

impl Locator {
    pub fn new(entity: &DocumentEntity) -> Self {
        Self {
            inner: Rc::new(LocatorState {
                text: Rc::clone(&entity.text),
                offset: Cell::new(0),
                public_id: entity.public_id.clone(),
                system_id: entity.system_id.clone(),
            }),
        }
    }

    pub fn set_offset(&self, offset: usize) {
        self.inner.offset.set(offset.min(self.inner.text.len()));
    }

    pub fn offset(&self) -> usize {
        self.inner.offset.get()
    }

    pub fn public_id(&self) -> Option<&str> {
        self.inner.public_id.as_deref()
    }

    pub fn system_id(&self) -> Option<&str> {
        self.inner.system_id.as_deref()
    }

    /// 1-based (line, column) of the current offset
    pub fn line_column(&self) -> (u32, u32) {
        line_column_at(&self.inner.text, self.offset())
    }

    pub fn line(&self) -> u32 {
        self.line_column().0
    }

    pub fn column(&self) -> u32 {
        self.line_column().1
    }

    /// Snapshot the current position as an error location
    pub fn location(&self) -> Location {
        self.location_at(self.offset())
    }

    /// Location of an arbitrary offset in the same entity
    pub fn location_at(&self, offset: usize) -> Location {
        let (line, column) = line_column_at(&self.inner.text, offset.min(self.inner.text.len()));
        Location {
            public_id: self.inner.public_id.clone(),
            system_id: self.inner.system_id.clone(),
            line,
            column,
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, column) = self.line_column();
        f.debug_struct("Locator")
            .field("system_id", &self.inner.system_id)
            .field("line", &line)
            .field("column", &column)
            .finish()
    }
}

fn line_column_at(text: &str, offset: usize) -> (u32, u32) {
    let mut end = offset;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let before = &text[..end];
    let line = memchr::memchr_iter(b'\n', before.as_bytes()).count() + 1;
    let line_start = memchr::memrchr(b'\n', before.as_bytes()).map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line as u32, column as u32)
}
