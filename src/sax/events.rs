//! SAX Event Types
//!
//! Owned copies of the events delivered on the three channels. Unlike the
//! borrowed callback arguments they outlive the parse and are `Send`, so a
//! batch worker can hand them back across threads.

use crate::handler::{Attribute, Occurrence, QName, Separator};

/// Which pipeline channel an event travelled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Document,
    Dtd,
    ContentModel,
}

/// An element or attribute name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    /// Name as written, prefix included
    pub raw: String,
    pub local: String,
    pub uri: Option<String>,
}

impl Name {
    /// Split `raw` at its first colon; no namespace
    pub fn new(raw: &str) -> Self {
        let local = match raw.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => local,
            _ => raw,
        };
        Name {
            raw: raw.to_string(),
            local: local.to_string(),
            uri: None,
        }
    }

    pub fn with_uri(mut self, uri: Option<&str>) -> Self {
        self.uri = uri.map(str::to_string);
        self
    }
}

impl From<&QName> for Name {
    fn from(q: &QName) -> Self {
        Name {
            raw: q.raw_name.to_string(),
            local: q.local_name.to_string(),
            uri: q.uri.as_ref().map(|u| u.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaxAttribute {
    pub name: Name,
    pub value: String,
    pub att_type: &'static str,
    pub specified: bool,
}

impl From<&Attribute> for SaxAttribute {
    fn from(a: &Attribute) -> Self {
        SaxAttribute {
            name: Name::from(&a.name),
            value: a.value.clone(),
            att_type: a.att_type,
            specified: a.specified,
        }
    }
}

/// A recorded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaxEvent {
    // Document channel
    StartDocument {
        encoding: Option<String>,
    },
    XmlDecl {
        version: String,
        encoding: Option<String>,
        standalone: Option<bool>,
    },
    DoctypeDecl {
        root: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    StartPrefixMapping {
        prefix: Option<String>,
        uri: String,
    },
    EndPrefixMapping {
        prefix: Option<String>,
    },
    StartElement {
        name: Name,
        attributes: Vec<SaxAttribute>,
    },
    EndElement {
        name: Name,
    },
    Characters(String),
    IgnorableWhitespace(String),
    CData(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
    SkippedEntity(String),
    EndDocument,

    // DTD channel
    StartDtd {
        root: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    ElementDecl {
        name: String,
        model: String,
    },
    AttributeDecl {
        element: String,
        attribute: String,
        att_type: String,
        mode: Option<String>,
        default: Option<String>,
    },
    InternalEntityDecl {
        name: String,
        value: String,
    },
    ExternalEntityDecl {
        name: String,
        public_id: Option<String>,
        system_id: String,
    },
    UnparsedEntityDecl {
        name: String,
        public_id: Option<String>,
        system_id: String,
        notation: String,
    },
    NotationDecl {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    DtdComment(String),
    DtdProcessingInstruction {
        target: String,
        data: Option<String>,
    },
    EndDtd,

    // Content model channel
    StartContentModel(String),
    Any,
    Empty,
    StartGroup,
    PcData,
    Element(String),
    Separator(Separator),
    Occurrence(Occurrence),
    EndGroup,
    EndContentModel,
}

impl SaxEvent {
    /// A start tag without attributes
    pub fn start_element(raw: &str, uri: Option<&str>) -> Self {
        SaxEvent::StartElement {
            name: Name::new(raw).with_uri(uri),
            attributes: Vec::new(),
        }
    }

    pub fn end_element(raw: &str, uri: Option<&str>) -> Self {
        SaxEvent::EndElement {
            name: Name::new(raw).with_uri(uri),
        }
    }

    pub fn channel(&self) -> Channel {
        use SaxEvent::*;
        match self {
            StartDocument { .. } | XmlDecl { .. } | DoctypeDecl { .. } | StartPrefixMapping { .. }
            | EndPrefixMapping { .. } | StartElement { .. } | EndElement { .. } | Characters(_)
            | IgnorableWhitespace(_) | CData(_) | Comment(_) | ProcessingInstruction { .. }
            | SkippedEntity(_) | EndDocument => Channel::Document,

            StartDtd { .. } | ElementDecl { .. } | AttributeDecl { .. } | InternalEntityDecl { .. }
            | ExternalEntityDecl { .. } | UnparsedEntityDecl { .. } | NotationDecl { .. }
            | DtdComment(_) | DtdProcessingInstruction { .. } | EndDtd => Channel::Dtd,

            StartContentModel(_) | Any | Empty | StartGroup | PcData | Element(_) | SaxEvent::Separator(_)
            | SaxEvent::Occurrence(_) | EndGroup | EndContentModel => Channel::ContentModel,
        }
    }

    /// Check if this is a start element event
    #[inline]
    pub fn is_start_element(&self) -> bool {
        matches!(self, SaxEvent::StartElement { .. })
    }

    /// Check if this is an end element event
    #[inline]
    pub fn is_end_element(&self) -> bool {
        matches!(self, SaxEvent::EndElement { .. })
    }

    /// Short tag naming the event kind
    pub fn kind(&self) -> &'static str {
        use SaxEvent::*;
        match self {
            StartDocument { .. } => "start_document",
            XmlDecl { .. } => "xml_decl",
            DoctypeDecl { .. } => "doctype_decl",
            StartPrefixMapping { .. } => "start_prefix_mapping",
            EndPrefixMapping { .. } => "end_prefix_mapping",
            StartElement { .. } => "start_element",
            EndElement { .. } => "end_element",
            Characters(_) => "characters",
            IgnorableWhitespace(_) => "ignorable_whitespace",
            CData(_) => "cdata",
            Comment(_) => "comment",
            ProcessingInstruction { .. } => "processing_instruction",
            SkippedEntity(_) => "skipped_entity",
            EndDocument => "end_document",
            StartDtd { .. } => "start_dtd",
            ElementDecl { .. } => "element_decl",
            AttributeDecl { .. } => "attribute_decl",
            InternalEntityDecl { .. } => "internal_entity_decl",
            ExternalEntityDecl { .. } => "external_entity_decl",
            UnparsedEntityDecl { .. } => "unparsed_entity_decl",
            NotationDecl { .. } => "notation_decl",
            DtdComment(_) => "dtd_comment",
            DtdProcessingInstruction { .. } => "dtd_processing_instruction",
            EndDtd => "end_dtd",
            StartContentModel(_) => "start_content_model",
            Any => "any",
            Empty => "empty",
            StartGroup => "start_group",
            PcData => "pcdata",
            Element(_) => "element",
            SaxEvent::Separator(_) => "separator",
            SaxEvent::Occurrence(_) => "occurrence",
            EndGroup => "end_group",
            EndContentModel => "end_content_model",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::SymbolTable;

    #[test]
    fn test_name_from_qname() {
        let symbols = SymbolTable::new();
        let q = QName::parse(&symbols, "p:item").with_uri(Some(symbols.intern("urn:p")));
        assert_eq!(Name::from(&q), Name::new("p:item").with_uri(Some("urn:p")));
        assert_eq!(Name::new("item").local, "item");
        assert_eq!(Name::new(":odd").local, ":odd");
    }

    #[test]
    fn test_channels() {
        assert_eq!(SaxEvent::EndDocument.channel(), Channel::Document);
        assert_eq!(SaxEvent::EndDtd.channel(), Channel::Dtd);
        assert_eq!(SaxEvent::PcData.channel(), Channel::ContentModel);
        assert_eq!(SaxEvent::Comment("x".into()).channel(), Channel::Document);
        assert_eq!(SaxEvent::DtdComment("x".into()).channel(), Channel::Dtd);
    }

    #[test]
    fn test_events_are_send() {
        fn assert_send<T: Send + Sync>() {}
        assert_send::<SaxEvent>();
    }
}
