//! Event Recorder
//!
//! A ready-made `EventSink` that keeps an owned copy of every event, in
//! arrival order, across all three channels.

use super::events::{Channel, Name, SaxAttribute, SaxEvent};
use crate::error::Result;
use crate::handler::{Attributes, DocumentHandler, DtdContentModelHandler, DtdHandler, Occurrence, QName, Separator};
use crate::input::Locator;

/// Sink that records owned `SaxEvent`s
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<SaxEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(256),
        }
    }

    /// Create with estimated capacity
    pub fn with_capacity(events: usize) -> Self {
        Self {
            events: Vec::with_capacity(events),
        }
    }

    /// Get the recorded events as a slice
    pub fn events(&self) -> &[SaxEvent] {
        &self.events
    }

    /// Take the recorded events, leaving the recorder empty
    pub fn take_events(&mut self) -> Vec<SaxEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn into_events(self) -> Vec<SaxEvent> {
        self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events that travelled on one channel
    pub fn on(&self, channel: Channel) -> impl Iterator<Item = &SaxEvent> + '_ {
        self.events.iter().filter(move |e| e.channel() == channel)
    }

    /// Concatenated character data; ignorable whitespace and CDATA excluded
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                SaxEvent::Characters(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, event: SaxEvent) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string)
}

impl DocumentHandler for EventRecorder {
    fn start_document(&mut self, _locator: &Locator, encoding: Option<&str>) -> Result<()> {
        self.push(SaxEvent::StartDocument {
            encoding: owned(encoding),
        })
    }

    fn xml_decl(&mut self, version: &str, encoding: Option<&str>, standalone: Option<bool>) -> Result<()> {
        self.push(SaxEvent::XmlDecl {
            version: version.to_string(),
            encoding: owned(encoding),
            standalone,
        })
    }

    fn doctype_decl(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        self.push(SaxEvent::DoctypeDecl {
            root: root.to_string(),
            public_id: owned(public_id),
            system_id: owned(system_id),
        })
    }

    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) -> Result<()> {
        self.push(SaxEvent::StartPrefixMapping {
            prefix: owned(prefix),
            uri: uri.to_string(),
        })
    }

    fn end_prefix_mapping(&mut self, prefix: Option<&str>) -> Result<()> {
        self.push(SaxEvent::EndPrefixMapping { prefix: owned(prefix) })
    }

    fn start_element(&mut self, name: &QName, attributes: &Attributes) -> Result<()> {
        self.push(SaxEvent::StartElement {
            name: Name::from(name),
            attributes: attributes.iter().map(SaxAttribute::from).collect(),
        })
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        self.push(SaxEvent::EndElement { name: Name::from(name) })
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.push(SaxEvent::Characters(text.to_string()))
    }

    fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
        self.push(SaxEvent::IgnorableWhitespace(text.to_string()))
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        self.push(SaxEvent::CData(text.to_string()))
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.push(SaxEvent::Comment(text.to_string()))
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        self.push(SaxEvent::ProcessingInstruction {
            target: target.to_string(),
            data: owned(data),
        })
    }

    fn skipped_entity(&mut self, name: &str) -> Result<()> {
        self.push(SaxEvent::SkippedEntity(name.to_string()))
    }

    fn end_document(&mut self) -> Result<()> {
        self.push(SaxEvent::EndDocument)
    }
}

impl DtdHandler for EventRecorder {
    fn start_dtd(&mut self, root: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        self.push(SaxEvent::StartDtd {
            root: root.to_string(),
            public_id: owned(public_id),
            system_id: owned(system_id),
        })
    }

    fn element_decl(&mut self, name: &str, model: &str) -> Result<()> {
        self.push(SaxEvent::ElementDecl {
            name: name.to_string(),
            model: model.to_string(),
        })
    }

    fn attribute_decl(
        &mut self,
        element: &str,
        attribute: &str,
        att_type: &str,
        mode: Option<&str>,
        default: Option<&str>,
    ) -> Result<()> {
        self.push(SaxEvent::AttributeDecl {
            element: element.to_string(),
            attribute: attribute.to_string(),
            att_type: att_type.to_string(),
            mode: owned(mode),
            default: owned(default),
        })
    }

    fn internal_entity_decl(&mut self, name: &str, value: &str) -> Result<()> {
        self.push(SaxEvent::InternalEntityDecl {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    fn external_entity_decl(&mut self, name: &str, public_id: Option<&str>, system_id: &str) -> Result<()> {
        self.push(SaxEvent::ExternalEntityDecl {
            name: name.to_string(),
            public_id: owned(public_id),
            system_id: system_id.to_string(),
        })
    }

    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: &str,
        notation: &str,
    ) -> Result<()> {
        self.push(SaxEvent::UnparsedEntityDecl {
            name: name.to_string(),
            public_id: owned(public_id),
            system_id: system_id.to_string(),
            notation: notation.to_string(),
        })
    }

    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) -> Result<()> {
        self.push(SaxEvent::NotationDecl {
            name: name.to_string(),
            public_id: owned(public_id),
            system_id: owned(system_id),
        })
    }

    fn dtd_comment(&mut self, text: &str) -> Result<()> {
        self.push(SaxEvent::DtdComment(text.to_string()))
    }

    fn dtd_processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        self.push(SaxEvent::DtdProcessingInstruction {
            target: target.to_string(),
            data: owned(data),
        })
    }

    fn end_dtd(&mut self) -> Result<()> {
        self.push(SaxEvent::EndDtd)
    }
}

impl DtdContentModelHandler for EventRecorder {
    fn start_content_model(&mut self, element: &str) -> Result<()> {
        self.push(SaxEvent::StartContentModel(element.to_string()))
    }

    fn any(&mut self) -> Result<()> {
        self.push(SaxEvent::Any)
    }

    fn empty(&mut self) -> Result<()> {
        self.push(SaxEvent::Empty)
    }

    fn start_group(&mut self) -> Result<()> {
        self.push(SaxEvent::StartGroup)
    }

    fn pcdata(&mut self) -> Result<()> {
        self.push(SaxEvent::PcData)
    }

    fn element(&mut self, name: &str) -> Result<()> {
        self.push(SaxEvent::Element(name.to_string()))
    }

    fn separator(&mut self, separator: Separator) -> Result<()> {
        self.push(SaxEvent::Separator(separator))
    }

    fn occurrence(&mut self, occurrence: Occurrence) -> Result<()> {
        self.push(SaxEvent::Occurrence(occurrence))
    }

    fn end_group(&mut self) -> Result<()> {
        self.push(SaxEvent::EndGroup)
    }

    fn end_content_model(&mut self) -> Result<()> {
        self.push(SaxEvent::EndContentModel)
    }
}
