//! Elixir Term Conversion
//!
//! Events become tagged tuples, with the tag taken from `SaxEvent::kind`.
//! Events without a payload are bare atoms. Absent values encode as `nil`.

use rustler::types::atom::{nil, Atom};
use rustler::{Encoder, Env, NewBinary, NifResult, Term};

use crate::error::ErrorKind;
use crate::handler::{Occurrence, Separator};
use crate::sax::{Name, SaxAttribute, SaxEvent};
use crate::strategy::parallel::BatchError;

rustler::atoms! {
    ok,
    error,
    sequence,
    choice,
    zero_or_one,
    zero_or_more,
    one_or_more,
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
fn binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    let bytes = s.as_bytes();
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}

fn optional<'a>(env: Env<'a>, s: Option<&str>) -> Term<'a> {
    match s {
        Some(s) => binary(env, s),
        None => nil().encode(env),
    }
}

/// `{raw, uri | nil, local}`
fn name_to_term<'a>(env: Env<'a>, name: &Name) -> Term<'a> {
    (
        binary(env, &name.raw),
        optional(env, name.uri.as_deref()),
        binary(env, &name.local),
    )
        .encode(env)
}

/// `{name, value, type, specified}`
fn attribute_to_term<'a>(env: Env<'a>, attr: &SaxAttribute) -> Term<'a> {
    (
        name_to_term(env, &attr.name),
        binary(env, &attr.value),
        binary(env, attr.att_type),
        attr.specified,
    )
        .encode(env)
}

/// Convert recorded events to an Elixir list
pub fn events_to_term<'a>(env: Env<'a>, events: &[SaxEvent]) -> NifResult<Term<'a>> {
    let mut list = Term::list_new_empty(env);
    for event in events.iter().rev() {
        list = list.list_prepend(event_to_term(env, event)?);
    }
    Ok(list)
}

/// Convert a single event to an Elixir term
pub fn event_to_term<'a>(env: Env<'a>, event: &SaxEvent) -> NifResult<Term<'a>> {
    let tag = Atom::from_str(env, event.kind())?.encode(env);
    let term = match event {
        SaxEvent::StartDocument { encoding } => (tag, optional(env, encoding.as_deref())).encode(env),
        SaxEvent::XmlDecl {
            version,
            encoding,
            standalone,
        } => (tag, binary(env, version), optional(env, encoding.as_deref()), *standalone).encode(env),
        SaxEvent::DoctypeDecl {
            root,
            public_id,
            system_id,
        }
        | SaxEvent::StartDtd {
            root,
            public_id,
            system_id,
        } => (
            tag,
            binary(env, root),
            optional(env, public_id.as_deref()),
            optional(env, system_id.as_deref()),
        )
            .encode(env),
        SaxEvent::StartPrefixMapping { prefix, uri } => {
            (tag, optional(env, prefix.as_deref()), binary(env, uri)).encode(env)
        }
        SaxEvent::EndPrefixMapping { prefix } => (tag, optional(env, prefix.as_deref())).encode(env),
        SaxEvent::StartElement { name, attributes } => {
            let mut attrs = Term::list_new_empty(env);
            for attr in attributes.iter().rev() {
                attrs = attrs.list_prepend(attribute_to_term(env, attr));
            }
            (tag, name_to_term(env, name), attrs).encode(env)
        }
        SaxEvent::EndElement { name } => (tag, name_to_term(env, name)).encode(env),
        SaxEvent::Characters(text)
        | SaxEvent::IgnorableWhitespace(text)
        | SaxEvent::CData(text)
        | SaxEvent::Comment(text)
        | SaxEvent::SkippedEntity(text)
        | SaxEvent::DtdComment(text)
        | SaxEvent::StartContentModel(text)
        | SaxEvent::Element(text) => (tag, binary(env, text)).encode(env),
        SaxEvent::ProcessingInstruction { target, data }
        | SaxEvent::DtdProcessingInstruction { target, data } => {
            (tag, binary(env, target), optional(env, data.as_deref())).encode(env)
        }
        SaxEvent::ElementDecl { name, model } => (tag, binary(env, name), binary(env, model)).encode(env),
        SaxEvent::AttributeDecl {
            element,
            attribute,
            att_type,
            mode,
            default,
        } => (
            tag,
            binary(env, element),
            binary(env, attribute),
            binary(env, att_type),
            optional(env, mode.as_deref()),
            optional(env, default.as_deref()),
        )
            .encode(env),
        SaxEvent::InternalEntityDecl { name, value } => (tag, binary(env, name), binary(env, value)).encode(env),
        SaxEvent::ExternalEntityDecl {
            name,
            public_id,
            system_id,
        } => (
            tag,
            binary(env, name),
            optional(env, public_id.as_deref()),
            binary(env, system_id),
        )
            .encode(env),
        SaxEvent::UnparsedEntityDecl {
            name,
            public_id,
            system_id,
            notation,
        } => (
            tag,
            binary(env, name),
            optional(env, public_id.as_deref()),
            binary(env, system_id),
            binary(env, notation),
        )
            .encode(env),
        SaxEvent::NotationDecl {
            name,
            public_id,
            system_id,
        } => (
            tag,
            binary(env, name),
            optional(env, public_id.as_deref()),
            optional(env, system_id.as_deref()),
        )
            .encode(env),
        SaxEvent::Separator(separator) => {
            let value = match separator {
                Separator::Sequence => sequence(),
                Separator::Choice => choice(),
            };
            (tag, value).encode(env)
        }
        SaxEvent::Occurrence(occurrence) => {
            let value = match occurrence {
                Occurrence::ZeroOrOne => zero_or_one(),
                Occurrence::ZeroOrMore => zero_or_more(),
                Occurrence::OneOrMore => one_or_more(),
            };
            (tag, value).encode(env)
        }
        SaxEvent::EndDocument
        | SaxEvent::EndDtd
        | SaxEvent::Any
        | SaxEvent::Empty
        | SaxEvent::StartGroup
        | SaxEvent::PcData
        | SaxEvent::EndGroup
        | SaxEvent::EndContentModel => tag,
    };
    Ok(term)
}

fn error_kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::FeatureNotRecognized => "feature_not_recognized",
        ErrorKind::FeatureNotSupported => "feature_not_supported",
        ErrorKind::PropertyNotRecognized => "property_not_recognized",
        ErrorKind::PropertyNotSupported => "property_not_supported",
        ErrorKind::ReentrantParse => "reentrant_parse",
        ErrorKind::Input => "input",
        ErrorKind::StructuredParse => "parse",
        ErrorKind::WrappedUnexpected => "unexpected",
    }
}

/// `{:error, {kind, message}}`
pub fn error_to_term<'a>(env: Env<'a>, err: &BatchError) -> NifResult<Term<'a>> {
    let kind = Atom::from_str(env, error_kind_name(err.kind))?;
    Ok((error(), (kind, binary(env, &err.message))).encode(env))
}

/// `{:ok, events}` or `{:error, {kind, message}}`
pub fn result_to_term<'a>(env: Env<'a>, result: &Result<Vec<SaxEvent>, BatchError>) -> NifResult<Term<'a>> {
    match result {
        Ok(events) => Ok((ok(), events_to_term(env, events)?).encode(env)),
        Err(err) => error_to_term(env, err),
    }
}
