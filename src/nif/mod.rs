//! Erlang NIF surface for `Elixir.RustySax.Native`
//!
//! Features arrive as `[{uri, bool}]` and are applied before parsing.

mod term;

use rustler::{Binary, Env, NifResult, Term};

use crate::strategy::parallel::{self, BatchError};

fn feature_refs(features: &[(String, bool)]) -> Vec<(&str, bool)> {
    features.iter().map(|(uri, state)| (uri.as_str(), *state)).collect()
}

/// Parse one document, returning `{:ok, events}` or `{:error, {kind, message}}`
#[rustler::nif]
fn parse_events<'a>(env: Env<'a>, input: Binary<'a>, features: Vec<(String, bool)>) -> NifResult<Term<'a>> {
    let features = feature_refs(&features);
    let result = parallel::parse_events(input.as_slice(), &features).map_err(BatchError::from);
    term::result_to_term(env, &result)
}

/// Parse many documents in parallel; one result per input, in order
#[rustler::nif(schedule = "DirtyCpu")]
fn parse_batch<'a>(env: Env<'a>, inputs: Vec<Binary<'a>>, features: Vec<(String, bool)>) -> NifResult<Term<'a>> {
    let features = feature_refs(&features);
    let slices: Vec<&[u8]> = inputs.iter().map(|b| b.as_slice()).collect();
    let results = parallel::parse_batch(&slices, &features);

    let mut list = Term::list_new_empty(env);
    for result in results.iter().rev() {
        list = list.list_prepend(term::result_to_term(env, result)?);
    }
    Ok(list)
}

rustler::init!("Elixir.RustySax.Native");
