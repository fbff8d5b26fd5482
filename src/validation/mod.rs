//! DTD Validation
//!
//! - grammar: declarations, content models and the grammar pool
//! - datatypes: lexical checks for attribute types
//! - validator: the default validator stage

pub mod datatypes;
pub mod grammar;
pub mod validator;

pub use datatypes::{BuiltinDatatypes, DatatypeValidator, DatatypeValidatorFactory};
pub use grammar::{ContentSpec, DtdGrammar, GrammarPool};
pub use validator::DefaultValidator;
