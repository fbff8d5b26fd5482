//! Datatype Validators
//!
//! Lexical checks for the DTD attribute types. The validator asks the
//! factory bound in the registry for a validator by type name, so a
//! replacement factory can tighten or extend the checks.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::core::scanner::{is_name, is_nmtoken};

/// Checks the lexical form of one datatype
pub trait DatatypeValidator {
    fn name(&self) -> &str;

    /// `Err` carries a description of what is wrong with `value`
    fn validate(&self, value: &str) -> Result<(), String>;
}

/// Hands out validators by datatype name
pub trait DatatypeValidatorFactory {
    fn validator(&self, name: &str) -> Option<Rc<dyn DatatypeValidator>>;
}

/// The DTD attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    CData,
    /// ID, IDREF, ENTITY, NOTATION: a single Name
    Name(&'static str),
    /// IDREFS, ENTITIES: whitespace-separated Names
    Names(&'static str),
    Nmtoken,
    Nmtokens,
}

impl DatatypeValidator for BuiltinType {
    fn name(&self) -> &str {
        match self {
            BuiltinType::CData => "CDATA",
            BuiltinType::Name(n) | BuiltinType::Names(n) => n,
            BuiltinType::Nmtoken => "NMTOKEN",
            BuiltinType::Nmtokens => "NMTOKENS",
        }
    }

    fn validate(&self, value: &str) -> Result<(), String> {
        let ok = match self {
            BuiltinType::CData => true,
            BuiltinType::Name(_) => is_name(value),
            BuiltinType::Names(_) => list(value).all(is_name) && list(value).next().is_some(),
            BuiltinType::Nmtoken => is_nmtoken(value),
            BuiltinType::Nmtokens => list(value).all(is_nmtoken) && list(value).next().is_some(),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("'{value}' is not a valid {}", self.name()))
        }
    }
}

fn list(value: &str) -> impl Iterator<Item = &str> {
    value.split_ascii_whitespace()
}

/// Factory for the built-in DTD types
pub struct BuiltinDatatypes {
    validators: HashMap<&'static str, Rc<dyn DatatypeValidator>>,
}

impl BuiltinDatatypes {
    pub fn new() -> Self {
        let types = [
            BuiltinType::CData,
            BuiltinType::Name("ID"),
            BuiltinType::Name("IDREF"),
            BuiltinType::Names("IDREFS"),
            BuiltinType::Name("ENTITY"),
            BuiltinType::Names("ENTITIES"),
            BuiltinType::Nmtoken,
            BuiltinType::Nmtokens,
            BuiltinType::Name("NOTATION"),
        ];
        let validators = types
            .into_iter()
            .map(|t| {
                let name: &'static str = match t {
                    BuiltinType::CData => "CDATA",
                    BuiltinType::Name(n) | BuiltinType::Names(n) => n,
                    BuiltinType::Nmtoken => "NMTOKEN",
                    BuiltinType::Nmtokens => "NMTOKENS",
                };
                (name, Rc::new(t) as Rc<dyn DatatypeValidator>)
            })
            .collect();
        Self { validators }
    }
}

impl Default for BuiltinDatatypes {
    fn default() -> Self {
        Self::new()
    }
}

impl DatatypeValidatorFactory for BuiltinDatatypes {
    fn validator(&self, name: &str) -> Option<Rc<dyn DatatypeValidator>> {
        self.validators.get(name).cloned()
    }
}

impl fmt::Debug for BuiltinDatatypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.validators.keys().collect();
        names.sort();
        f.debug_struct("BuiltinDatatypes").field("types", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let factory = BuiltinDatatypes::new();
        assert_eq!(factory.validator("IDREFS").unwrap().name(), "IDREFS");
        assert!(factory.validator("xs:string").is_none());
    }

    #[test]
    fn test_name_types() {
        let factory = BuiltinDatatypes::new();
        let id = factory.validator("ID").unwrap();
        assert!(id.validate("a1").is_ok());
        assert!(id.validate("1a").is_err());
        assert!(id.validate("a b").is_err());

        let refs = factory.validator("IDREFS").unwrap();
        assert!(refs.validate("a b  c").is_ok());
        assert!(refs.validate("").is_err());
    }

    #[test]
    fn test_nmtokens() {
        let factory = BuiltinDatatypes::new();
        let tokens = factory.validator("NMTOKENS").unwrap();
        assert!(tokens.validate("1 -2 .3").is_ok());
        assert!(tokens.validate("a,b").is_err());
        assert!(factory.validator("CDATA").unwrap().validate("anything at all").is_ok());
    }
}
