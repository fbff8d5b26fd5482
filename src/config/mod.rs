//! Runtime Configuration
//!
//! - ids: feature/property identifiers and namespace dispatch
//! - value: typed property values, including stage handles
//! - registry: the store that checks, records and forwards writes

pub mod ids;
pub mod registry;
pub mod value;

pub use ids::{FeatureId, NamespaceTable, PropertyId};
pub use registry::ConfigurationRegistry;
pub use value::PropertyValue;
