//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks the default stages
//! are written against:
//! - Scanner: SIMD-accelerated cursor using memchr
//! - Entities: Built-in entity and character reference decoding
//! - Encoding: BOM/declaration detection and conversion to UTF-8
//! - Namespace: Scoped prefix -> URI resolution
//! - Symbols: Shared string-interning table

pub mod encoding;
pub mod entities;
pub mod namespace;
pub mod scanner;
pub mod symbols;

pub use symbols::{Symbol, SymbolTable};
