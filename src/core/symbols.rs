//! Symbol Table
//!
//! Shared string-interning table for element names, attribute names,
//! prefixes and namespace URIs. Every stage of one parser interns through
//! the same table, so equal names compare by pointer.
//!
//! Uses hash-based lookup to avoid storing duplicate string data.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

/// An interned string
///
/// Cloning is a reference-count bump. Equality short-circuits on pointer
/// identity, then falls back to content so symbols from different tables
/// still compare correctly.
#[derive(Clone, Eq)]
pub struct Symbol(Rc<str>);

impl Symbol {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if both symbols come from the same table entry
    #[inline]
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Symbol {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Deref for Symbol {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backing storage: entries by id plus hash -> ids (handles rare collisions)
#[derive(Debug, Default)]
struct SymbolPool {
    entries: Vec<Symbol>,
    hash_index: HashMap<u64, Vec<u32>>,
}

impl SymbolPool {
    #[inline]
    fn compute_hash(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    fn lookup(&self, hash: u64, s: &str) -> Option<&Symbol> {
        self.hash_index.get(&hash)?.iter().find_map(|&id| {
            let sym = &self.entries[id as usize];
            (sym.as_str() == s).then_some(sym)
        })
    }

    fn intern(&mut self, s: &str) -> Symbol {
        let hash = Self::compute_hash(s);
        if let Some(existing) = self.lookup(hash, s) {
            return existing.clone();
        }

        let sym = Symbol(Rc::from(s));
        let id = self.entries.len() as u32;
        self.entries.push(sym.clone());
        self.hash_index.entry(hash).or_default().push(id);
        sym
    }
}

/// Shared handle to a symbol table
///
/// Cloning the handle shares the table. A parser and its grammar pool must
/// use the same table; construct them together.
#[derive(Clone, Default)]
pub struct SymbolTable {
    pool: Rc<RefCell<SymbolPool>>,
}

impl SymbolTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the shared symbol for its content
    pub fn intern(&self, s: &str) -> Symbol {
        self.pool.borrow_mut().intern(s)
    }

    /// Look up a string without interning it
    pub fn get(&self, s: &str) -> Option<Symbol> {
        let pool = self.pool.borrow();
        pool.lookup(SymbolPool::compute_hash(s), s).cloned()
    }

    pub fn contains(&self, s: &str) -> bool {
        self.get(s).is_some()
    }

    /// Number of distinct symbols
    pub fn len(&self) -> usize {
        self.pool.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if both handles point at the same table
    pub fn same_table(&self, other: &SymbolTable) -> bool {
        Rc::ptr_eq(&self.pool, &other.pool)
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_duplicate() {
        let table = SymbolTable::new();
        let a = table.intern("hello");
        let b = table.intern("hello");
        assert!(a.ptr_eq(&b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_intern_different() {
        let table = SymbolTable::new();
        let a = table.intern("hello");
        let b = table.intern("world");
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_does_not_intern() {
        let table = SymbolTable::new();
        assert!(table.get("root").is_none());
        table.intern("root");
        assert_eq!(table.get("root").as_deref(), Some("root"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_shared_handle() {
        let table = SymbolTable::new();
        let other = table.clone();
        let a = table.intern("x");
        let b = other.intern("x");
        assert!(a.ptr_eq(&b));
        assert!(table.same_table(&other));
        assert!(!table.same_table(&SymbolTable::new()));
    }

    #[test]
    fn test_cross_table_equality_by_content() {
        let a = SymbolTable::new().intern("name");
        let b = SymbolTable::new().intern("name");
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_eq!(a, "name");
    }

    #[test]
    fn test_empty_string() {
        let table = SymbolTable::new();
        let e = table.intern("");
        assert_eq!(e.as_str(), "");
    }
}
