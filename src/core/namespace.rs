//! Namespace Context
//!
//! Stack-based prefix -> URI resolver used by the document scanner when
//! the namespaces feature is on.

use super::symbols::{Symbol, SymbolTable};

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI). The default namespace has no prefix;
/// an empty URI undeclares it.
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: Option<Symbol>,
    uri: Symbol,
    depth: u32,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceContext {
    bindings: Vec<NsBinding>,
    depth: u32,
    xml_prefix: Symbol,
    xmlns_prefix: Symbol,
}

impl NamespaceContext {
    /// Create a resolver with the `xml` prefix pre-bound
    pub fn new(symbols: &SymbolTable) -> Self {
        let xml_prefix = symbols.intern("xml");
        let xmlns_prefix = symbols.intern("xmlns");
        let xml_uri = symbols.intern(ns::XML);

        let mut ctx = NamespaceContext {
            bindings: Vec::with_capacity(16),
            depth: 0,
            xml_prefix,
            xmlns_prefix,
        };
        ctx.bindings.push(NsBinding {
            prefix: Some(ctx.xml_prefix.clone()),
            uri: xml_uri,
            depth: 0,
        });
        ctx
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, returning the prefixes that went out of scope
    pub fn pop_scope(&mut self) -> Vec<Option<Symbol>> {
        let mut ended = Vec::new();
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            if let Some(b) = self.bindings.pop() {
                ended.push(b.prefix);
            }
        }
        self.depth = self.depth.saturating_sub(1);
        ended
    }

    /// Declare a binding in the current scope.
    ///
    /// Fails for bindings the Namespaces in XML rec forbids: rebinding
    /// `xmlns`, binding `xml` to anything but its URI, binding any other
    /// prefix to the xml URI, or undeclaring a prefix.
    pub fn declare(&mut self, prefix: Option<Symbol>, uri: Symbol) -> Result<(), &'static str> {
        match &prefix {
            Some(p) if *p == self.xmlns_prefix => {
                return Err("the xmlns prefix must not be declared");
            }
            Some(p) if *p == self.xml_prefix => {
                if uri.as_str() != ns::XML {
                    return Err("the xml prefix must be bound to its own namespace");
                }
                return Ok(());
            }
            Some(_) if uri.is_empty() => {
                return Err("a prefixed namespace declaration must not be empty");
            }
            _ => {}
        }
        if uri.as_str() == ns::XMLNS || (uri.as_str() == ns::XML && prefix.is_some()) {
            return Err("reserved namespace name cannot be bound");
        }

        self.bindings.push(NsBinding {
            prefix,
            uri,
            depth: self.depth,
        });
        Ok(())
    }

    /// Resolve a prefix (`None` = default namespace) to its URI
    pub fn resolve(&self, prefix: Option<&str>) -> Option<Symbol> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.clone())
            .filter(|uri| !uri.is_empty())
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// True for the reserved `xmlns` prefix
    pub fn is_xmlns(&self, prefix: &str) -> bool {
        self.xmlns_prefix == prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_prefix_prebound() {
        let symbols = SymbolTable::new();
        let ctx = NamespaceContext::new(&symbols);
        assert_eq!(ctx.resolve(Some("xml")).as_deref(), Some(ns::XML));
        assert_eq!(ctx.resolve(None), None);
    }

    #[test]
    fn test_declare_and_pop() {
        let symbols = SymbolTable::new();
        let mut ctx = NamespaceContext::new(&symbols);

        ctx.push_scope();
        ctx.declare(Some(symbols.intern("svg")), symbols.intern("http://www.w3.org/2000/svg"))
            .unwrap();
        assert_eq!(ctx.resolve(Some("svg")).as_deref(), Some("http://www.w3.org/2000/svg"));

        let ended = ctx.pop_scope();
        assert_eq!(ended.len(), 1);
        assert_eq!(ctx.resolve(Some("svg")), None);
    }

    #[test]
    fn test_shadow_and_undeclare_default() {
        let symbols = SymbolTable::new();
        let mut ctx = NamespaceContext::new(&symbols);

        ctx.push_scope();
        ctx.declare(None, symbols.intern("urn:one")).unwrap();
        ctx.push_scope();
        ctx.declare(None, symbols.intern("")).unwrap();
        assert_eq!(ctx.resolve(None), None);

        ctx.pop_scope();
        assert_eq!(ctx.resolve(None).as_deref(), Some("urn:one"));
    }

    #[test]
    fn test_reserved_bindings_rejected() {
        let symbols = SymbolTable::new();
        let mut ctx = NamespaceContext::new(&symbols);
        ctx.push_scope();

        assert!(ctx.declare(Some(symbols.intern("xmlns")), symbols.intern("urn:x")).is_err());
        assert!(ctx.declare(Some(symbols.intern("xml")), symbols.intern("urn:x")).is_err());
        assert!(ctx.declare(Some(symbols.intern("p")), symbols.intern("")).is_err());
        assert!(ctx.declare(Some(symbols.intern("p")), symbols.intern(ns::XML)).is_err());
        assert!(ctx.declare(Some(symbols.intern("xml")), symbols.intern(ns::XML)).is_ok());
    }
}
