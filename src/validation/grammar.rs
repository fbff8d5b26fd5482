//! DTD Grammar and Grammar Pool
//!
//! `DtdGrammar` holds the declarations of one document type. The validator
//! builds it from the DTD and content model channels; the grammar pool
//! keeps compiled grammars between parses, keyed by system id or public id.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;

use crate::core::entities::entity_references;
use crate::handler::{Occurrence, Separator};
use crate::stage::DeclaredEntity;

// ============================================================================
// Content models
// ============================================================================

/// Declared content of an element type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSpec {
    Empty,
    Any,
    /// `(#PCDATA | a | b)*`: text plus any of the listed elements
    Mixed(Vec<String>),
    /// Element-only content
    Children(ContentParticle),
}

/// A node of an element-only content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentParticle {
    Name(String, Option<Occurrence>),
    Seq(Vec<ContentParticle>, Option<Occurrence>),
    Choice(Vec<ContentParticle>, Option<Occurrence>),
}

impl ContentParticle {
    fn occurrence_mut(&mut self) -> &mut Option<Occurrence> {
        match self {
            ContentParticle::Name(_, o) | ContentParticle::Seq(_, o) | ContentParticle::Choice(_, o) => o,
        }
    }

    fn occurrence(&self) -> Option<Occurrence> {
        match self {
            ContentParticle::Name(_, o) | ContentParticle::Seq(_, o) | ContentParticle::Choice(_, o) => *o,
        }
    }

    /// True if the child element sequence `names` matches this model
    pub fn matches(&self, names: &[&str]) -> bool {
        let start = BTreeSet::from([0]);
        self.advance(names, &start).contains(&names.len())
    }

    /// Positions reachable after matching this particle from any of `from`
    fn advance(&self, names: &[&str], from: &BTreeSet<usize>) -> BTreeSet<usize> {
        let once = |set: &BTreeSet<usize>| -> BTreeSet<usize> {
            match self {
                ContentParticle::Name(name, _) => set
                    .iter()
                    .filter(|&&i| names.get(i) == Some(&name.as_str()))
                    .map(|i| i + 1)
                    .collect(),
                ContentParticle::Seq(items, _) => items
                    .iter()
                    .fold(set.clone(), |acc, item| item.advance(names, &acc)),
                ContentParticle::Choice(items, _) => items
                    .iter()
                    .flat_map(|item| item.advance(names, set))
                    .collect(),
            }
        };

        let repeat = |seed: BTreeSet<usize>| -> BTreeSet<usize> {
            let mut reached = seed.clone();
            let mut frontier = seed;
            while !frontier.is_empty() {
                let next: BTreeSet<usize> = once(&frontier)
                    .into_iter()
                    .filter(|i| !reached.contains(i))
                    .collect();
                reached.extend(next.iter().copied());
                frontier = next;
            }
            reached
        };

        match self.occurrence() {
            None => once(from),
            Some(Occurrence::ZeroOrOne) => {
                let mut out = from.clone();
                out.extend(once(from));
                out
            }
            Some(Occurrence::ZeroOrMore) => repeat(from.clone()),
            Some(Occurrence::OneOrMore) => repeat(once(from)),
        }
    }

    /// Element names this particle can match
    pub fn names(&self) -> Vec<&str> {
        match self {
            ContentParticle::Name(n, _) => vec![n.as_str()],
            ContentParticle::Seq(items, _) | ContentParticle::Choice(items, _) => {
                items.iter().flat_map(|i| i.names()).collect()
            }
        }
    }
}

impl fmt::Display for ContentParticle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (items, sep) = match self {
            ContentParticle::Name(n, _) => {
                f.write_str(n)?;
                return write_occurrence(f, self.occurrence());
            }
            ContentParticle::Seq(items, _) => (items, ","),
            ContentParticle::Choice(items, _) => (items, "|"),
        };
        f.write_str("(")?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            write!(f, "{item}")?;
        }
        f.write_str(")")?;
        write_occurrence(f, self.occurrence())
    }
}

fn write_occurrence(f: &mut fmt::Formatter<'_>, occurrence: Option<Occurrence>) -> fmt::Result {
    match occurrence {
        Some(o) => write!(f, "{}", o.as_char()),
        None => Ok(()),
    }
}

impl fmt::Display for ContentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSpec::Empty => f.write_str("EMPTY"),
            ContentSpec::Any => f.write_str("ANY"),
            ContentSpec::Mixed(names) if names.is_empty() => f.write_str("(#PCDATA)"),
            ContentSpec::Mixed(names) => write!(f, "(#PCDATA|{})*", names.join("|")),
            ContentSpec::Children(p) => write!(f, "{p}"),
        }
    }
}

/// Parse a contentspec as written in an element declaration
pub fn parse_content_spec(content: &str) -> Result<ContentSpec, String> {
    let content = content.trim();
    match content {
        "EMPTY" => return Ok(ContentSpec::Empty),
        "ANY" => return Ok(ContentSpec::Any),
        _ => {}
    }
    if !content.starts_with('(') {
        return Err(format!("invalid content specification '{content}'"));
    }

    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if let Some(inner) = compact.strip_prefix("(#PCDATA") {
        return parse_mixed(inner);
    }

    let mut parser = ModelParser {
        input: compact.as_bytes(),
        pos: 0,
    };
    let particle = parser.particle()?;
    if parser.pos != parser.input.len() {
        return Err(format!("unexpected text after content model '{content}'"));
    }
    match particle {
        ContentParticle::Name(..) => Err(format!("content model must be a group '{content}'")),
        group => Ok(ContentSpec::Children(group)),
    }
}

fn parse_mixed(rest: &str) -> Result<ContentSpec, String> {
    if rest == ")" || rest == ")*" {
        return Ok(ContentSpec::Mixed(Vec::new()));
    }
    let names = rest
        .strip_suffix(")*")
        .ok_or_else(|| "mixed content with element names must end in ')*'".to_string())?;
    let mut out = Vec::new();
    for name in names.split('|').skip(1) {
        if !crate::core::scanner::is_name(name) {
            return Err(format!("invalid name '{name}' in mixed content"));
        }
        if out.iter().any(|n: &String| n == name) {
            return Err(format!("duplicate name '{name}' in mixed content"));
        }
        out.push(name.to_string());
    }
    if !names.starts_with('|') {
        return Err("mixed content names must follow '#PCDATA|'".to_string());
    }
    Ok(ContentSpec::Mixed(out))
}

struct ModelParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl ModelParser<'_> {
    fn particle(&mut self) -> Result<ContentParticle, String> {
        let mut particle = if self.input.get(self.pos) == Some(&b'(') {
            self.pos += 1;
            self.group()?
        } else {
            let start = self.pos;
            while self
                .input
                .get(self.pos)
                .is_some_and(|&b| crate::core::scanner::is_name_byte(b))
            {
                self.pos += 1;
            }
            let name = std::str::from_utf8(&self.input[start..self.pos]).unwrap_or_default();
            if !crate::core::scanner::is_name(name) {
                return Err(format!("expected element name at offset {start}"));
            }
            ContentParticle::Name(name.to_string(), None)
        };
        *particle.occurrence_mut() = self.occurrence();
        Ok(particle)
    }

    fn group(&mut self) -> Result<ContentParticle, String> {
        let mut items = vec![self.particle()?];
        let mut sep: Option<u8> = None;
        loop {
            match self.input.get(self.pos).copied() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b @ (b',' | b'|')) => {
                    if sep.is_some_and(|s| s != b) {
                        return Err("mixed ',' and '|' in one group".to_string());
                    }
                    sep = Some(b);
                    self.pos += 1;
                    items.push(self.particle()?);
                }
                _ => return Err("unterminated content model group".to_string()),
            }
        }
        Ok(match sep {
            Some(b'|') => ContentParticle::Choice(items, None),
            _ => ContentParticle::Seq(items, None),
        })
    }

    fn occurrence(&mut self) -> Option<Occurrence> {
        let o = match self.input.get(self.pos) {
            Some(b'?') => Occurrence::ZeroOrOne,
            Some(b'*') => Occurrence::ZeroOrMore,
            Some(b'+') => Occurrence::OneOrMore,
            _ => return None,
        };
        self.pos += 1;
        Some(o)
    }
}

/// Rebuilds a `ContentSpec` from content model channel events
#[derive(Debug, Default)]
pub struct ContentModelBuilder {
    element: Option<String>,
    stack: Vec<GroupFrame>,
    root: Option<ContentParticle>,
    pcdata: bool,
    fixed: Option<ContentSpec>,
}

#[derive(Debug, Default)]
struct GroupFrame {
    items: Vec<ContentParticle>,
    separator: Option<Separator>,
}

impl ContentModelBuilder {
    pub fn start(&mut self, element: &str) {
        *self = ContentModelBuilder {
            element: Some(element.to_string()),
            ..Self::default()
        };
    }

    pub fn element_name(&self) -> Option<&str> {
        self.element.as_deref()
    }

    pub fn any(&mut self) {
        self.fixed = Some(ContentSpec::Any);
    }

    pub fn empty(&mut self) {
        self.fixed = Some(ContentSpec::Empty);
    }

    pub fn start_group(&mut self) {
        self.stack.push(GroupFrame::default());
    }

    pub fn pcdata(&mut self) {
        self.pcdata = true;
    }

    pub fn element(&mut self, name: &str) {
        if let Some(top) = self.stack.last_mut() {
            top.items.push(ContentParticle::Name(name.to_string(), None));
        }
    }

    pub fn separator(&mut self, separator: Separator) {
        if let Some(top) = self.stack.last_mut() {
            top.separator = Some(separator);
        }
    }

    pub fn occurrence(&mut self, occurrence: Occurrence) {
        let target = match self.stack.last_mut() {
            Some(top) => top.items.last_mut(),
            None => self.root.as_mut(),
        };
        if let Some(particle) = target {
            *particle.occurrence_mut() = Some(occurrence);
        }
    }

    pub fn end_group(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let group = match frame.separator {
            Some(Separator::Choice) => ContentParticle::Choice(frame.items, None),
            _ => ContentParticle::Seq(frame.items, None),
        };
        match self.stack.last_mut() {
            Some(parent) => parent.items.push(group),
            None => self.root = Some(group),
        }
    }

    /// Finish the model; `None` if no structure was received
    pub fn finish(&mut self) -> Option<(String, ContentSpec)> {
        let element = self.element.take()?;
        let spec = if let Some(fixed) = self.fixed.take() {
            fixed
        } else if self.pcdata {
            let names = self
                .root
                .take()
                .map(|r| r.names().into_iter().map(str::to_string).collect())
                .unwrap_or_default();
            ContentSpec::Mixed(names)
        } else {
            ContentSpec::Children(self.root.take()?)
        };
        Some((element, spec))
    }
}

// ============================================================================
// Attribute declarations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

impl AttType {
    /// Parse a declared type as reported on the DTD channel
    pub fn parse(text: &str) -> Option<AttType> {
        let text = text.trim();
        let att_type = match text {
            "CDATA" => AttType::CData,
            "ID" => AttType::Id,
            "IDREF" => AttType::IdRef,
            "IDREFS" => AttType::IdRefs,
            "ENTITY" => AttType::Entity,
            "ENTITIES" => AttType::Entities,
            "NMTOKEN" => AttType::NmToken,
            "NMTOKENS" => AttType::NmTokens,
            _ => {
                if let Some(rest) = text.strip_prefix("NOTATION") {
                    AttType::Notation(parse_enumeration(rest)?)
                } else {
                    AttType::Enumeration(parse_enumeration(text)?)
                }
            }
        };
        Some(att_type)
    }

    /// Type name as reported on attributes
    pub fn name(&self) -> &'static str {
        match self {
            AttType::CData => "CDATA",
            AttType::Id => "ID",
            AttType::IdRef => "IDREF",
            AttType::IdRefs => "IDREFS",
            AttType::Entity => "ENTITY",
            AttType::Entities => "ENTITIES",
            AttType::NmToken | AttType::Enumeration(_) => "NMTOKEN",
            AttType::NmTokens => "NMTOKENS",
            AttType::Notation(_) => "NOTATION",
        }
    }

    pub fn is_cdata(&self) -> bool {
        matches!(self, AttType::CData)
    }
}

fn parse_enumeration(text: &str) -> Option<Vec<String>> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let values: Vec<String> = inner.split('|').map(|v| v.trim().to_string()).collect();
    if values.iter().any(|v| v.is_empty()) {
        return None;
    }
    Some(values)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttDefault {
    Required,
    Implied,
    Fixed(String),
    Default(String),
}

impl AttDefault {
    /// Build from the mode and default value of an attribute declaration
    pub fn from_decl(mode: Option<&str>, value: Option<&str>) -> Option<AttDefault> {
        match (mode, value) {
            (Some("#REQUIRED"), _) => Some(AttDefault::Required),
            (Some("#IMPLIED"), _) => Some(AttDefault::Implied),
            (Some("#FIXED"), Some(v)) => Some(AttDefault::Fixed(v.to_string())),
            (None, Some(v)) => Some(AttDefault::Default(v.to_string())),
            _ => None,
        }
    }

    /// Value supplied when the attribute is absent
    pub fn value(&self) -> Option<&str> {
        match self {
            AttDefault::Fixed(v) | AttDefault::Default(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttDef {
    pub name: String,
    pub att_type: AttType,
    pub default: AttDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationDecl {
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

// ============================================================================
// Grammar
// ============================================================================

/// Declarations of one document type
#[derive(Debug, Clone, Default)]
pub struct DtdGrammar {
    pub root: Option<String>,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    elements: HashMap<String, ContentSpec>,
    attlists: HashMap<String, Vec<AttDef>>,
    entities: HashMap<String, DeclaredEntity>,
    notations: HashMap<String, NotationDecl>,
}

impl DtdGrammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty grammar for the document type named by a DOCTYPE
    pub fn for_doctype(root: &str, public_id: Option<&str>, system_id: Option<&str>) -> Self {
        DtdGrammar {
            root: Some(root.to_string()),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
            && self.attlists.is_empty()
            && self.entities.is_empty()
            && self.notations.is_empty()
    }

    /// Add an element declaration
    pub fn add_element(&mut self, name: &str, spec: ContentSpec) -> Result<(), String> {
        if self.elements.contains_key(name) {
            return Err(format!("element type '{name}' declared more than once"));
        }
        self.elements.insert(name.to_string(), spec);
        Ok(())
    }

    /// Add an attribute definition; the first definition of a name wins
    pub fn add_attribute(&mut self, element: &str, def: AttDef) -> bool {
        let list = self.attlists.entry(element.to_string()).or_default();
        if list.iter().any(|d| d.name == def.name) {
            return false;
        }
        list.push(def);
        true
    }

    /// Add a general entity; the first declaration wins
    pub fn add_entity(&mut self, name: &str, decl: DeclaredEntity) -> bool {
        if self.entities.contains_key(name) {
            return false;
        }
        self.entities.insert(name.to_string(), decl);
        true
    }

    /// Add a notation declaration
    pub fn add_notation(&mut self, name: &str, decl: NotationDecl) -> Result<(), String> {
        if self.notations.contains_key(name) {
            return Err(format!("notation '{name}' declared more than once"));
        }
        self.notations.insert(name.to_string(), decl);
        Ok(())
    }

    pub fn element(&self, name: &str) -> Option<&ContentSpec> {
        self.elements.get(name)
    }

    pub fn attributes(&self, element: &str) -> &[AttDef] {
        self.attlists.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn attribute(&self, element: &str, name: &str) -> Option<&AttDef> {
        self.attributes(element).iter().find(|d| d.name == name)
    }

    pub fn entity(&self, name: &str) -> Option<&DeclaredEntity> {
        self.entities.get(name)
    }

    pub fn notation(&self, name: &str) -> Option<&NotationDecl> {
        self.notations.get(name)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Fill in declarations from `external` that this grammar lacks.
    /// Internal subset declarations take precedence.
    pub fn merge_external(&mut self, external: &DtdGrammar) {
        for (name, spec) in &external.elements {
            self.elements.entry(name.clone()).or_insert_with(|| spec.clone());
        }
        for (element, defs) in &external.attlists {
            for def in defs {
                self.add_attribute(element, def.clone());
            }
        }
        for (name, decl) in &external.entities {
            self.entities.entry(name.clone()).or_insert_with(|| decl.clone());
        }
        for (name, decl) in &external.notations {
            self.notations.entry(name.clone()).or_insert_with(|| decl.clone());
        }
    }

    /// Consistency checks that need the whole DTD
    pub fn validate(&self) -> Result<(), String> {
        self.check_entity_recursion()?;
        self.check_notation_references()?;
        self.check_single_id_per_element()?;
        Ok(())
    }

    /// Check for circular entity references
    fn check_entity_recursion(&self) -> Result<(), String> {
        for name in self.entities.keys() {
            let mut visited = HashSet::new();
            let mut stack = vec![name.as_str()];

            while let Some(current) = stack.pop() {
                if !visited.insert(current) {
                    if current == name.as_str() {
                        return Err(format!(
                            "entity '{name}' references itself (directly or indirectly)"
                        ));
                    }
                    continue;
                }
                if let Some(DeclaredEntity::Internal(value)) = self.entities.get(current) {
                    stack.extend(entity_references(value));
                }
            }
        }
        Ok(())
    }

    /// Check NOTATION attributes and unparsed entities reference declared notations
    fn check_notation_references(&self) -> Result<(), String> {
        for defs in self.attlists.values() {
            for def in defs {
                if let AttType::Notation(names) = &def.att_type {
                    if let Some(missing) = names.iter().find(|n| !self.notations.contains_key(*n)) {
                        return Err(format!(
                            "notation '{missing}' used in attribute '{}' but not declared",
                            def.name
                        ));
                    }
                }
            }
        }
        for (name, decl) in &self.entities {
            if let DeclaredEntity::Unparsed { notation, .. } = decl {
                if !self.notations.contains_key(notation) {
                    return Err(format!(
                        "unparsed entity '{name}' names undeclared notation '{notation}'"
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_single_id_per_element(&self) -> Result<(), String> {
        for (element, defs) in &self.attlists {
            let ids = defs.iter().filter(|d| d.att_type == AttType::Id).count();
            if ids > 1 {
                return Err(format!("element '{element}' has more than one ID attribute"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Grammar pool
// ============================================================================

/// Default number of grammars a pool keeps
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Shared, bounded cache of compiled grammars
///
/// Cloning the handle shares the cache. Grammars are stored behind `Rc`
/// and never mutated once pooled.
#[derive(Clone)]
pub struct GrammarPool {
    cache: Rc<RefCell<LruCache<String, Rc<DtdGrammar>>>>,
}

impl GrammarPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        GrammarPool {
            cache: Rc::new(RefCell::new(LruCache::new(capacity))),
        }
    }

    /// Store a grammar under `key` (a system id or public id)
    pub fn put(&self, key: impl Into<String>, grammar: DtdGrammar) -> Rc<DtdGrammar> {
        let grammar = Rc::new(grammar);
        self.cache.borrow_mut().put(key.into(), Rc::clone(&grammar));
        grammar
    }

    pub fn get(&self, key: &str) -> Option<Rc<DtdGrammar>> {
        self.cache.borrow_mut().get(key).cloned()
    }

    /// Find the grammar for a document type, by system id first
    pub fn lookup(&self, system_id: Option<&str>, public_id: Option<&str>) -> Option<Rc<DtdGrammar>> {
        system_id
            .and_then(|id| self.get(id))
            .or_else(|| public_id.and_then(|id| self.get(id)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.borrow().contains(key)
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache.borrow().cap().get()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn same_pool(&self, other: &GrammarPool) -> bool {
        Rc::ptr_eq(&self.cache, &other.cache)
    }
}

impl Default for GrammarPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GrammarPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarPool")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children(spec: &str) -> ContentParticle {
        match parse_content_spec(spec).unwrap() {
            ContentSpec::Children(p) => p,
            other => panic!("expected children, got {other:?}"),
        }
    }

    #[test]
    fn test_grammar_for_doctype() {
        let mut g = DtdGrammar::for_doctype("doc", None, Some("doc.dtd"));
        assert_eq!(g.root.as_deref(), Some("doc"));
        assert_eq!(g.public_id, None);
        assert_eq!(g.system_id.as_deref(), Some("doc.dtd"));
        assert!(g.is_empty());

        g.add_element("doc", ContentSpec::Empty).unwrap();
        assert!(!g.is_empty());
    }

    #[test]
    fn test_parse_empty_any() {
        assert_eq!(parse_content_spec("EMPTY").unwrap(), ContentSpec::Empty);
        assert_eq!(parse_content_spec(" ANY ").unwrap(), ContentSpec::Any);
        assert!(parse_content_spec("SOME").is_err());
    }

    #[test]
    fn test_parse_mixed() {
        assert_eq!(parse_content_spec("(#PCDATA)").unwrap(), ContentSpec::Mixed(vec![]));
        assert_eq!(
            parse_content_spec("( #PCDATA | b | i )*").unwrap(),
            ContentSpec::Mixed(vec!["b".to_string(), "i".to_string()])
        );
        assert!(parse_content_spec("(#PCDATA|b)").is_err());
    }

    #[test]
    fn test_parse_children_and_display() {
        let p = children("(head, (p | list)*, foot?)");
        assert_eq!(p.to_string(), "(head,(p|list)*,foot?)");
        assert!(parse_content_spec("(a,b|c)").is_err());
        assert!(parse_content_spec("(a,b").is_err());
    }

    #[test]
    fn test_matching_sequence() {
        let p = children("(a,b?,c+)");
        assert!(p.matches(&["a", "c"]));
        assert!(p.matches(&["a", "b", "c", "c"]));
        assert!(!p.matches(&["a", "b"]));
        assert!(!p.matches(&["b", "c"]));
        assert!(!p.matches(&[]));
    }

    #[test]
    fn test_matching_nested_repetition() {
        let p = children("((a|b)*,c)");
        assert!(p.matches(&["c"]));
        assert!(p.matches(&["a", "b", "b", "a", "c"]));
        assert!(!p.matches(&["a", "c", "c"]));

        let p = children("(a*)*");
        assert!(p.matches(&[]));
        assert!(p.matches(&["a", "a"]));
    }

    #[test]
    fn test_builder_rebuilds_model() {
        let mut b = ContentModelBuilder::default();
        b.start("doc");
        b.start_group();
        b.element("head");
        b.separator(Separator::Sequence);
        b.start_group();
        b.element("p");
        b.separator(Separator::Choice);
        b.element("list");
        b.end_group();
        b.occurrence(Occurrence::ZeroOrMore);
        b.end_group();
        b.occurrence(Occurrence::OneOrMore);
        let (name, spec) = b.finish().unwrap();
        assert_eq!(name, "doc");
        assert_eq!(spec.to_string(), "(head,(p|list)*)+");
    }

    #[test]
    fn test_builder_mixed() {
        let mut b = ContentModelBuilder::default();
        b.start("p");
        b.start_group();
        b.pcdata();
        b.separator(Separator::Choice);
        b.element("em");
        b.end_group();
        b.occurrence(Occurrence::ZeroOrMore);
        let (_, spec) = b.finish().unwrap();
        assert_eq!(spec, ContentSpec::Mixed(vec!["em".to_string()]));
    }

    #[test]
    fn test_att_type_parse() {
        assert_eq!(AttType::parse("ID"), Some(AttType::Id));
        assert_eq!(
            AttType::parse("NOTATION (gif | png)"),
            Some(AttType::Notation(vec!["gif".to_string(), "png".to_string()]))
        );
        assert_eq!(
            AttType::parse("(yes|no)"),
            Some(AttType::Enumeration(vec!["yes".to_string(), "no".to_string()]))
        );
        assert_eq!(AttType::parse("BOGUS"), None);
    }

    #[test]
    fn test_att_default() {
        assert_eq!(AttDefault::from_decl(Some("#REQUIRED"), None), Some(AttDefault::Required));
        assert_eq!(
            AttDefault::from_decl(Some("#FIXED"), Some("1")).unwrap().value(),
            Some("1")
        );
        assert_eq!(AttDefault::from_decl(None, None), None);
    }

    #[test]
    fn test_entity_recursion() {
        let mut g = DtdGrammar::new();
        g.add_entity("a", DeclaredEntity::Internal(Rc::from("&b;")));
        g.add_entity("b", DeclaredEntity::Internal(Rc::from("&a;")));
        assert!(g.validate().unwrap_err().contains("references itself"));

        let mut g = DtdGrammar::new();
        g.add_entity("a", DeclaredEntity::Internal(Rc::from("&b; &b;")));
        g.add_entity("b", DeclaredEntity::Internal(Rc::from("text")));
        assert!(g.validate().is_ok());
    }

    #[test]
    fn test_undeclared_notation() {
        let mut g = DtdGrammar::new();
        g.add_attribute(
            "img",
            AttDef {
                name: "kind".to_string(),
                att_type: AttType::Notation(vec!["gif".to_string()]),
                default: AttDefault::Implied,
            },
        );
        assert!(g.validate().is_err());
        g.add_notation("gif", NotationDecl { public_id: None, system_id: Some("gif".into()) })
            .unwrap();
        assert!(g.validate().is_ok());
    }

    #[test]
    fn test_duplicate_declarations() {
        let mut g = DtdGrammar::new();
        g.add_element("a", ContentSpec::Empty).unwrap();
        assert!(g.add_element("a", ContentSpec::Any).is_err());

        let def = AttDef {
            name: "x".to_string(),
            att_type: AttType::CData,
            default: AttDefault::Default("1".to_string()),
        };
        assert!(g.add_attribute("a", def.clone()));
        assert!(!g.add_attribute("a", AttDef { default: AttDefault::Implied, ..def }));
        assert_eq!(g.attribute("a", "x").unwrap().default.value(), Some("1"));
    }

    #[test]
    fn test_merge_external_keeps_internal() {
        let mut internal = DtdGrammar::new();
        internal.add_entity("e", DeclaredEntity::Internal(Rc::from("inner")));
        let mut external = DtdGrammar::new();
        external.add_entity("e", DeclaredEntity::Internal(Rc::from("outer")));
        external.add_element("doc", ContentSpec::Any).unwrap();

        internal.merge_external(&external);
        assert_eq!(internal.entity("e"), Some(&DeclaredEntity::Internal(Rc::from("inner"))));
        assert_eq!(internal.element("doc"), Some(&ContentSpec::Any));
    }

    #[test]
    fn test_pool_lookup_and_eviction() {
        let pool = GrammarPool::with_capacity(2);
        pool.put("a.dtd", DtdGrammar::new());
        pool.put("-//B//EN", DtdGrammar::new());
        assert!(pool.lookup(Some("missing.dtd"), Some("-//B//EN")).is_some());
        assert!(pool.lookup(Some("a.dtd"), None).is_some());

        // "-//B//EN" is now least recently used
        pool.put("c.dtd", DtdGrammar::new());
        assert!(!pool.contains("-//B//EN"));
        assert!(pool.contains("a.dtd"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pool_handle_shared() {
        let pool = GrammarPool::new();
        let other = pool.clone();
        other.put("x", DtdGrammar::new());
        assert!(pool.contains("x"));
        assert!(pool.same_pool(&other));
        assert_eq!(pool.capacity(), DEFAULT_POOL_CAPACITY);
    }
}
