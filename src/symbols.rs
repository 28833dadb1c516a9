//! Symbols and the whole-program symbol table.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Error, Result};
use crate::source::Span;
use crate::syntax::{DeclKind, NodeKind, SyntaxNode};

/// Separator between the segments of a fully-qualified name.
pub const SEPARATOR: &str = ".";

/// Unique identity of a symbol within one compilation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub usize);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Classification used for matching.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Property or indexer.
    Property,
    /// Method, constructor, destructor or operator.
    Method,
    /// Field or enum member.
    Field,
    /// Anything else: namespaces, types, parameters, locals, events, delegates.
    Other,
}

impl SymbolKind {
    /// Is this a member kind which can be matched?
    pub fn is_member(&self) -> bool {
        !matches!(self, SymbolKind::Other)
    }
}

impl From<DeclKind> for SymbolKind {
    fn from(kind: DeclKind) -> SymbolKind {
        match kind {
            DeclKind::Property => SymbolKind::Property,
            DeclKind::Method => SymbolKind::Method,
            DeclKind::Field | DeclKind::EnumMember => SymbolKind::Field,
            DeclKind::Namespace
            | DeclKind::Type
            | DeclKind::Parameter
            | DeclKind::Local
            | DeclKind::Event
            | DeclKind::Delegate => SymbolKind::Other,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolKind::Property => "property",
            SymbolKind::Method => "method",
            SymbolKind::Field => "field",
            SymbolKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Non-owning reference to a declaring node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Index of the file in the compilation.
    pub file: usize,
    /// Header span of the declaration node.
    pub header: Span,
}

/// A resolved, named program entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    /// Identity of the symbol.
    pub id: SymbolId,
    /// Classification used for matching.
    pub kind: SymbolKind,
    /// Finer classification of the declaration.
    pub decl: DeclKind,
    /// Fully-qualified display name.
    pub name: String,
    /// Declared type as written, or return type for methods.
    pub ty: Option<String>,
    /// Parameter count of methods.
    pub arity: Option<usize>,
    /// Base types as written, for types.
    pub bases: Vec<String>,
    /// The declaring node.
    pub declaration: NodeRef,
}

impl Symbol {
    /// Scope segments enclosing this symbol's declaration.
    pub fn container(&self) -> Vec<String> {
        let mut segments = split(&self.name);
        segments.pop();
        segments
    }

    /// Is this a type or namespace, i.e. something with members?
    pub fn is_container(&self) -> bool {
        matches!(self.decl, DeclKind::Type | DeclKind::Namespace)
    }

    /// Is this a constructor, i.e. a method named after its type?
    pub fn is_constructor(&self) -> bool {
        if self.decl != DeclKind::Method {
            return false;
        }
        match split(&self.name).as_slice() {
            [.., ty, name] => ty == name && self.ty.as_ref() == Some(name),
            _ => false,
        }
    }
}

/// Join `scope` and `name` into a fully-qualified name.
pub fn qualify<S: AsRef<str>>(scope: &[S], name: &str) -> String {
    scope
        .iter()
        .map(|s| s.as_ref())
        .chain(std::iter::once(name))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Split a fully-qualified name into scope segments.
pub fn split(name: &str) -> Vec<String> {
    name.split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mapping from fully-qualified name to every symbol declared under that name.
///
/// Built once per compilation and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<SymbolId, Symbol>,
    by_name: HashMap<String, Vec<SymbolId>>,
    by_node: HashMap<NodeRef, Vec<SymbolId>>,
}

impl SymbolTable {
    /// Create a new empty symbol table.
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Record a symbol. Fails if its identity is already taken.
    pub fn insert(&mut self, symbol: Symbol) -> Result<()> {
        if self.symbols.contains_key(&symbol.id) {
            return Err(Error::DuplicateIdentity {
                id: symbol.id,
                name: symbol.name,
            });
        }
        self.by_name
            .entry(symbol.name.clone())
            .or_default()
            .push(symbol.id);
        self.by_node
            .entry(symbol.declaration)
            .or_default()
            .push(symbol.id);
        self.symbols.insert(symbol.id, symbol);
        Ok(())
    }

    /// Look up a symbol by identity.
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// All symbols declared under the fully-qualified `name`, in declaration order.
    pub fn lookup(&self, name: &str) -> impl Iterator<Item = &Symbol> + '_ {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.symbols.get(id))
    }

    /// Symbols declared by the node at `node`. Several only for dotted namespaces.
    pub fn declared_at(&self, node: NodeRef) -> impl Iterator<Item = &Symbol> + '_ {
        self.by_node
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.symbols.get(id))
    }

    /// All symbols, in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.values()
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Build the table from every tree of a compilation, in file order.
    pub fn build(trees: &[SyntaxNode]) -> Result<SymbolTable> {
        let mut builder = Builder {
            table: SymbolTable::new(),
            next: 0,
            scope: Vec::new(),
        };
        for (file, tree) in trees.iter().enumerate() {
            builder.visit(file, tree)?;
        }
        debug!("Recorded {} symbols", builder.table.len());
        Ok(builder.table)
    }
}

struct Builder {
    table: SymbolTable,
    next: usize,
    scope: Vec<String>,
}

impl Builder {
    fn record(&mut self, file: usize, node: &SyntaxNode, name: String) -> Result<()> {
        let decl = match &node.kind {
            NodeKind::Declaration(decl) => decl,
            _ => return Ok(()),
        };
        let id = SymbolId(self.next);
        self.next += 1;
        self.table.insert(Symbol {
            id,
            kind: decl.kind.into(),
            decl: decl.kind,
            name,
            ty: decl.ty.clone(),
            arity: decl.arity,
            bases: decl.bases.clone(),
            declaration: NodeRef {
                file,
                header: decl.header,
            },
        })
    }

    fn visit(&mut self, file: usize, node: &SyntaxNode) -> Result<()> {
        let pushed = match node.declaration() {
            Some(decl) if decl.kind == DeclKind::Namespace => {
                // `namespace A.B` declares both `A` and `A.B`.
                let segments = split(&decl.name);
                for segment in &segments {
                    let name = qualify(&self.scope, segment);
                    self.record(file, node, name)?;
                    self.scope.push(segment.clone());
                }
                segments.len()
            }
            Some(decl) => {
                let name = qualify(&self.scope, &decl.name);
                self.record(file, node, name)?;
                if decl.kind.is_scope() {
                    self.scope.push(decl.name.clone());
                    1
                } else {
                    0
                }
            }
            None => 0,
        };
        for child in &node.children {
            self.visit(file, child)?;
        }
        self.scope.truncate(self.scope.len() - pushed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::source::SourceFile;

    fn table(sources: &[&str]) -> SymbolTable {
        let trees: Vec<_> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| parse(&SourceFile::new(format!("{}.cs", i), *s)).unwrap())
            .collect();
        SymbolTable::build(&trees).unwrap()
    }

    fn names(table: &SymbolTable) -> Vec<(SymbolKind, &str)> {
        table.iter().map(|s| (s.kind, s.name.as_str())).collect()
    }

    #[test]
    fn empty_file() {
        assert!(table(&[""]).is_empty());
    }

    #[test]
    fn qualified_names() {
        let table = table(&["namespace A.B { class Foo { int Bar; void Baz(int x) { var y = x; } } }"]);
        assert_eq!(
            names(&table),
            vec![
                (SymbolKind::Other, "A"),
                (SymbolKind::Other, "A.B"),
                (SymbolKind::Other, "A.B.Foo"),
                (SymbolKind::Field, "A.B.Foo.Bar"),
                (SymbolKind::Method, "A.B.Foo.Baz"),
                (SymbolKind::Other, "A.B.Foo.Baz.x"),
                (SymbolKind::Other, "A.B.Foo.Baz.y"),
            ]
        );
    }

    #[test]
    fn overloads_are_distinct() {
        let table = table(&["class Foo { void Baz() {} void Baz(int x) {} }"]);
        let overloads: Vec<_> = table.lookup("Foo.Baz").collect();
        assert_eq!(overloads.len(), 2);
        assert_ne!(overloads[0].id, overloads[1].id);
        assert_eq!(overloads[0].arity, Some(0));
        assert_eq!(overloads[1].arity, Some(1));
    }

    #[test]
    fn symbols_span_files() {
        let table = table(&["class Foo { int A; }", "class Bar { int B; }"]);
        let b = table.lookup("Bar.B").next().unwrap();
        assert_eq!(b.declaration.file, 1);
        assert_eq!(b.container(), vec!["Bar".to_string()]);
        assert_eq!(table.lookup("Foo.A").next().unwrap().declaration.file, 0);
        assert_eq!(table.declared_at(b.declaration).next(), Some(b));
    }

    #[test]
    fn dotted_namespaces_share_their_node() {
        let table = table(&["namespace A.B { }"]);
        let a = table.lookup("A").next().unwrap();
        let names: Vec<_> = table.declared_at(a.declaration).map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A.B"]);
    }

    #[test]
    fn constructors() {
        let table = table(&["class Foo { Foo() {} Foo Make() => null; }"]);
        let ctors: Vec<_> = table.iter().map(|s| s.is_constructor()).collect();
        assert_eq!(ctors, vec![false, true, false]);
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut table = SymbolTable::new();
        let symbol = Symbol {
            id: SymbolId(0),
            kind: SymbolKind::Field,
            decl: DeclKind::Field,
            name: "Foo.Bar".to_string(),
            ty: None,
            arity: None,
            bases: Vec::new(),
            declaration: NodeRef {
                file: 0,
                header: Span::new(0, 1),
            },
        };
        table.insert(symbol.clone()).unwrap();
        let err = table.insert(symbol).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity { id: SymbolId(0), .. }));
    }

    #[test]
    fn qualify_and_split() {
        assert_eq!(qualify(&["A", "B"], "C"), "A.B.C");
        assert_eq!(qualify::<&str>(&[], "C"), "C");
        assert_eq!(split("A.B.C"), vec!["A", "B", "C"]);
    }

    #[test]
    fn kinds() {
        assert_eq!(SymbolKind::from(DeclKind::EnumMember), SymbolKind::Field);
        assert_eq!(SymbolKind::from(DeclKind::Local), SymbolKind::Other);
        assert!(SymbolKind::Property.is_member());
        assert!(!SymbolKind::Other.is_member());
    }
}
