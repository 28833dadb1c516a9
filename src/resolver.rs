//! Binding references to the symbols they denote.
//!
//! Runs after the symbol table is complete. Each tree is resolved
//! independently; only the `resolved` field of its own reference nodes is
//! written.

use log::trace;
use std::collections::BTreeMap;

use crate::symbols::{qualify, split, Symbol, SymbolTable, SEPARATOR};
use crate::syntax::{DeclKind, NodeKind, Receiver, Reference, SyntaxNode};

/// How deep inheritance chains are followed. Bounds cycles in malformed base lists.
const MAX_BASE_DEPTH: usize = 16;

/// Resolve every reference in `tree` against `table`. Returns the number of
/// references which were bound to a symbol.
pub fn resolve(table: &SymbolTable, tree: &mut SyntaxNode) -> usize {
    Resolver::new(table).resolve(tree)
}

/// Name resolution state for one tree.
pub struct Resolver<'a> {
    table: &'a SymbolTable,
    scope: Vec<String>,
    usings: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver reading from `table`.
    pub fn new(table: &'a SymbolTable) -> Resolver<'a> {
        Resolver {
            table,
            scope: Vec::new(),
            usings: Vec::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// Resolve the references of one file's tree in place.
    pub fn resolve(&mut self, tree: &mut SyntaxNode) -> usize {
        self.scope.clear();
        self.usings.clear();
        self.aliases.clear();
        for node in tree.descendants() {
            if let NodeKind::Using { path, alias } = &node.kind {
                match alias {
                    Some(alias) => {
                        self.aliases.insert(alias.clone(), path.clone());
                    }
                    None => self.usings.push(path.clone()),
                }
            }
        }
        self.visit(tree)
    }

    fn visit(&mut self, node: &mut SyntaxNode) -> usize {
        let pushed = match &node.kind {
            NodeKind::Declaration(decl) if decl.kind == DeclKind::Namespace => {
                let segments = split(&decl.name);
                let count = segments.len();
                self.scope.extend(segments);
                count
            }
            NodeKind::Declaration(decl) if decl.kind.is_scope() => {
                self.scope.push(decl.name.clone());
                1
            }
            _ => 0,
        };

        // Receivers are children, so they are bound before the access using them.
        let mut resolved = 0;
        for child in node.children.iter_mut() {
            resolved += self.visit(child);
        }

        let target = match &node.kind {
            NodeKind::Reference(reference) => Some(self.bind(reference, node.children.first())),
            _ => None,
        };
        if let (Some(target), NodeKind::Reference(reference)) = (target, &mut node.kind) {
            trace!(
                "{} -> {}",
                reference.name,
                target.map_or("<unresolved>", |s| s.name.as_str())
            );
            reference.resolved = target.map(|s| s.id);
            resolved += usize::from(target.is_some());
        }

        self.scope.truncate(self.scope.len() - pushed);
        resolved
    }

    fn bind(&self, reference: &Reference, receiver: Option<&SyntaxNode>) -> Option<&'a Symbol> {
        let name = reference.name.as_str();
        let call = reference.call;
        match reference.receiver {
            Receiver::None => self.lookup_simple(name, call),
            Receiver::This => self
                .enclosing_type()
                .and_then(|ty| self.member(ty, name, call, 0)),
            Receiver::Base => {
                let ty = self.enclosing_type()?;
                let base = self.bases(ty).into_iter().next()?;
                self.member(base, name, call, 0)
            }
            Receiver::Expr => {
                let container = self.receiver_container(receiver?)?;
                self.member(container, name, call, 0)
            }
        }
    }

    /// Walk the enclosing scopes outwards, then the imported namespaces.
    fn lookup_simple(&self, name: &str, call: Option<usize>) -> Option<&'a Symbol> {
        for depth in (0..=self.scope.len()).rev() {
            let level = &self.scope[..depth];
            let found = match self.type_at(level) {
                Some(ty) => self.member(ty, name, call, 0),
                None => self.pick(&qualify(level, name), call),
            };
            if found.is_some() {
                return found;
            }
        }
        for using in &self.usings {
            let found = match self.table.lookup(using).find(|s| s.decl == DeclKind::Type) {
                Some(ty) => self.member(ty, name, call, 0),
                None => self.pick(&qualify(&[using], name), call),
            };
            if found.is_some() {
                return found;
            }
        }
        let target = self.aliases.get(name)?;
        self.table.lookup(target).next()
    }

    /// A type declared under exactly the scope `level`.
    fn type_at(&self, level: &[String]) -> Option<&'a Symbol> {
        if level.is_empty() {
            return None;
        }
        self.table
            .lookup(&level.join(SEPARATOR))
            .find(|s| s.decl == DeclKind::Type)
    }

    /// Innermost type enclosing the current position.
    fn enclosing_type(&self) -> Option<&'a Symbol> {
        (1..=self.scope.len())
            .rev()
            .find_map(|depth| self.type_at(&self.scope[..depth]))
    }

    /// Member `name` of `container`, including inherited members.
    fn member(
        &self,
        container: &'a Symbol,
        name: &str,
        call: Option<usize>,
        depth: usize,
    ) -> Option<&'a Symbol> {
        let found = self.pick(&qualify(&[&container.name], name), call);
        if found.is_some() || depth >= MAX_BASE_DEPTH || container.decl != DeclKind::Type {
            return found;
        }
        self.bases(container)
            .into_iter()
            .find_map(|base| self.member(base, name, call, depth + 1))
    }

    /// Resolvable base types of every declaration of `ty`.
    fn bases(&self, ty: &Symbol) -> Vec<&'a Symbol> {
        self.table
            .lookup(&ty.name)
            .filter(|s| s.decl == DeclKind::Type)
            .flat_map(|s| {
                let context = s.container();
                s.bases
                    .iter()
                    .filter_map(move |base| self.resolve_type(base, &context))
                    .collect::<Vec<_>>()
            })
            .filter(|base| base.name != ty.name)
            .collect()
    }

    /// The type or namespace whose members an access on `receiver` searches.
    fn receiver_container(&self, receiver: &SyntaxNode) -> Option<&'a Symbol> {
        match &receiver.kind {
            NodeKind::Reference(reference) => {
                let symbol = self.table.get(reference.resolved?)?;
                if symbol.is_container() {
                    Some(symbol)
                } else {
                    self.resolve_type(symbol.ty.as_deref()?, &symbol.container())
                }
            }
            NodeKind::New(Some(ty)) => self.resolve_type(ty, &self.scope),
            _ => None,
        }
    }

    /// The type or namespace named by `text`, seen from scope `context`.
    fn resolve_type(&self, text: &str, context: &[String]) -> Option<&'a Symbol> {
        let name = text.split(['<', '[', '?', '*']).next().unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        let name = self.expand_alias(name);
        (0..=context.len())
            .rev()
            .map(|depth| qualify(&context[..depth], &name))
            .chain(self.usings.iter().map(|using| qualify(&[using], &name)))
            .find_map(|key| self.table.lookup(&key).find(|s| s.is_container()))
    }

    fn expand_alias(&self, name: &str) -> String {
        let (first, rest) = match name.split_once(SEPARATOR) {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        match (self.aliases.get(first), rest) {
            (Some(target), Some(rest)) => format!("{}{}{}", target, SEPARATOR, rest),
            (Some(target), None) => target.clone(),
            (None, _) => name.to_string(),
        }
    }

    /// Choose among the symbols named `key`: an invoked reference prefers a
    /// method of matching arity. Constructors are never bound by name.
    fn pick(&self, key: &str, call: Option<usize>) -> Option<&'a Symbol> {
        let candidates: Vec<&'a Symbol> = self
            .table
            .lookup(key)
            .filter(|s| !s.is_constructor())
            .collect();
        call.and_then(|arity| {
            candidates
                .iter()
                .find(|s| s.decl == DeclKind::Method && s.arity == Some(arity))
        })
        .or(candidates.first())
        .copied()
    }
}
