//! Syntax tree produced by the parser.

use crate::source::Span;
use crate::symbols::SymbolId;

/// What a declaration declares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    /// `namespace A.B`
    Namespace,
    /// class, struct, interface, record or enum.
    Type,
    /// Field, including constants.
    Field,
    /// Member of an enum.
    EnumMember,
    /// Property or indexer.
    Property,
    /// Method, constructor, destructor or operator.
    Method,
    /// Method, delegate or indexer parameter.
    Parameter,
    /// Local variable.
    Local,
    /// Event.
    Event,
    /// Delegate type.
    Delegate,
}

impl DeclKind {
    /// Does a declaration of this kind open a named scope for its children?
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            DeclKind::Namespace
                | DeclKind::Type
                | DeclKind::Property
                | DeclKind::Method
                | DeclKind::Event
                | DeclKind::Delegate
        )
    }
}

/// A declaration of a named entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// What is declared.
    pub kind: DeclKind,
    /// Declared name. Dotted for namespaces.
    pub name: String,
    /// Declared type as written, or return type for methods.
    pub ty: Option<String>,
    /// Parameter count of methods.
    pub arity: Option<usize>,
    /// Base types as written, for type declarations.
    pub bases: Vec<String>,
    /// Modifiers, type, name and parameter list; no bodies or initializers.
    pub header: Span,
}

/// What a member access is applied to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Receiver {
    /// A bare name.
    None,
    /// `this.Name`
    This,
    /// `base.Name`
    Base,
    /// `expr.Name`, where `expr` is the first child of the reference.
    Expr,
}

/// A name used in an expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Referenced simple name.
    pub name: String,
    /// Access this name is part of.
    pub receiver: Receiver,
    /// Argument count, when the reference is invoked.
    pub call: Option<usize>,
    /// Symbol this reference binds to, filled in by the resolver.
    pub resolved: Option<SymbolId>,
}

/// Tagged node content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of a file.
    CompilationUnit,
    /// `using A.B;` or `using X = A.B;`
    Using {
        /// Imported namespace or type.
        path: String,
        /// Alias name, for the alias form.
        alias: Option<String>,
    },
    /// Declaration of a named entity.
    Declaration(Declaration),
    /// Use of a name.
    Reference(Reference),
    /// Object creation, with the created type if it is written out.
    New(Option<String>),
    /// Literal value.
    Literal,
    /// Brace-delimited block.
    Block,
    /// Paren- or bracket-delimited group.
    Group,
}

/// A node of the syntax tree. Children are owned exclusively by their parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxNode {
    /// Content of this node.
    pub kind: NodeKind,
    /// Location of the whole node.
    pub span: Span,
    /// Child nodes, in source order.
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// Create a node without children.
    pub fn leaf(kind: NodeKind, span: Span) -> SyntaxNode {
        SyntaxNode {
            kind,
            span,
            children: Vec::new(),
        }
    }

    /// The declaration carried by this node, if any.
    pub fn declaration(&self) -> Option<&Declaration> {
        match &self.kind {
            NodeKind::Declaration(decl) => Some(decl),
            _ => None,
        }
    }

    /// The reference carried by this node, if any.
    pub fn reference(&self) -> Option<&Reference> {
        match &self.kind {
            NodeKind::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Span of the text reported for this node.
    pub fn report_span(&self) -> Span {
        match &self.kind {
            NodeKind::Declaration(decl) => decl.header,
            _ => self.span,
        }
    }

    /// All nodes below this one, in depth-first pre-order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Find the declaration node whose header is `header`.
    pub fn find_declaration(&self, header: Span) -> Option<&SyntaxNode> {
        if matches!(&self.kind, NodeKind::Declaration(d) if d.header == header) {
            return Some(self);
        }
        self.children
            .iter()
            .filter(|c| c.span.contains(&header))
            .find_map(|c| c.find_declaration(header))
    }
}

/// Iterator returned by [`SyntaxNode::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a SyntaxNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a SyntaxNode;

    fn next(&mut self) -> Option<&'a SyntaxNode> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
