//! Recursive-descent parser from tokens to a [`SyntaxNode`] tree.
//!
//! Declarations are parsed exactly; member bodies are parsed loosely into
//! blocks, groups, literals, object creations, local declarations and
//! member-access chains, which is all the resolver needs.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::error::ParseError;
use crate::lexer::{is_builtin_type, is_keyword, tokenize, Token, TokenType};
use crate::source::{SourceFile, Span};
use crate::syntax::{DeclKind, Declaration, NodeKind, Receiver, Reference, SyntaxNode};

lazy_static! {
    static ref MODIFIERS: HashSet<&'static str> = [
        "public", "private", "protected", "internal", "static", "readonly", "const", "sealed",
        "abstract", "virtual", "override", "extern", "unsafe", "volatile", "new", "partial",
        "async", "required", "file", "ref", "fixed",
    ]
    .into_iter()
    .collect();

    /// Contextual words which start or continue expressions, never name a type.
    static ref EXPRESSION_WORDS: HashSet<&'static str> = [
        "await", "yield", "nameof", "when", "and", "or", "not", "with", "from", "select",
        "where", "let", "orderby", "join", "on", "equals", "into", "group", "by",
        "ascending", "descending",
    ]
    .into_iter()
    .collect();
}

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "interface", "enum", "record"];

/// Words continuing a statement after a block.
const STATEMENT_CONTINUATIONS: &[&str] = &["else", "catch", "finally", "while"];

/// Parse `file` into a syntax tree.
///
/// ```
/// use surface_area::parser::parse;
/// use surface_area::source::SourceFile;
///
/// let file = SourceFile::new("Foo.cs", "class Foo { int Bar; }");
/// let tree = parse(&file).unwrap();
/// assert_eq!(tree.descendants().count(), 2);
/// ```
pub fn parse(file: &SourceFile) -> Result<SyntaxNode, ParseError> {
    let tokens = tokenize(file)?;
    let mut parser = Parser {
        file,
        tokens: &tokens,
        pos: 0,
    };
    let children = parser.parse_items(false, true)?;
    Ok(SyntaxNode {
        kind: NodeKind::CompilationUnit,
        span: Span::new(0, file.text().len()),
        children,
    })
}

struct Parser<'a> {
    file: &'a SourceFile,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn at_symbol(&self, s: &str) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(s))
    }

    fn at_word(&self, s: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(s))
    }

    fn eat_symbol(&mut self, s: &str) -> bool {
        if self.at_symbol(s) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, s: &str) -> bool {
        if self.at_word(s) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Start of the next token, or end of file.
    fn here(&self) -> usize {
        self.peek()
            .map(|t| t.span.lo)
            .unwrap_or(self.file.text().len())
    }

    /// End of the previous token.
    fn last_hi(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.hi)
            .unwrap_or(0)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(self.file, self.here(), message)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(t) => self.error(format!(
                "expected {}, found '{}'",
                expected,
                self.file.text_of(t.span)
            )),
            None => self.error(format!("expected {}, found end of file", expected)),
        }
    }

    fn expect_symbol(&mut self, s: &str) -> Result<&'a Token, ParseError> {
        match self.peek() {
            Some(t) if t.is_symbol(s) => {
                self.pos += 1;
                Ok(t)
            }
            _ => Err(self.unexpected(&format!("'{}'", s))),
        }
    }

    fn expect_name(&mut self) -> Result<(String, Span), ParseError> {
        match self.peek().and_then(|t| t.name().map(|n| (n, t.span))) {
            Some((name, span)) => {
                self.pos += 1;
                Ok((name.to_string(), span))
            }
            None => Err(self.unexpected("identifier")),
        }
    }

    /// Skip a balanced `open`..`close` token run, starting at `open`.
    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<(), ParseError> {
        let start = self.here();
        self.expect_symbol(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next() {
                Some(t) if t.is_symbol(open) => depth += 1,
                Some(t) if t.is_symbol(close) => depth -= 1,
                Some(_) => {}
                None => {
                    return Err(ParseError::at(
                        self.file,
                        start,
                        format!("unclosed '{}'", open),
                    ))
                }
            }
        }
        Ok(())
    }

    fn skip_attributes(&mut self) -> Result<(), ParseError> {
        while self.at_symbol("[") {
            self.skip_balanced("[", "]")?;
        }
        Ok(())
    }

    fn skip_modifiers(&mut self) {
        while self
            .peek()
            .and_then(|t| t.word())
            .is_some_and(|w| MODIFIERS.contains(w))
        {
            self.pos += 1;
        }
    }

    /// Namespace-level items until end of file, or until `}` if `closing`.
    /// Top-level statements are allowed if `statements`, each becoming a block.
    fn parse_items(
        &mut self,
        closing: bool,
        statements: bool,
    ) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut items = Vec::new();
        loop {
            let token = match self.peek() {
                Some(t) => t,
                None if closing => return Err(self.unexpected("'}'")),
                None => break,
            };
            if token.is_symbol("}") {
                if closing {
                    break;
                }
                return Err(self.error("unexpected '}'"));
            }
            if token.is_symbol(";") {
                self.pos += 1;
            } else if token.is_symbol("[") {
                // Assembly and module attributes.
                self.skip_attributes()?;
            } else if (token.is_word("using") && !self.at_using_statement())
                || (token.is_word("global") && self.peek_at(1).is_some_and(|t| t.is_word("using")))
            {
                items.push(self.parse_using()?);
            } else if token.is_word("namespace") {
                items.push(self.parse_namespace()?);
            } else if token.is_word("extern")
                && self.peek_at(1).is_some_and(|t| t.is_word("alias"))
            {
                while !self.eat_symbol(";") {
                    if self.next().is_none() {
                        return Err(self.unexpected("';'"));
                    }
                }
            } else if statements && !self.at_type_declaration() {
                let start = self.here();
                let children = self.parse_statement()?;
                items.push(SyntaxNode {
                    kind: NodeKind::Block,
                    span: Span::new(start, self.last_hi()),
                    children,
                });
            } else {
                items.extend(self.parse_member(None)?);
            }
        }
        Ok(items)
    }

    /// `using (...)` or `using var`, as opposed to a directive.
    fn at_using_statement(&self) -> bool {
        self.peek_at(1)
            .is_some_and(|t| t.is_symbol("(") || t.is_word("var"))
    }

    /// Does a type or delegate declaration start here?
    fn at_type_declaration(&mut self) -> bool {
        let save = self.pos;
        let found = self.skip_attributes().is_ok() && {
            self.skip_modifiers();
            match self.peek().and_then(|t| t.word()) {
                Some("record") => self.peek_at(1).is_some_and(|t| {
                    t.name().is_some() || t.is_word("class") || t.is_word("struct")
                }),
                Some(word) => TYPE_KEYWORDS.contains(&word) || word == "delegate",
                None => false,
            }
        };
        self.pos = save;
        found
    }

    /// A top-level statement: terms up to `;`, or up to a block which no
    /// `else`, `catch`, `finally` or `while` continues.
    fn parse_statement(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut terms = Vec::new();
        loop {
            let token = self.peek().ok_or_else(|| self.unexpected("';'"))?;
            if token.is_symbol(";") {
                self.pos += 1;
                return Ok(terms);
            }
            if token.is_symbol("{") {
                terms.push(self.parse_block()?);
                if !STATEMENT_CONTINUATIONS.iter().any(|w| self.at_word(w)) {
                    return Ok(terms);
                }
                continue;
            }
            self.parse_term(token, &mut terms)?;
        }
    }

    fn parse_using(&mut self) -> Result<SyntaxNode, ParseError> {
        let start = self.here();
        self.eat_word("global");
        self.eat_word("using");
        self.eat_word("static");
        let alias = match (self.peek(), self.peek_at(1)) {
            (Some(name), Some(eq)) if name.name().is_some() && eq.is_symbol("=") => {
                self.pos += 2;
                name.name().map(str::to_string)
            }
            _ => None,
        };
        let path = self.parse_qualified_name()?;
        self.expect_symbol(";")?;
        Ok(SyntaxNode::leaf(
            NodeKind::Using { path, alias },
            Span::new(start, self.last_hi()),
        ))
    }

    /// `A.B.C`, with any generic arguments dropped.
    fn parse_qualified_name(&mut self) -> Result<String, ParseError> {
        if self.at_word("global") && self.peek_at(1).is_some_and(|t| t.is_symbol("::")) {
            self.pos += 2;
        }
        let (mut name, _) = self.expect_name()?;
        loop {
            if self.at_symbol("<") {
                self.skip_balanced("<", ">")?;
            }
            if self.at_symbol(".") && self.peek_at(1).is_some_and(|t| t.name().is_some()) {
                self.pos += 1;
                let (segment, _) = self.expect_name()?;
                name.push('.');
                name.push_str(&segment);
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn parse_namespace(&mut self) -> Result<SyntaxNode, ParseError> {
        let start = self.here();
        self.eat_word("namespace");
        let name = self.parse_qualified_name()?;
        let header = Span::new(start, self.last_hi());
        let children = if self.eat_symbol(";") {
            self.parse_items(false, false)?
        } else {
            self.expect_symbol("{")?;
            let children = self.parse_items(true, false)?;
            self.expect_symbol("}")?;
            children
        };
        Ok(SyntaxNode {
            kind: NodeKind::Declaration(Declaration {
                kind: DeclKind::Namespace,
                name,
                ty: None,
                arity: None,
                bases: Vec::new(),
                header,
            }),
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    /// A member of a type, or a type at namespace level. Field declarations with
    /// several declarators produce several nodes.
    fn parse_member(&mut self, type_name: Option<&str>) -> Result<Vec<SyntaxNode>, ParseError> {
        self.skip_attributes()?;
        let start = self.here();
        self.skip_modifiers();

        let token = self.peek().ok_or_else(|| self.unexpected("declaration"))?;
        if let Some(word) = token.word() {
            let is_record = word == "record"
                && self
                    .peek_at(1)
                    .is_some_and(|t| t.name().is_some() || t.is_word("class") || t.is_word("struct"));
            if (TYPE_KEYWORDS.contains(&word) && word != "record") || is_record {
                return Ok(vec![self.parse_type_declaration(start)?]);
            }
            if word == "delegate" {
                return Ok(vec![self.parse_delegate(start)?]);
            }
            if word == "event" {
                return self.parse_event(start);
            }
            if word == "implicit" || word == "explicit" {
                self.pos += 1;
                if !self.eat_word("operator") {
                    return Err(self.unexpected("'operator'"));
                }
                let ty = self.parse_type()?;
                return Ok(vec![self.parse_method(
                    start,
                    format!("operator {}", ty),
                    Some(ty),
                )?]);
            }
            if Some(word) == type_name && self.peek_at(1).is_some_and(|t| t.is_symbol("(")) {
                self.pos += 1;
                return Ok(vec![self.parse_method(
                    start,
                    word.to_string(),
                    Some(word.to_string()),
                )?]);
            }
        }
        if self.eat_symbol("~") {
            let (name, _) = self.expect_name()?;
            return Ok(vec![self.parse_method(start, format!("~{}", name), None)?]);
        }

        let ty = self.parse_type()?;
        if self.eat_word("operator") {
            let mut op = String::new();
            while let Some(t) = self.peek() {
                if t.is_symbol("(") {
                    break;
                }
                op.push_str(self.file.text_of(t.span));
                self.pos += 1;
            }
            return Ok(vec![self.parse_method(
                start,
                format!("operator {}", op),
                Some(ty),
            )?]);
        }
        if self.at_word("this") && self.peek_at(1).is_some_and(|t| t.is_symbol("[")) {
            self.pos += 1;
            return Ok(vec![self.parse_indexer(start, ty)?]);
        }

        let (name, name_span) = self.parse_member_name()?;
        if self.at_symbol("(") {
            return Ok(vec![self.parse_method(start, name, Some(ty))?]);
        }
        if self.at_symbol("{") || self.at_symbol("=>") {
            return Ok(vec![self.parse_property(start, name, ty)?]);
        }
        if self.at_symbol("=") || self.at_symbol(";") || self.at_symbol(",") || self.at_symbol("[")
        {
            return self.parse_fields(start, name, name_span, ty, DeclKind::Field);
        }
        Err(self.unexpected("'(', '{', '=' or ';'"))
    }

    /// Member name, possibly qualified by an explicit interface, with any type
    /// parameters skipped. Returns the last segment.
    fn parse_member_name(&mut self) -> Result<(String, Span), ParseError> {
        let (mut name, mut span) = self.expect_name()?;
        loop {
            if self.at_symbol("<") {
                self.skip_balanced("<", ">")?;
            }
            if self.at_symbol(".") && self.peek_at(1).is_some_and(|t| t.name().is_some()) {
                self.pos += 1;
                (name, span) = self.expect_name()?;
            } else {
                return Ok((name, span));
            }
        }
    }

    fn parse_type_declaration(&mut self, start: usize) -> Result<SyntaxNode, ParseError> {
        let keyword = self.next().and_then(|t| t.word()).unwrap_or_default();
        if keyword == "record" && !self.eat_word("class") {
            self.eat_word("struct");
        }
        let (name, _) = self.expect_name()?;
        if self.at_symbol("<") {
            self.skip_balanced("<", ">")?;
        }
        let header = Span::new(start, self.last_hi());

        let mut children = Vec::new();
        if self.at_symbol("(") {
            let kind = if keyword == "record" {
                DeclKind::Property
            } else {
                DeclKind::Parameter
            };
            let (params, _) = self.parse_parameters("(", ")", kind)?;
            children.extend(params);
        }

        let mut bases = Vec::new();
        if self.eat_symbol(":") {
            loop {
                bases.push(self.parse_type()?);
                if self.at_symbol("(") {
                    children.push(self.parse_group("(", ")")?);
                }
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }
        while self.eat_word("where") {
            while !self.at_symbol("{") && !self.at_symbol(";") && !self.at_word("where") {
                if self.next().is_none() {
                    return Err(self.unexpected("'{'"));
                }
            }
        }

        if !self.eat_symbol(";") {
            self.expect_symbol("{")?;
            if keyword == "enum" {
                children.extend(self.parse_enum_members()?);
            } else {
                while !self.at_symbol("}") {
                    if self.peek().is_none() {
                        return Err(self.unexpected("'}'"));
                    }
                    if self.eat_symbol(";") {
                        continue;
                    }
                    children.extend(self.parse_member(Some(&name))?);
                }
            }
            self.expect_symbol("}")?;
            self.eat_symbol(";");
        }

        Ok(SyntaxNode {
            kind: NodeKind::Declaration(Declaration {
                kind: DeclKind::Type,
                name,
                ty: None,
                arity: None,
                bases,
                header,
            }),
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    fn parse_enum_members(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut members = Vec::new();
        while !self.at_symbol("}") {
            self.skip_attributes()?;
            let (name, span) = self.expect_name()?;
            let children = if self.eat_symbol("=") {
                self.parse_terms_until(&[",", "}"])?
            } else {
                Vec::new()
            };
            members.push(SyntaxNode {
                kind: NodeKind::Declaration(Declaration {
                    kind: DeclKind::EnumMember,
                    name,
                    ty: None,
                    arity: None,
                    bases: Vec::new(),
                    header: span,
                }),
                span: Span::new(span.lo, self.last_hi()),
                children,
            });
            if !self.eat_symbol(",") {
                break;
            }
        }
        Ok(members)
    }

    fn parse_delegate(&mut self, start: usize) -> Result<SyntaxNode, ParseError> {
        self.eat_word("delegate");
        let ty = self.parse_type()?;
        let (name, _) = self.expect_name()?;
        if self.at_symbol("<") {
            self.skip_balanced("<", ">")?;
        }
        let (children, arity) = self.parse_parameters("(", ")", DeclKind::Parameter)?;
        let header = Span::new(start, self.last_hi());
        while !self.eat_symbol(";") {
            if self.next().is_none() {
                return Err(self.unexpected("';'"));
            }
        }
        Ok(SyntaxNode {
            kind: NodeKind::Declaration(Declaration {
                kind: DeclKind::Delegate,
                name,
                ty: Some(ty),
                arity: Some(arity),
                bases: Vec::new(),
                header,
            }),
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    fn parse_event(&mut self, start: usize) -> Result<Vec<SyntaxNode>, ParseError> {
        self.eat_word("event");
        let ty = self.parse_type()?;
        let (name, name_span) = self.parse_member_name()?;
        if self.at_symbol("{") {
            let header = Span::new(start, self.last_hi());
            let children = self.parse_accessors()?;
            return Ok(vec![SyntaxNode {
                kind: NodeKind::Declaration(Declaration {
                    kind: DeclKind::Event,
                    name,
                    ty: Some(ty),
                    arity: None,
                    bases: Vec::new(),
                    header,
                }),
                span: Span::new(start, self.last_hi()),
                children,
            }]);
        }
        self.parse_fields(start, name, name_span, ty, DeclKind::Event)
    }

    /// Method-like member after its name: parameters, constraints and body.
    fn parse_method(
        &mut self,
        start: usize,
        name: String,
        ty: Option<String>,
    ) -> Result<SyntaxNode, ParseError> {
        let (mut children, arity) = self.parse_parameters("(", ")", DeclKind::Parameter)?;
        let header = Span::new(start, self.last_hi());

        if self.at_symbol(":") {
            // Constructor initializer: `: base(...)` or `: this(...)`.
            self.pos += 1;
            if !self.eat_word("base") && !self.eat_word("this") {
                return Err(self.unexpected("'base' or 'this'"));
            }
            children.push(self.parse_group("(", ")")?);
        }
        while self.eat_word("where") {
            while !self.at_symbol("{") && !self.at_symbol(";") && !self.at_symbol("=>") {
                if self.next().is_none() {
                    return Err(self.unexpected("method body"));
                }
            }
        }
        children.extend(self.parse_body()?);

        Ok(SyntaxNode {
            kind: NodeKind::Declaration(Declaration {
                kind: DeclKind::Method,
                name,
                ty,
                arity: Some(arity),
                bases: Vec::new(),
                header,
            }),
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    /// `{ ... }`, `=> expr;` or `;`.
    fn parse_body(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        if self.eat_symbol(";") {
            Ok(Vec::new())
        } else if self.eat_symbol("=>") {
            let terms = self.parse_terms_until(&[";"])?;
            self.expect_symbol(";")?;
            Ok(terms)
        } else if self.at_symbol("{") {
            Ok(vec![self.parse_block()?])
        } else {
            Err(self.unexpected("'{', '=>' or ';'"))
        }
    }

    fn parse_property(
        &mut self,
        start: usize,
        name: String,
        ty: String,
    ) -> Result<SyntaxNode, ParseError> {
        let header = Span::new(start, self.last_hi());
        let mut children = Vec::new();
        if self.eat_symbol("=>") {
            children.extend(self.parse_terms_until(&[";"])?);
            self.expect_symbol(";")?;
        } else {
            children.extend(self.parse_accessors()?);
            if self.eat_symbol("=") {
                children.extend(self.parse_terms_until(&[";"])?);
                self.expect_symbol(";")?;
            }
        }
        Ok(SyntaxNode {
            kind: NodeKind::Declaration(Declaration {
                kind: DeclKind::Property,
                name,
                ty: Some(ty),
                arity: None,
                bases: Vec::new(),
                header,
            }),
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    fn parse_indexer(&mut self, start: usize, ty: String) -> Result<SyntaxNode, ParseError> {
        let (mut children, _) = self.parse_parameters("[", "]", DeclKind::Parameter)?;
        let header = Span::new(start, self.last_hi());
        if self.eat_symbol("=>") {
            children.extend(self.parse_terms_until(&[";"])?);
            self.expect_symbol(";")?;
        } else {
            children.extend(self.parse_accessors()?);
        }
        Ok(SyntaxNode {
            kind: NodeKind::Declaration(Declaration {
                kind: DeclKind::Property,
                name: "this[]".to_string(),
                ty: Some(ty),
                arity: None,
                bases: Vec::new(),
                header,
            }),
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    /// `{ get; set => x = value; }` and the like.
    fn parse_accessors(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        self.expect_symbol("{")?;
        let mut children = Vec::new();
        while !self.eat_symbol("}") {
            self.skip_attributes()?;
            self.skip_modifiers();
            if self.peek().and_then(|t| t.word()).is_none() {
                return Err(self.unexpected("accessor"));
            }
            self.pos += 1;
            children.extend(self.parse_body()?);
        }
        Ok(children)
    }

    /// Field or event declarators, starting after the first name.
    fn parse_fields(
        &mut self,
        start: usize,
        mut name: String,
        mut name_span: Span,
        ty: String,
        kind: DeclKind,
    ) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut fields = Vec::new();
        let mut header_start = start;
        loop {
            if self.at_symbol("[") {
                // Fixed-size buffer.
                self.skip_balanced("[", "]")?;
            }
            let header = Span::new(header_start, name_span.hi);
            let children = if self.eat_symbol("=") {
                self.parse_terms_until(&[",", ";"])?
            } else {
                Vec::new()
            };
            fields.push(SyntaxNode {
                kind: NodeKind::Declaration(Declaration {
                    kind,
                    name,
                    ty: Some(ty.clone()),
                    arity: None,
                    bases: Vec::new(),
                    header,
                }),
                span: Span::new(header_start, self.last_hi()),
                children,
            });
            if self.eat_symbol(";") {
                return Ok(fields);
            }
            self.expect_symbol(",")?;
            (name, name_span) = self.expect_name()?;
            header_start = name_span.lo;
        }
    }

    /// Parameter list between `open` and `close`. Returns the parameters and their count.
    fn parse_parameters(
        &mut self,
        open: &str,
        close: &str,
        kind: DeclKind,
    ) -> Result<(Vec<SyntaxNode>, usize), ParseError> {
        self.expect_symbol(open)?;
        let mut params = Vec::new();
        while !self.eat_symbol(close) {
            self.skip_attributes()?;
            let start = self.here();
            while ["this", "ref", "out", "in", "params", "scoped", "readonly"]
                .iter()
                .any(|m| self.at_word(m))
            {
                self.pos += 1;
            }
            if self.at_word("__arglist") {
                self.pos += 1;
            } else {
                let ty = self.parse_type()?;
                let (name, name_span) = self.expect_name()?;
                let children = if self.eat_symbol("=") {
                    self.parse_terms_until(&[",", close])?
                } else {
                    Vec::new()
                };
                params.push(SyntaxNode {
                    kind: NodeKind::Declaration(Declaration {
                        kind,
                        name,
                        ty: Some(ty),
                        arity: None,
                        bases: Vec::new(),
                        header: Span::new(start, name_span.hi),
                    }),
                    span: Span::new(start, self.last_hi()),
                    children,
                });
            }
            if !self.at_symbol(close) {
                self.expect_symbol(",")?;
            }
        }
        let count = params.len();
        Ok((params, count))
    }

    /// A type as written, with whitespace removed.
    fn parse_type(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        if self.at_symbol("(") {
            // Tuple type.
            self.pos += 1;
            loop {
                self.parse_type()?;
                if self.peek().is_some_and(|t| t.name().is_some()) {
                    self.pos += 1;
                }
                if !self.eat_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
        } else {
            if self.at_word("global") && self.peek_at(1).is_some_and(|t| t.is_symbol("::")) {
                self.pos += 2;
            }
            match self.peek() {
                Some(t) if t.name().is_some() || t.word().is_some_and(is_builtin_type) => {
                    self.pos += 1
                }
                _ => return Err(self.unexpected("type")),
            }
            loop {
                if self.at_symbol("<") {
                    self.parse_type_arguments()?;
                }
                let qualified = (self.at_symbol(".") || self.at_symbol("::"))
                    && self.peek_at(1).is_some_and(|t| t.name().is_some());
                if !qualified {
                    break;
                }
                self.pos += 2;
            }
        }
        loop {
            if self.eat_symbol("?") || self.eat_symbol("*") {
                continue;
            }
            let is_rank = self.at_symbol("[")
                && self
                    .peek_at(1)
                    .is_some_and(|t| t.is_symbol("]") || t.is_symbol(","));
            if !is_rank {
                break;
            }
            self.skip_balanced("[", "]")?;
        }
        Ok(self.tokens[start..self.pos]
            .iter()
            .map(|t| self.file.text_of(t.span))
            .collect())
    }

    fn parse_type_arguments(&mut self) -> Result<(), ParseError> {
        self.expect_symbol("<")?;
        while !self.eat_symbol(">") {
            if !self.at_symbol(",") && !self.at_symbol(">") {
                self.parse_type()?;
            }
            if !self.at_symbol(">") {
                self.expect_symbol(",")?;
            }
        }
        Ok(())
    }

    /// Run `f`, restoring the position if it fails.
    fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let save = self.pos;
        let res = f(self);
        if res.is_none() {
            self.pos = save;
        }
        res
    }

    fn parse_block(&mut self) -> Result<SyntaxNode, ParseError> {
        let start = self.here();
        self.expect_symbol("{")?;
        let children = self.parse_terms_until(&["}"])?;
        self.expect_symbol("}")?;
        Ok(SyntaxNode {
            kind: NodeKind::Block,
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    fn parse_group(&mut self, open: &str, close: &str) -> Result<SyntaxNode, ParseError> {
        let start = self.here();
        self.expect_symbol(open)?;
        let children = self.parse_terms_until(&[close])?;
        self.expect_symbol(close)?;
        Ok(SyntaxNode {
            kind: NodeKind::Group,
            span: Span::new(start, self.last_hi()),
            children,
        })
    }

    /// Loosely parse expressions and statements until one of `stops` at this
    /// nesting level, or until the end if there are none. The stop token is
    /// not consumed.
    fn parse_terms_until(&mut self, stops: &[&str]) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut terms = Vec::new();
        loop {
            let token = match self.peek() {
                Some(t) => t,
                None if stops.is_empty() => break,
                None => {
                    let expected = stops.iter().map(|s| format!("'{}'", s)).collect::<Vec<_>>();
                    return Err(self.unexpected(&expected.join(" or ")));
                }
            };
            if stops.iter().any(|s| token.is_symbol(s)) {
                break;
            }
            self.parse_term(token, &mut terms)?;
        }
        Ok(terms)
    }

    /// The term starting at `token`. Skipped punctuation and keywords add nothing.
    fn parse_term(
        &mut self,
        token: &'a Token,
        terms: &mut Vec<SyntaxNode>,
    ) -> Result<(), ParseError> {
        match &token.ty {
            TokenType::Symbol(s) => match s.as_str() {
                "{" => terms.push(self.parse_block()?),
                "(" => {
                    let group = self.parse_group("(", ")")?;
                    terms.push(self.parse_postfix(group)?);
                }
                "[" => terms.push(self.parse_group("[", "]")?),
                ")" | "]" | "}" => return Err(self.error(format!("unexpected '{}'", s))),
                _ => self.pos += 1,
            },
            TokenType::StringLiteral(_) | TokenType::Number(_) | TokenType::CharLiteral(_) => {
                self.pos += 1;
                let literal = SyntaxNode::leaf(NodeKind::Literal, token.span);
                terms.push(self.parse_postfix(literal)?);
            }
            TokenType::InterpolatedString(_, holes) => {
                self.pos += 1;
                let mut literal = SyntaxNode::leaf(NodeKind::Literal, token.span);
                for hole in holes {
                    let mut parser = Parser {
                        file: self.file,
                        tokens: hole,
                        pos: 0,
                    };
                    literal.children.extend(parser.parse_terms_until(&[])?);
                }
                terms.push(self.parse_postfix(literal)?);
            }
            TokenType::Identifier(word) => {
                if let Some(term) = self.parse_word_term(word, token)? {
                    terms.push(term);
                }
            }
        }
        Ok(())
    }

    fn parse_word_term(
        &mut self,
        word: &str,
        token: &'a Token,
    ) -> Result<Option<SyntaxNode>, ParseError> {
        match word {
            "new" => return self.parse_new().map(Some),
            "this" | "base" => {
                let access = self
                    .peek_at(1)
                    .is_some_and(|t| t.is_symbol(".") || t.is_symbol("?."))
                    && self.peek_at(2).is_some_and(|t| t.name().is_some());
                if !access {
                    self.pos += 1;
                    return Ok(None);
                }
                self.pos += 2;
                let receiver = if word == "this" {
                    Receiver::This
                } else {
                    Receiver::Base
                };
                let reference = self.parse_reference(receiver, token.span.lo, Vec::new())?;
                return self.parse_postfix(reference).map(Some);
            }
            "true" | "false" | "null" | "default" => {
                self.pos += 1;
                return Ok(Some(SyntaxNode::leaf(NodeKind::Literal, token.span)));
            }
            _ => {}
        }
        if is_keyword(word) && !is_builtin_type(word) {
            self.pos += 1;
            return Ok(None);
        }
        if let Some(local) = self.speculate(|p| p.parse_local()) {
            return Ok(Some(local));
        }
        if is_builtin_type(word) || EXPRESSION_WORDS.contains(word) {
            // `int.Parse(...)`: a receiver which never resolves to a member.
            self.pos += 1;
            let literal = SyntaxNode::leaf(NodeKind::Literal, token.span);
            return self.parse_postfix(literal).map(Some);
        }
        let reference = self.parse_reference(Receiver::None, token.span.lo, Vec::new())?;
        self.parse_postfix(reference).map(Some)
    }

    /// `Type name` followed by `=`, `;`, `,`, `)` or `in`.
    fn parse_local(&mut self) -> Option<SyntaxNode> {
        let start = self.here();
        if self.peek()?.word().is_some_and(|w| EXPRESSION_WORDS.contains(w)) {
            return None;
        }
        let ty = self.parse_type().ok()?;
        let name_token = self.next()?;
        let name = name_token.name()?;
        if EXPRESSION_WORDS.contains(name) {
            return None;
        }
        let follow = self.peek()?;
        let declares = if ty.ends_with('*') && !is_builtin_type(ty.trim_end_matches('*')) {
            // `a * b;` is a product unless assigned.
            follow.is_symbol("=")
        } else {
            ["=", ";", ",", ")"].iter().any(|s| follow.is_symbol(s)) || follow.is_word("in")
        };
        if !declares {
            return None;
        }
        Some(SyntaxNode::leaf(
            NodeKind::Declaration(Declaration {
                kind: DeclKind::Local,
                name: name.to_string(),
                ty: Some(ty),
                arity: None,
                bases: Vec::new(),
                header: Span::new(start, name_token.span.hi),
            }),
            Span::new(start, name_token.span.hi),
        ))
    }

    /// A name at the current position, with `receiver` already consumed.
    fn parse_reference(
        &mut self,
        receiver: Receiver,
        lo: usize,
        children: Vec<SyntaxNode>,
    ) -> Result<SyntaxNode, ParseError> {
        let (name, _) = self.expect_name()?;
        if self.at_symbol("<") {
            // Generic invocation `Name<T>(...)`; otherwise `<` is a comparison.
            self.speculate(|p| {
                p.parse_type_arguments().ok()?;
                p.at_symbol("(").then_some(())
            });
        }
        Ok(SyntaxNode {
            kind: NodeKind::Reference(Reference {
                name,
                receiver,
                call: None,
                resolved: None,
            }),
            span: Span::new(lo, self.last_hi()),
            children,
        })
    }

    /// Member accesses, invocations and element accesses applied to `node`.
    fn parse_postfix(&mut self, mut node: SyntaxNode) -> Result<SyntaxNode, ParseError> {
        loop {
            if self.at_symbol("!")
                && self
                    .peek_at(1)
                    .is_some_and(|t| t.is_symbol(".") || t.is_symbol("?."))
            {
                self.pos += 1;
            }
            let access = (self.at_symbol(".") || self.at_symbol("?."))
                && self.peek_at(1).is_some_and(|t| t.name().is_some());
            if access {
                self.pos += 1;
                let lo = node.span.lo;
                node = self.parse_reference(Receiver::Expr, lo, vec![node])?;
                continue;
            }
            let invocable = matches!(&node.kind, NodeKind::Reference(r) if r.call.is_none());
            if invocable && self.at_symbol("(") {
                let (args, count) = self.parse_arguments()?;
                node.children.extend(args);
                node.span.hi = self.last_hi();
                if let NodeKind::Reference(reference) = &mut node.kind {
                    reference.call = Some(count);
                }
                continue;
            }
            if self.at_symbol("[") {
                let index = self.parse_group("[", "]")?;
                node.span.hi = index.span.hi;
                node.children.push(index);
                continue;
            }
            return Ok(node);
        }
    }

    /// `(a, name: b, out var c)`. Returns the argument terms and the argument count.
    fn parse_arguments(&mut self) -> Result<(Vec<SyntaxNode>, usize), ParseError> {
        self.expect_symbol("(")?;
        let mut terms = Vec::new();
        let mut count = 0;
        while !self.eat_symbol(")") {
            let named = self.peek().is_some_and(|t| t.name().is_some())
                && self.peek_at(1).is_some_and(|t| t.is_symbol(":"));
            if named {
                self.pos += 2;
            }
            terms.extend(self.parse_terms_until(&[",", ")"])?);
            count += 1;
            self.eat_symbol(",");
        }
        Ok((terms, count))
    }

    /// `new T(...) { ... }`, `new(...)`, `new[] { ... }` or `new { ... }`.
    fn parse_new(&mut self) -> Result<SyntaxNode, ParseError> {
        let start = self.here();
        self.pos += 1;
        let ty = if self.at_symbol("(") || self.at_symbol("[") || self.at_symbol("{") {
            None
        } else {
            Some(self.parse_type()?)
        };
        let mut children = Vec::new();
        if self.at_symbol("(") {
            children.extend(self.parse_arguments()?.0);
        }
        while self.at_symbol("[") {
            children.push(self.parse_group("[", "]")?);
        }
        if self.at_symbol("{") {
            children.push(self.parse_block()?);
        }
        let node = SyntaxNode {
            kind: NodeKind::New(ty),
            span: Span::new(start, self.last_hi()),
            children,
        };
        self.parse_postfix(node)
    }
}
