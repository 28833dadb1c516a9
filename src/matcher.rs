//! Matching symbols against a name pattern.
//!
//! A single traversal over the resolved trees finds every occurrence of a
//! matching symbol. Two adapters present the result: a located list, one
//! entry per occurrence, and a set of distinct symbols.

use itertools::Itertools;
use log::debug;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::source::SourceFile;
use crate::symbols::{NodeRef, Symbol, SymbolId, SymbolKind, SymbolTable};
use crate::syntax::{NodeKind, SyntaxNode};

/// Which occurrences are matched, and how they are ordered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchOptions {
    /// Match declarations.
    pub include_declarations: bool,
    /// Match resolved references.
    pub include_references: bool,
    /// Order matches by path, line and column instead of discovery order.
    pub sorted: bool,
}

impl Default for MatchOptions {
    fn default() -> MatchOptions {
        MatchOptions {
            include_declarations: true,
            include_references: false,
            sorted: false,
        }
    }
}

/// How a symbol occurs at a location.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    /// The symbol is declared here.
    Declaration,
    /// The symbol is used here.
    Reference,
}

/// A node at which a matching symbol occurs.
#[derive(Copy, Clone, Debug)]
pub struct Occurrence<'c> {
    /// Index of the file the node is in.
    pub file: usize,
    /// The declaration or reference node.
    pub node: &'c SyntaxNode,
    /// The matching symbol.
    pub symbol: &'c Symbol,
    /// Declaration or reference.
    pub kind: OccurrenceKind,
}

/// One reported match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Path of the file containing the match.
    pub path: String,
    /// Zero-based line of the start of the node.
    pub line: usize,
    /// Zero-based column of the start of the node.
    pub column: usize,
    /// Source text of the node, whitespace collapsed.
    pub text: String,
    /// Fully-qualified name of the matched symbol.
    pub symbol: String,
    /// Kind of the matched symbol.
    pub kind: SymbolKind,
    /// Declaration or reference.
    pub occurrence: OccurrenceKind,
}

/// Compiled pattern plus matching options.
#[derive(Clone, Debug)]
pub struct Matcher {
    pattern: Regex,
    options: MatchOptions,
}

impl Matcher {
    /// Compile `pattern`. Fails before any tree is walked if the pattern is malformed.
    ///
    /// ```
    /// use surface_area::matcher::{Matcher, MatchOptions};
    ///
    /// assert!(Matcher::new("Foo\\.Ba.", MatchOptions::default()).is_ok());
    /// assert!(Matcher::new("(", MatchOptions::default()).is_err());
    /// ```
    pub fn new(pattern: &str, options: MatchOptions) -> Result<Matcher> {
        Ok(Matcher {
            pattern: Regex::new(pattern)?,
            options,
        })
    }

    /// Options this matcher was created with.
    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Is `symbol` a property, method or field whose name matches?
    pub fn is_match(&self, symbol: &Symbol) -> bool {
        symbol.kind.is_member() && self.pattern.is_match(&symbol.name)
    }

    /// Every occurrence of a matching symbol, in file order and then tree pre-order.
    pub fn occurrences<'c>(
        &self,
        trees: &'c [SyntaxNode],
        table: &'c SymbolTable,
    ) -> Vec<Occurrence<'c>> {
        let mut found = Vec::new();
        for (file, tree) in trees.iter().enumerate() {
            for node in tree.descendants() {
                match &node.kind {
                    NodeKind::Declaration(decl) if self.options.include_declarations => {
                        let at = NodeRef {
                            file,
                            header: decl.header,
                        };
                        found.extend(
                            table
                                .declared_at(at)
                                .filter(|symbol| self.is_match(symbol))
                                .map(|symbol| Occurrence {
                                    file,
                                    node,
                                    symbol,
                                    kind: OccurrenceKind::Declaration,
                                }),
                        );
                    }
                    NodeKind::Reference(reference) if self.options.include_references => {
                        let symbol = reference.resolved.and_then(|id| table.get(id));
                        if let Some(symbol) = symbol.filter(|s| self.is_match(s)) {
                            found.push(Occurrence {
                                file,
                                node,
                                symbol,
                                kind: OccurrenceKind::Reference,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        debug!("Found {} matching occurrences", found.len());
        found
    }

    /// Located form: one match per occurrence.
    pub fn matches(
        &self,
        files: &[SourceFile],
        trees: &[SyntaxNode],
        table: &SymbolTable,
    ) -> Vec<Match> {
        let mut matches: Vec<Match> = self
            .occurrences(trees, table)
            .into_iter()
            .filter_map(|occurrence| {
                let file = files.get(occurrence.file)?;
                let span = occurrence.node.report_span();
                let (line, column) = file.location(span.lo);
                Some(Match {
                    path: file.path().to_string(),
                    line,
                    column,
                    text: file.text_of(span).split_whitespace().join(" "),
                    symbol: occurrence.symbol.name.clone(),
                    kind: occurrence.symbol.kind,
                    occurrence: occurrence.kind,
                })
            })
            .collect();
        if self.options.sorted {
            matches.sort_by(|a, b| (&a.path, a.line, a.column).cmp(&(&b.path, b.line, b.column)));
        }
        matches
    }

    /// Set form: each matching symbol once, with its declaring node.
    pub fn matching_symbols<'c>(
        &self,
        trees: &'c [SyntaxNode],
        table: &'c SymbolTable,
    ) -> BTreeMap<SymbolId, (&'c Symbol, &'c SyntaxNode)> {
        let mut symbols = BTreeMap::new();
        for occurrence in self.occurrences(trees, table) {
            let symbol = occurrence.symbol;
            if symbols.contains_key(&symbol.id) {
                continue;
            }
            let declaration = match occurrence.kind {
                OccurrenceKind::Declaration => Some(occurrence.node),
                OccurrenceKind::Reference => trees
                    .get(symbol.declaration.file)
                    .and_then(|tree| tree.find_declaration(symbol.declaration.header)),
            };
            if let Some(declaration) = declaration {
                symbols.insert(symbol.id, (symbol, declaration));
            }
        }
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolver::resolve;

    struct Fixture {
        files: Vec<SourceFile>,
        trees: Vec<SyntaxNode>,
        table: SymbolTable,
    }

    fn compile(sources: &[&str]) -> Fixture {
        let files: Vec<_> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| SourceFile::new(format!("{}.cs", i), *s))
            .collect();
        let mut trees: Vec<_> = files.iter().map(|f| parse(f).unwrap()).collect();
        let table = SymbolTable::build(&trees).unwrap();
        for tree in trees.iter_mut() {
            resolve(&table, tree);
        }
        Fixture {
            files,
            trees,
            table,
        }
    }

    fn run(fixture: &Fixture, pattern: &str, options: MatchOptions) -> Vec<Match> {
        Matcher::new(pattern, options)
            .unwrap()
            .matches(&fixture.files, &fixture.trees, &fixture.table)
    }

    fn summary(matches: &[Match]) -> Vec<(SymbolKind, &str, &str)> {
        matches
            .iter()
            .map(|m| (m.kind, m.symbol.as_str(), m.text.as_str()))
            .collect()
    }

    #[test]
    fn single_field() {
        let fixture = compile(&["class Foo { int Bar; void Baz() {} }"]);
        let matches = run(&fixture, "Bar", MatchOptions::default());
        assert_eq!(
            matches,
            vec![Match {
                path: "0.cs".to_string(),
                line: 0,
                column: 12,
                text: "int Bar".to_string(),
                symbol: "Foo.Bar".to_string(),
                kind: SymbolKind::Field,
                occurrence: OccurrenceKind::Declaration,
            }]
        );
    }

    #[test]
    fn every_member_kind() {
        let fixture = compile(&[
            "class Foo { public int Prop { get; set; } void Method() {} int field; }",
        ]);
        let matches = run(&fixture, ".*", MatchOptions::default());
        assert_eq!(
            summary(&matches),
            vec![
                (SymbolKind::Property, "Foo.Prop", "public int Prop"),
                (SymbolKind::Method, "Foo.Method", "void Method()"),
                (SymbolKind::Field, "Foo.field", "int field"),
            ]
        );
    }

    #[test]
    fn overloads() {
        let fixture = compile(&["class Foo { void Baz() {} void Baz(int x) {} }"]);
        let matches = run(&fixture, "Baz", MatchOptions::default());
        assert_eq!(
            summary(&matches),
            vec![
                (SymbolKind::Method, "Foo.Baz", "void Baz()"),
                (SymbolKind::Method, "Foo.Baz", "void Baz(int x)"),
            ]
        );

        let matcher = Matcher::new("Baz", MatchOptions::default()).unwrap();
        let set = matcher.matching_symbols(&fixture.trees, &fixture.table);
        assert_eq!(set.len(), 2);
        assert!(set.values().all(|(symbol, _)| symbol.name == "Foo.Baz"));
    }

    #[test]
    fn other_symbols_never_match() {
        let fixture = compile(&["namespace Foo { class Bar { void Baz(int Bar) { var Bar2 = 1; } } }"]);
        let matches = run(&fixture, "Bar", MatchOptions::default());
        assert_eq!(summary(&matches), vec![(SymbolKind::Method, "Foo.Bar.Baz", "void Baz(int Bar)")]);
    }

    #[test]
    fn references() {
        let fixture = compile(&[
            "class Foo {\n  int Bar;\n  void Baz() {\n    Bar = Bar + 1;\n    Missing();\n  }\n}",
        ]);
        let options = MatchOptions {
            include_references: true,
            ..MatchOptions::default()
        };
        let matches = run(&fixture, "Bar", options);
        let located: Vec<_> = matches
            .iter()
            .map(|m| (m.line, m.column, m.occurrence))
            .collect();
        assert_eq!(
            located,
            vec![
                (1, 2, OccurrenceKind::Declaration),
                (3, 4, OccurrenceKind::Reference),
                (3, 10, OccurrenceKind::Reference),
            ]
        );

        let only_references = MatchOptions {
            include_declarations: false,
            include_references: true,
            sorted: false,
        };
        assert_eq!(run(&fixture, "Bar", only_references).len(), 2);

        // Unresolved references never match, whatever the pattern.
        assert!(run(&fixture, "Missing", options).is_empty());
    }

    #[test]
    fn set_form_has_no_duplicates() {
        let fixture = compile(&["class Foo { int Bar; void Baz() { Bar = Bar + 1; } }"]);
        let options = MatchOptions {
            include_references: true,
            ..MatchOptions::default()
        };
        let matcher = Matcher::new("Bar", options).unwrap();
        assert_eq!(matcher.matches(&fixture.files, &fixture.trees, &fixture.table).len(), 3);
        let set = matcher.matching_symbols(&fixture.trees, &fixture.table);
        assert_eq!(set.len(), 1);
        let (symbol, node) = set.values().next().unwrap();
        assert_eq!(symbol.name, "Foo.Bar");
        assert_eq!(node.declaration().map(|d| d.name.as_str()), Some("Bar"));

        let references_only = Matcher::new(
            "Bar",
            MatchOptions {
                include_declarations: false,
                ..options
            },
        )
        .unwrap();
        let set = references_only.matching_symbols(&fixture.trees, &fixture.table);
        let (_, node) = set.values().next().unwrap();
        assert!(node.declaration().is_some());
    }

    #[test]
    fn whitespace_is_collapsed() {
        let fixture = compile(&["class Foo {\n  void Baz(int x,\n           int y) { }\n}"]);
        let matches = run(&fixture, "Baz", MatchOptions::default());
        assert_eq!(matches[0].text, "void Baz(int x, int y)");
    }

    #[test]
    fn sorted_output() {
        let fixture = compile(&["class B { int X; }", "class A { int X; }"]);
        let mut files = fixture.files.clone();
        files[0] = SourceFile::new("z.cs", "class B { int X; }");
        let matcher = Matcher::new(
            "X",
            MatchOptions {
                sorted: true,
                ..MatchOptions::default()
            },
        )
        .unwrap();
        let paths: Vec<_> = matcher
            .matches(&files, &fixture.trees, &fixture.table)
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(paths, vec!["1.cs", "z.cs"]);
    }

    #[test]
    fn empty_file() {
        let fixture = compile(&[""]);
        assert!(run(&fixture, ".*", MatchOptions::default()).is_empty());
    }
}
