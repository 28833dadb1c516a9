//! The analysis pipeline.

use log::{debug, info};
use rayon::prelude::*;
use std::path::PathBuf;
use termcolor::StandardStream;

use crate::error::{Error, Result};
use crate::matcher::{Match, Matcher};
use crate::options::Options;
use crate::parser::parse;
use crate::project;
use crate::report::{color_choice, Reporter};
use crate::resolver::resolve;
use crate::source::SourceFile;
use crate::symbols::SymbolTable;
use crate::syntax::SyntaxNode;

/// Every file of a project, parsed and resolved.
#[derive(Clone, Debug)]
pub struct Compilation {
    /// Source files, in discovery order.
    pub files: Vec<SourceFile>,
    /// Syntax tree of each file, with references resolved.
    pub trees: Vec<SyntaxNode>,
    /// Symbols declared anywhere in the project.
    pub table: SymbolTable,
}

impl Compilation {
    /// Read, parse and resolve the files at `paths`. A failure aborts, reporting
    /// the first failing file in `paths` order.
    pub fn load(paths: &[PathBuf]) -> Result<Compilation> {
        let parsed: Vec<_> = paths
            .par_iter()
            .map(|path| -> Result<(SourceFile, SyntaxNode)> {
                let file = SourceFile::read(path)?;
                let tree = parse(&file)?;
                Ok((file, tree))
            })
            .collect();
        let (files, trees) = parsed.into_iter().collect::<Result<Vec<_>>>()?.into_iter().unzip();
        Compilation::build(files, trees)
    }

    /// Parse and resolve already-read `files`.
    ///
    /// ```
    /// use surface_area::run::Compilation;
    /// use surface_area::source::SourceFile;
    ///
    /// let file = SourceFile::new("Foo.cs", "class Foo { int Bar; }");
    /// let compilation = Compilation::new(vec![file]).unwrap();
    /// assert_eq!(compilation.table.lookup("Foo.Bar").count(), 1);
    /// ```
    pub fn new(files: Vec<SourceFile>) -> Result<Compilation> {
        let parsed: Vec<Result<SyntaxNode>> = files
            .par_iter()
            .map(|file| parse(file).map_err(Error::from))
            .collect();
        let trees = parsed.into_iter().collect::<Result<Vec<_>>>()?;
        Compilation::build(files, trees)
    }

    fn build(files: Vec<SourceFile>, mut trees: Vec<SyntaxNode>) -> Result<Compilation> {
        debug!("Parsed {} files", files.len());
        // Every tree is parsed before any symbol is recorded, and every
        // symbol is recorded before any reference is resolved.
        let table = SymbolTable::build(&trees)?;
        let resolved: usize = trees.par_iter_mut().map(|tree| resolve(&table, tree)).sum();
        debug!("Resolved {} references", resolved);
        Ok(Compilation {
            files,
            trees,
            table,
        })
    }

    /// Located matches of `matcher` in this compilation.
    pub fn matches(&self, matcher: &Matcher) -> Vec<Match> {
        matcher.matches(&self.files, &self.trees, &self.table)
    }
}

#[cfg(not(tarpaulin_include))]
/// Analyze the project named by `options` and print all matches.
pub fn run(options: &Options) -> Result<()> {
    debug!("Compiling pattern");
    let matcher = Matcher::new(&options.pattern, options.match_options)?;
    debug!("Finding source files");
    let paths = project::discover(&options.project, &options.extensions)?;
    let compilation = Compilation::load(&paths)?;
    let matches = compilation.matches(&matcher);
    info!("{} matches", matches.len());

    let stdout = StandardStream::stdout(color_choice(options.color));
    let mut reporter = Reporter::new(stdout.lock(), options.format);
    reporter
        .report_all(&matches)
        .map_err(|source| Error::Io {
            path: "<stdout>".to_string(),
            source,
        })?;
    debug!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchOptions;
    use crate::report::Format;
    use termcolor::NoColor;

    fn render(sources: &[(&str, &str)], pattern: &str, options: MatchOptions) -> String {
        let files = sources
            .iter()
            .map(|(path, text)| SourceFile::new(*path, *text))
            .collect();
        let compilation = Compilation::new(files).unwrap();
        let matcher = Matcher::new(pattern, options).unwrap();
        let mut reporter = Reporter::new(NoColor::new(Vec::new()), Format::Text);
        reporter.report_all(&compilation.matches(&matcher)).unwrap();
        String::from_utf8(reporter.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn test_empty() {
        let compilation = Compilation::new(vec![SourceFile::new("Empty.cs", "")]).unwrap();
        assert!(compilation.table.is_empty());
        assert_eq!(render(&[("Empty.cs", "")], ".*", MatchOptions::default()), "");
    }

    #[test]
    fn test_one_match() {
        let output = render(
            &[("Foo.cs", "class Foo { int Bar; void Baz() {} }")],
            "Bar",
            MatchOptions::default(),
        );
        assert_eq!(output, "Foo.cs:0,12: int Bar\n");
    }

    #[test]
    fn test_cross_file_references() {
        let sources = [
            ("Lib.cs", "namespace Lib {\n  public class Counter {\n    public int Count;\n  }\n}\n"),
            (
                "App.cs",
                "using Lib;\nclass App {\n  Counter counter;\n  void Run() { counter.Count = 1; }\n}\n",
            ),
        ];
        let options = MatchOptions {
            include_references: true,
            ..MatchOptions::default()
        };
        assert_eq!(
            render(&sources, "Counter\\.Count$", options),
            "Lib.cs:2,4: public int Count\nApp.cs:3,15: counter.Count\n"
        );
    }

    #[test]
    fn test_parse_errors_abort() {
        let files = vec![
            SourceFile::new("Good.cs", "class Foo { }"),
            SourceFile::new("Bad.cs", "class Foo { int }"),
        ];
        let err = Compilation::new(files).unwrap_err();
        assert!(matches!(err, Error::Parse(e) if e.path == "Bad.cs"));
    }

    #[test]
    fn test_idempotent() {
        let sources = [(
            "Foo.cs",
            "class Foo { int Bar; void Baz() { Bar = 1; } void Baz(int x) { Baz(); } }",
        )];
        let options = MatchOptions {
            include_references: true,
            ..MatchOptions::default()
        };
        let first = render(&sources, ".*", options);
        assert_eq!(first, render(&sources, ".*", options));
        assert_eq!(first.lines().count(), 5);
    }

    #[test]
    fn test_first_error_wins() {
        let files = (0..32)
            .map(|i| SourceFile::new(format!("Bad{}.cs", i), "class Foo { int }"))
            .collect::<Vec<_>>();
        for _ in 0..4 {
            let err = Compilation::new(files.clone()).unwrap_err();
            assert!(matches!(err, Error::Parse(e) if e.path == "Bad0.cs"));
        }
    }

    #[test]
    fn test_byte_order_mark() {
        let output = render(
            &[("P.cs", "\u{feff}class Foo { int Bar; }")],
            "Bar",
            MatchOptions::default(),
        );
        assert_eq!(output, "P.cs:0,12: int Bar\n");
    }

    #[test]
    fn test_top_level_statements() {
        let sources = [(
            "Program.cs",
            "using System;\nConsole.WriteLine(new Foo().Bar);\nFoo foo = new Foo();\nfoo.Bar = 2;\nclass Foo { public int Bar; }\n",
        )];
        let options = MatchOptions {
            include_references: true,
            ..MatchOptions::default()
        };
        assert_eq!(
            render(&sources, "Foo\\.Bar", options),
            "Program.cs:1,18: new Foo().Bar\nProgram.cs:3,0: foo.Bar\nProgram.cs:4,12: public int Bar\n"
        );
    }

    #[test]
    fn test_interpolated_references() {
        let sources = [("Foo.cs", "class Foo { int Bar; string S() => $\"{Bar}!\"; }")];
        let options = MatchOptions {
            include_references: true,
            ..MatchOptions::default()
        };
        assert_eq!(
            render(&sources, "Bar", options),
            "Foo.cs:0,12: int Bar\nFoo.cs:0,38: Bar\n"
        );
    }

    #[test]
    fn test_missing_file() {
        let err = Compilation::load(&[PathBuf::from("/nonexistent/Foo.cs")]).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
