//! Options parsing and handling.

use crate::argparse::{parse_args, Arg, ArgRef};
use crate::matcher::MatchOptions;
use crate::project::DEFAULT_EXTENSION;
use crate::report::Format;
use std::ffi::{OsStr, OsString};
use std::iter::Peekable;
use std::path::PathBuf;

/// Parsed options.
#[derive(Clone, Debug)]
pub struct Options {
    /// Project file, directory or source file.
    pub project: PathBuf,
    /// Pattern matched against fully-qualified symbol names.
    pub pattern: String,
    /// Extensions of analyzed files.
    pub extensions: Vec<String>,
    /// What to match and how to order it.
    pub match_options: MatchOptions,
    /// Output format.
    pub format: Format,
    /// Forced color setting; `None` colors terminals only.
    pub color: Option<bool>,
}

#[derive(Clone, Debug)]
enum OptionCommand {
    References,
    NoDeclarations,
    Sort,
    Extension(String),
    Json,
    Color(bool),
}

impl Default for Options {
    fn default() -> Options {
        Options {
            project: PathBuf::new(),
            pattern: "".to_string(),
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            match_options: MatchOptions::default(),
            format: Format::Text,
            color: None,
        }
    }
}

fn print_help(long: bool, status: i32) -> ! {
    let filename = std::env::args()
        .next()
        .unwrap_or_else(|| "surface-area".to_string());
    if !long {
        println!(
            "Usage: {} [OPTION]... PROJECT PATTERN
Pass --help for more information.",
            filename
        );
    } else {
        println!(
            r#"Usage: {} [OPTION]... PROJECT PATTERN
Print the properties, methods and fields of PROJECT whose fully-qualified
name matches the regular expression PATTERN.

PROJECT is a .csproj file, a directory or a single source file.

Options:
  -h, --help                 Display this message

  -r, --references           Also print references to matching symbols
  --no-declarations          Do not print declarations
  -s, --sort                 Sort output by path, line and column
  -e, --extension EXT        Analyze files ending in .EXT (default: cs)

  --json                     Print one JSON object per match
  --[no-]color               Force colored output on or off
"#,
            filename
        );
    }
    std::process::exit(status)
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_help(false, 2)
}

fn get_whole_arg<I: Iterator<Item = Arg>>(iter: &mut Peekable<I>) -> Option<OsString> {
    let arg = iter.next()?;
    let index = arg.index();
    while iter.peek().map(|a| a.index()) == Some(index) {
        iter.next();
    }
    Some(arg.entire_match())
}

fn parse_options<S: AsRef<OsStr>>(args: &[S]) -> (Vec<OptionCommand>, Vec<OsString>) {
    let mut opts = Vec::new();
    let mut positionals = Vec::new();
    let parsed = parse_args(args.get(1..).unwrap_or_default());
    let mut arg_iter = parsed.into_iter().peekable();

    while let Some(arg) = arg_iter.next() {
        let cmd = match arg.as_ref() {
            ArgRef::Short('h') => print_help(false, 0),
            ArgRef::Long("help") => print_help(true, 0),

            ArgRef::Short('r') | ArgRef::Long("references") => OptionCommand::References,
            ArgRef::Long("no-declarations") => OptionCommand::NoDeclarations,
            ArgRef::Short('s') | ArgRef::Long("sort") => OptionCommand::Sort,
            ArgRef::Short('e') | ArgRef::Long("extension") => {
                if let Some(arg) = get_whole_arg(&mut arg_iter) {
                    let ext = arg.to_string_lossy();
                    OptionCommand::Extension(ext.trim_start_matches('.').to_string())
                } else {
                    usage_error("Missing argument for --extension")
                }
            }

            ArgRef::Long("json") => OptionCommand::Json,
            ArgRef::Long("color") => OptionCommand::Color(true),
            ArgRef::Long("no-color") => OptionCommand::Color(false),

            ArgRef::Positional => {
                positionals.push(arg.entire_match());
                continue;
            }

            ArgRef::Short(s) => usage_error(&format!("Unknown flag: -{}", s)),
            ArgRef::Long(s) => usage_error(&format!("Unknown flag: --{}", s)),
        };
        opts.push(cmd);
    }

    (opts, positionals)
}

impl Options {
    /// Parse options from `args`. Prints usage and exits if PROJECT or
    /// PATTERN is missing.
    ///
    /// ```
    /// use surface_area::options::Options;
    /// let options = Options::new(&["surface-area", "-r", "App.csproj", "Foo\\..*"]);
    /// assert_eq!(options.pattern, "Foo\\..*");
    /// assert_eq!(options.project.to_str(), Some("App.csproj"));
    /// assert!(options.match_options.include_references);
    /// ```
    pub fn new<S: AsRef<OsStr>>(args: &[S]) -> Options {
        let (cmds, positionals) = parse_options(args);
        if positionals.len() < 2 {
            print_help(false, 0);
        }
        if positionals.len() > 2 {
            usage_error("Too many arguments");
        }

        let mut opts = Options::default();
        let mut extensions = Vec::new();
        for cmd in cmds {
            match cmd {
                OptionCommand::References => opts.match_options.include_references = true,
                OptionCommand::NoDeclarations => {
                    opts.match_options.include_declarations = false
                }
                OptionCommand::Sort => opts.match_options.sorted = true,
                OptionCommand::Extension(ext) => extensions.push(ext),
                OptionCommand::Json => opts.format = Format::Json,
                OptionCommand::Color(color) => opts.color = Some(color),
            }
        }
        if !extensions.is_empty() {
            opts.extensions = extensions;
        }

        let mut positionals = positionals.into_iter();
        opts.project = positionals.next().map(PathBuf::from).unwrap_or_default();
        opts.pattern = positionals
            .next()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_options() {
        let options = Options::new(&["surface-area", "App.csproj", "Bar"]);
        assert_eq!(options.project, PathBuf::from("App.csproj"));
        assert_eq!(options.pattern, "Bar");
        assert_eq!(options.extensions, vec!["cs"]);
        assert_eq!(options.match_options, MatchOptions::default());
        assert_eq!(options.format, Format::Text);
        assert_eq!(options.color, None);
    }

    #[test]
    fn parse_flags() {
        let options = Options::new(&[
            "surface-area",
            "-rs",
            "--no-declarations",
            "--json",
            "--no-color",
            "src",
            ".*",
        ]);
        assert_eq!(
            options.match_options,
            MatchOptions {
                include_declarations: false,
                include_references: true,
                sorted: true,
            }
        );
        assert_eq!(options.format, Format::Json);
        assert_eq!(options.color, Some(false));
        assert_eq!(options.project, PathBuf::from("src"));
    }

    #[test]
    fn parse_extensions() {
        let options = Options::new(&["surface-area", "-e", "csx", "--extension=.cs", "src", "X"]);
        assert_eq!(options.extensions, vec!["csx", "cs"]);
        let options = Options::new(&["surface-area", "-ecsx", "src", "X"]);
        assert_eq!(options.extensions, vec!["csx"]);
    }

    #[test]
    fn patterns_may_look_like_flags() {
        let options = Options::new(&["surface-area", "src", "--", "-Foo"]);
        assert_eq!(options.pattern, "-Foo");
    }
}
