//! Printing matches.

use std::io::{self, IsTerminal, Write};
use termcolor::{Color, ColorChoice, ColorSpec, WriteColor};

use crate::matcher::Match;

/// Output format of a [`Reporter`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    /// `path:line,column: text`
    Text,
    /// One JSON object per line.
    Json,
}

/// Decide whether to color standard output. `None` colors only terminals.
pub fn color_choice(requested: Option<bool>) -> ColorChoice {
    match requested {
        Some(true) => ColorChoice::Always,
        Some(false) => ColorChoice::Never,
        None if io::stdout().is_terminal() => ColorChoice::Auto,
        None => ColorChoice::Never,
    }
}

/// Writes one line per match, in the order given.
pub struct Reporter<W> {
    out: W,
    format: Format,
}

impl<W: WriteColor> Reporter<W> {
    /// Create a reporter writing to `out`.
    pub fn new(out: W, format: Format) -> Reporter<W> {
        Reporter { out, format }
    }

    /// Write a single match.
    pub fn report(&mut self, m: &Match) -> io::Result<()> {
        match self.format {
            Format::Text => {
                self.out
                    .set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
                write!(self.out, "{}", m.path)?;
                self.out.reset()?;
                write!(self.out, ":")?;
                self.out
                    .set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                write!(self.out, "{},{}", m.line, m.column)?;
                self.out.reset()?;
                writeln!(self.out, ": {}", m.text)
            }
            Format::Json => {
                serde_json::to_writer(&mut self.out, m)?;
                writeln!(self.out)
            }
        }
    }

    /// Write every match and flush.
    pub fn report_all<'m>(&mut self, matches: impl IntoIterator<Item = &'m Match>) -> io::Result<()> {
        for m in matches {
            self.report(m)?;
        }
        self.out.flush()
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}
