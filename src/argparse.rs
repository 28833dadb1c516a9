//! Argument parsing.

use std::ffi::{OsStr, OsString};

/// A single command-line argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// (parsed_char, entire_match, index)
    Short(char, String, usize),
    /// (parsed_match, entire_match, index)
    Long(String, String, usize),
    /// (positional_arg, index)
    Positional(OsString, usize),
}

/// A reference to [`Arg`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArgRef<'a> {
    /// A single matched char.
    Short(char),
    /// A long option.
    Long(&'a str),
    /// Positional argument.
    Positional,
}

impl Arg {
    /// Convert into a [`ArgRef`].
    pub fn as_ref(&self) -> ArgRef<'_> {
        match self {
            Arg::Short(c, _, _) => ArgRef::Short(*c),
            Arg::Long(s, _, _) => ArgRef::Long(s),
            Arg::Positional(_, _) => ArgRef::Positional,
        }
    }

    /// Get the entire argument (eg. --foo). For the second and later flags of
    /// a cluster such as `-ecs`, the rest of the cluster (`cs`).
    pub fn entire_match(self) -> OsString {
        match self {
            Arg::Short(_, s, _) | Arg::Long(_, s, _) => s.into(),
            Arg::Positional(s, _) => s,
        }
    }

    /// Get the index of this argument.
    pub fn index(&self) -> usize {
        match self {
            Arg::Short(_, _, i) | Arg::Long(_, _, i) | Arg::Positional(_, i) => *i,
        }
    }
}

/// Parse arguments from `args`, not including the program name.
///
/// `-abc` is split into flags `a`, `b` and `c`; `--name=value` into a long
/// flag and a positional sharing its index. Everything after `--`, and any
/// argument which is not valid UTF-8, is positional.
pub fn parse_args<S: AsRef<OsStr>>(args: &[S]) -> Vec<Arg> {
    let mut result = Vec::new();
    let mut only_positionals = false;

    for (index, arg) in args.iter().enumerate() {
        let index = index + 1;
        let arg = arg.as_ref();
        let text = match arg.to_str() {
            Some(text) if !only_positionals => text,
            _ => {
                result.push(Arg::Positional(arg.to_os_string(), index));
                continue;
            }
        };

        if text == "--" {
            only_positionals = true;
        } else if let Some(long) = text.strip_prefix("--") {
            match long.split_once('=') {
                Some((name, value)) => {
                    result.push(Arg::Long(name.to_string(), text.to_string(), index));
                    result.push(Arg::Positional(value.into(), index));
                }
                None => result.push(Arg::Long(long.to_string(), text.to_string(), index)),
            }
        } else if let Some(cluster) = text.strip_prefix('-').filter(|c| !c.is_empty()) {
            for (offset, c) in cluster.char_indices() {
                let entire = if offset == 0 { text } else { &cluster[offset..] };
                result.push(Arg::Short(c, entire.to_string(), index));
            }
        } else {
            // Includes a lone `-`.
            result.push(Arg::Positional(arg.to_os_string(), index));
        }
    }

    result
}
