#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
//! surface-area -- Find the properties, methods and fields of a C# project
//! whose fully-qualified names match a pattern.
//!
//! The pipeline is [`parser`] → [`symbols`] → [`resolver`] → [`matcher`] →
//! [`report`], driven by [`run::Compilation`].

pub mod argparse;
pub mod error;
pub mod lexer;
pub mod matcher;
pub mod options;
pub mod parser;
pub mod project;
pub mod report;
pub mod resolver;
pub mod run;
pub mod source;
pub mod symbols;
pub mod syntax;

pub use error::{Error, ParseError, Result};
pub use run::{run, Compilation};
