#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]

//! surface-area -- Find the properties, methods and fields of a C# project
//! whose fully-qualified names match a pattern.

use log::info;
use std::env;
use std::process::ExitCode;

use surface_area::options::Options;

#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );
    let args: Vec<_> = env::args_os().collect();
    let options = Options::new(&args);
    info!("Using options: {:#?}", options);
    match surface_area::run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("surface-area: {}", e);
            ExitCode::from(2)
        }
    }
}
