//! # codelens CLI
//!
//! Command-line interface for CodeLens.
//!
//! This binary provides human-friendly access to `codelens-core` functionality.
//! Run `codelens --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
