//! # laodong CLI
//!
//! Command-line front end for the Vietnamese labor-law assistant.
//!
//! This binary wires `laodong-core` to a terminal: an interactive chat REPL,
//! one-shot questions, backend health checks and config inspection.
//! Run `laodong --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
