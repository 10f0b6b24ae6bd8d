//! Provides the main entry point to the program.
use human_panic::{Metadata, setup_panic};
use solenna::cli::run_cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    setup_panic!(Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));

    if let Err(err) = run_cli() {
        eprintln!("Error: {err:?}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
