//! `plankton-cat`: print the records of a plankton stream (stdin) as JSON
//! lines (stdout).
//!
//! Usage:
//!   plankton-cat [--reader-schema FILE] [--options FILE]
//!
//! With a reader schema every record is resolved into that schema's shape.

use plankton::cli::{cat, init_tracing, Args, CliError};
use std::io;

fn run() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = Args::parse(&args, &["--reader-schema", "--options"], &[])?;
    let (schema, options) = args.load()?;

    let mut out = io::stdout().lock();
    let printed = cat(io::stdin().lock(), &mut out, schema, options)?;
    tracing::info!(records = printed, "stream read");
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
