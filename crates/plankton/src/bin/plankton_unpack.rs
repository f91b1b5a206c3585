//! `plankton-unpack`: decode plankton bytes (stdin) to JSON (stdout).
//!
//! Usage:
//!   plankton-unpack [--schema FILE] [--options FILE]

use plankton::cli::{init_tracing, unpack, Args, CliError};
use std::io::{self, Read};

fn run() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = Args::parse(&args, &["--schema", "--options"], &[])?;
    let (schema, options) = args.load()?;

    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;
    println!("{}", unpack(&buf, schema.as_ref(), &options)?);
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
