//! `plankton-pack`: encode JSON (stdin) to plankton bytes (stdout).
//!
//! Usage:
//!   plankton-pack [--schema FILE] [--options FILE] [--stream]
//!
//! Without a schema the document is written in the tagged encoding. With
//! `--stream` every input line is one record of a framed stream.

use plankton::cli::{init_tracing, pack, pack_stream, Args, CliError};
use std::io::{self, Read, Write};

fn run() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = Args::parse(&args, &["--schema", "--options"], &["--stream"])?;
    let (schema, options) = args.load()?;

    if args.stream {
        let schema = schema.ok_or_else(|| CliError::Usage("--stream needs --schema".into()))?;
        let written = pack_stream(io::stdin().lock(), io::stdout().lock(), &schema, options)?;
        tracing::info!(records = written, "stream written");
        return Ok(());
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    let bytes = pack(buf.trim(), schema.as_ref(), &options)?;
    io::stdout().write_all(&bytes)?;
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
