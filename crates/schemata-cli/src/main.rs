//! # schemata CLI Entry Point
//!
//! Parses arguments, installs logging and dispatches to the handlers.

use clap::Parser;
use std::process::ExitCode;

use schemata_cli::{run, Cli};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    if cli.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let ok = run(&cli, &mut stdout.lock(), &mut stderr.lock())?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(1) })
}
