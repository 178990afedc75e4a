//! # schemata-cli — Schema Engine Command-Line Interface
//!
//! A thin consumer of the `schemata-types` public API.
//!
//! ## Subcommands
//!
//! - `validate` — validate one or more documents against a schema
//! - `audit` — collect up to `--max` errors for one document
//! - `ravel` — print a schema's canonical Draft-7 form
//! - `digest` — print a schema's structural digest
//! - `check` — check a schema against the Draft-7 metaschema
//!
//! Schemas and documents are JSON, or YAML when the file extension is
//! `.yaml`/`.yml`. A failed validation exits with status 1 and prints the
//! error table on stderr.
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the handlers, which write to the
//!   writers they are given so tests can capture output.
//! - Handlers delegate to the engine; no schema logic lives here.

pub mod load;
pub mod schema;
pub mod validate;

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use schemata_types::{Engine, EngineConfig};

/// Composable JSON-Schema descriptors from the command line.
#[derive(Parser, Debug)]
#[command(name = "schemata", version, about)]
pub struct Cli {
    /// Engine configuration file (YAML or JSON).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate documents against a schema.
    Validate(validate::ValidateArgs),
    /// Report every error in a document, up to a limit.
    Audit(validate::AuditArgs),
    /// Print the canonical form of a schema.
    Ravel(schema::SchemaArgs),
    /// Print the structural digest of a schema.
    Digest(schema::SchemaArgs),
    /// Check a schema against the Draft-7 metaschema.
    Check(schema::SchemaArgs),
}

/// Build an isolated engine from an optional configuration file.
pub fn engine_for(config: Option<&Path>) -> anyhow::Result<Engine> {
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(Engine::new(config))
}

/// Run a parsed command. Returns false when the command reports a
/// failure (invalid document or schema).
pub fn run(cli: &Cli, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<bool> {
    let engine = engine_for(cli.config.as_deref())?;
    match &cli.command {
        Command::Validate(args) => validate::run_validate(&engine, args, out, err),
        Command::Audit(args) => validate::run_audit(&engine, args, out, err),
        Command::Ravel(args) => schema::run_ravel(&engine, args, out),
        Command::Digest(args) => schema::run_digest(&engine, args, out),
        Command::Check(args) => schema::run_check(args, out, err),
    }
}
