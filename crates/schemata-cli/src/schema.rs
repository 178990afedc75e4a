//! # Schema Subcommands
//!
//! `ravel`, `digest` and `check` operate on a schema alone.

use clap::Args;
use std::io::Write;
use std::path::PathBuf;

use schemata_types::Engine;
use schemata_validate::check_draft7;

use crate::load::{load_document, load_schema};

/// A single schema file.
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Schema file.
    pub schema: PathBuf,
}

pub fn run_ravel(engine: &Engine, args: &SchemaArgs, out: &mut dyn Write) -> anyhow::Result<bool> {
    let descriptor = load_schema(engine, &args.schema)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&engine.ravel(&descriptor))?)?;
    Ok(true)
}

pub fn run_digest(engine: &Engine, args: &SchemaArgs, out: &mut dyn Write) -> anyhow::Result<bool> {
    let descriptor = load_schema(engine, &args.schema)?;
    writeln!(out, "{}", descriptor.digest().to_hex())?;
    Ok(true)
}

/// Metaschema failures are reported, not raised.
pub fn run_check(args: &SchemaArgs, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<bool> {
    let document = load_document(&args.schema)?;
    match check_draft7(&document) {
        Ok(()) => {
            writeln!(out, "{}: ok", args.schema.display())?;
            Ok(true)
        }
        Err(e) => {
            writeln!(err, "{}: {e}", args.schema.display())?;
            Ok(false)
        }
    }
}
