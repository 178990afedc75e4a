//! # Validate and Audit Subcommands

use clap::Args;
use std::io::Write;
use std::path::PathBuf;

use schemata_types::Engine;
use schemata_validate::ValidationError;

use crate::load::{load_document, load_schema};

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema file.
    #[arg(long)]
    pub schema: PathBuf,

    /// Documents to validate.
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,
}

/// Arguments for `audit`.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Schema file.
    #[arg(long)]
    pub schema: PathBuf,

    /// Document to audit.
    pub document: PathBuf,

    /// Most errors to collect; 0 collects all.
    #[arg(long, default_value_t = 0)]
    pub max: usize,
}

pub fn run_validate(engine: &Engine, args: &ValidateArgs, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<bool> {
    let descriptor = load_schema(engine, &args.schema)?;
    let mut all_valid = true;
    for path in &args.documents {
        let document = load_document(path)?;
        match descriptor.validate(&document) {
            Ok(()) => writeln!(out, "{}: ok", path.display())?,
            Err(ValidationError::Invalid(report)) => {
                all_valid = false;
                writeln!(err, "{}: invalid", path.display())?;
                write!(err, "{}", report.render_table())?;
            }
            Err(other) => return Err(other.into()),
        }
    }
    Ok(all_valid)
}

pub fn run_audit(engine: &Engine, args: &AuditArgs, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<bool> {
    let descriptor = load_schema(engine, &args.schema)?;
    let document = load_document(&args.document)?;
    let report = descriptor.audit(&document, args.max)?;
    if report.is_empty() {
        writeln!(out, "{}: ok", args.document.display())?;
        return Ok(true);
    }
    writeln!(err, "{}: {} error(s)", args.document.display(), report.len())?;
    write!(err, "{}", report.render_table())?;
    Ok(false)
}
