//! # Draft-7 Metaschema Check
//!
//! Schema import runs documents through the official Draft-7 metaschema,
//! compiled once with the `jsonschema` crate. Errors from that crate are
//! mapped into [`ErrorKind`] here so nothing past this boundary sees a
//! third-party error type.

use jsonschema::error::ValidationErrorKind;
use once_cell::sync::Lazy;
use serde_json::Value;

use schemata_core::{ErrorKind, JsonPointer, Path};

use crate::error::ValidationError;
use crate::report::{ErrorRecord, ValidationReport};

/// The Draft-7 metaschema document.
pub static DRAFT7_METASCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../schemas/draft-07.json")).unwrap_or(Value::Bool(true))
});

static DRAFT7_VALIDATOR: Lazy<Result<jsonschema::Validator, String>> = Lazy::new(|| {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft7);
    opts.build(&DRAFT7_METASCHEMA).map_err(|e| e.to_string())
});

/// Check `document` against the Draft-7 metaschema, reporting every
/// violation.
///
/// # Errors
///
/// `Invalid` with one record per violation, or `Metaschema` if the
/// metaschema itself failed to compile.
pub fn check_draft7(document: &Value) -> Result<(), ValidationError> {
    let validator = DRAFT7_VALIDATOR
        .as_ref()
        .map_err(|reason| ValidationError::Metaschema { reason: reason.clone() })?;
    let records: Vec<ErrorRecord> = validator
        .iter_errors(document)
        .map(|e| {
            ErrorRecord::new(
                map_kind(&e.kind),
                location(&e.schema_path.to_string()),
                location(&e.instance_path.to_string()),
                e.to_string(),
            )
        })
        .collect();
    if records.is_empty() {
        Ok(())
    } else {
        tracing::debug!(violations = records.len(), "document rejected by the Draft-7 metaschema");
        Err(ValidationError::Invalid(ValidationReport::new(records)))
    }
}

fn location(pointer: &str) -> Path {
    JsonPointer::parse(pointer)
        .map(|p| Path::from_pointer(&p))
        .unwrap_or_default()
}

fn map_kind(kind: &ValidationErrorKind) -> ErrorKind {
    match kind {
        ValidationErrorKind::Type { .. } => ErrorKind::TypeMismatch,
        ValidationErrorKind::Minimum { .. }
        | ValidationErrorKind::Maximum { .. }
        | ValidationErrorKind::ExclusiveMinimum { .. }
        | ValidationErrorKind::ExclusiveMaximum { .. }
        | ValidationErrorKind::MinLength { .. }
        | ValidationErrorKind::MaxLength { .. }
        | ValidationErrorKind::MinItems { .. }
        | ValidationErrorKind::MaxItems { .. }
        | ValidationErrorKind::MinProperties { .. }
        | ValidationErrorKind::MaxProperties { .. }
        | ValidationErrorKind::MultipleOf { .. }
        | ValidationErrorKind::UniqueItems { .. }
        | ValidationErrorKind::Enum { .. }
        | ValidationErrorKind::Constant { .. } => ErrorKind::OutOfRange,
        ValidationErrorKind::Pattern { .. } | ValidationErrorKind::Format { .. } => ErrorKind::PatternMismatch,
        ValidationErrorKind::Required { .. } => ErrorKind::RequiredMissing,
        ValidationErrorKind::AdditionalProperties { .. } | ValidationErrorKind::FalseSchema { .. } => {
            ErrorKind::UnknownKey
        }
        ValidationErrorKind::Not { .. }
        | ValidationErrorKind::OneOfNotValid { .. }
        | ValidationErrorKind::OneOfMultipleValid { .. } => ErrorKind::Negation,
        ValidationErrorKind::AnyOf { .. } => ErrorKind::AnyOfFailed,
        _ => ErrorKind::TypeMismatch,
    }
}
