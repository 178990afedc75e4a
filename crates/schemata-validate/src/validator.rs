//! # Validator Core
//!
//! Runs a schema against a candidate value. Keyword hooks are dispatched in
//! registry order; each failure is appended to an accumulator that stops
//! accepting records once its cap is reached.
//!
//! ## Design
//!
//! A [`Validator`] borrows everything it needs (registry, format table,
//! regex cache, reference resolver) and owns nothing, so building one per
//! call costs nothing. The engine handle in `schemata-types` supplies the
//! borrowed tables.
//!
//! The cap defaults to 1, so [`Validator::validate`] is fail-fast.
//! [`Validator::audit`] takes an explicit cap and never fails on invalid
//! input; it returns the report instead.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Instant;

use schemata_core::{Frozen, Path, Schema};

use crate::error::ValidationError;
use crate::format::FormatTable;
use crate::regex_cache::RegexCache;
use crate::registry::KeywordRegistry;
use crate::report::{Accumulator, ValidationReport};
use crate::scope::{evaluate, Context};

/// Resolves bare `$ref` names (forward references) to schemas.
pub trait ReferenceResolver: Send + Sync {
    /// The schema registered under `name`, as a frozen document.
    fn resolve(&self, name: &str) -> Option<Frozen>;
}

/// A resolver that knows no names.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn resolve(&self, _name: &str) -> Option<Frozen> {
        None
    }
}

/// Per-call validation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Maximum number of top-level records collected; 0 is unlimited.
    pub max_errors: usize,
    /// When false, `format` is annotation only.
    pub assert_formats: bool,
    /// Give up with `Timeout` once this instant passes.
    pub deadline: Option<Instant>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            max_errors: 1,
            assert_formats: true,
            deadline: None,
        }
    }
}

/// A borrowed view of the tables validation needs.
#[derive(Clone, Copy)]
pub struct Validator<'e> {
    registry: &'e KeywordRegistry,
    formats: &'e FormatTable,
    regexes: &'e RegexCache,
    resolver: &'e dyn ReferenceResolver,
    options: ValidatorOptions,
}

impl<'e> Validator<'e> {
    pub fn new(
        registry: &'e KeywordRegistry,
        formats: &'e FormatTable,
        regexes: &'e RegexCache,
        resolver: &'e dyn ReferenceResolver,
    ) -> Self {
        Self {
            registry,
            formats,
            regexes,
            resolver,
            options: ValidatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ValidatorOptions {
        self.options
    }

    /// Validate with the configured cap.
    ///
    /// # Errors
    ///
    /// `Invalid` with the accumulated report, or `Timeout`.
    pub fn validate(&self, schema: &Schema, instance: &Value) -> Result<(), ValidationError> {
        let report = self.run(schema, instance, self.options.max_errors)?;
        if report.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Invalid(report))
        }
    }

    /// Validate collecting up to `max` records (0 is unlimited).
    ///
    /// # Errors
    ///
    /// Only `Timeout`: invalid input yields a non-empty report.
    pub fn audit(&self, schema: &Schema, instance: &Value, max: usize) -> Result<ValidationReport, ValidationError> {
        self.run(schema, instance, max)
    }

    /// True if `instance` conforms. A timeout counts as non-conforming.
    pub fn is_valid(&self, schema: &Schema, instance: &Value) -> bool {
        matches!(self.run(schema, instance, 1), Ok(report) if report.is_empty())
    }

    fn run(&self, schema: &Schema, instance: &Value, cap: usize) -> Result<ValidationReport, ValidationError> {
        let started = Instant::now();
        let ctx = Context {
            registry: self.registry,
            formats: self.formats,
            regexes: self.regexes,
            resolver: self.resolver,
            assert_formats: self.options.assert_formats,
            deadline: self.options.deadline,
            expired: Cell::new(false),
            outcomes: RefCell::new(HashMap::new()),
        };
        let root = schema.to_frozen();
        let mut acc = Accumulator::new(cap);
        evaluate(&ctx, &mut acc, &root, &root, Path::root(), Path::root(), 0, instance);
        if ctx.expired.get() {
            let elapsed_ms = started.elapsed().as_millis();
            tracing::debug!(elapsed_ms, "validation deadline passed, discarding partial report");
            return Err(ValidationError::Timeout { elapsed_ms });
        }
        Ok(ValidationReport::new(acc.into_records()))
    }
}
