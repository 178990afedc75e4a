//! # Validation Scopes
//!
//! A [`Scope`] is the view a keyword hook gets while it runs: the schema
//! object holding the keyword (for sibling lookups), the root schema that
//! `#`-references resolve against, the current schema and instance paths,
//! and a handle on the shared error accumulator.
//!
//! Hooks report failures with [`Scope::fail`], validate subschemas into the
//! shared accumulator with [`Scope::descend`], and test subschemas without
//! reporting with [`Scope::probe`] and [`Scope::check`].
//!
//! Probe and check verdicts on arrays and objects are remembered for the
//! rest of the call, keyed by subschema, root and instance node. The
//! unevaluated keywords and `contains` ask again about branches the
//! composites already tried, and the memo answers without dispatching
//! any hook a second time.
//!
//! ## Invariants
//!
//! - Once the accumulator reaches its cap or the deadline passes,
//!   [`Scope::is_full`] is true and no further hooks are dispatched.
//! - Reference nesting is bounded by [`MAX_REFERENCE_DEPTH`]; deeper chains
//!   fail with `UnresolvedForward` instead of recursing forever.
//! - A verdict reached after the deadline passed is never remembered.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use schemata_core::{ErrorKind, Frozen, FrozenMap, JsonPointer, Path, PathSegment};

use crate::format::FormatTable;
use crate::regex_cache::RegexCache;
use crate::registry::KeywordRegistry;
use crate::report::{Accumulator, ErrorRecord};
use crate::validator::ReferenceResolver;

/// Maximum number of nested `$ref` hops.
pub const MAX_REFERENCE_DEPTH: usize = 256;

/// State shared by every scope of one validation call.
pub(crate) struct Context<'e> {
    pub(crate) registry: &'e KeywordRegistry,
    pub(crate) formats: &'e FormatTable,
    pub(crate) regexes: &'e RegexCache,
    pub(crate) resolver: &'e dyn ReferenceResolver,
    pub(crate) assert_formats: bool,
    pub(crate) deadline: Option<Instant>,
    pub(crate) expired: Cell<bool>,
    pub(crate) outcomes: RefCell<HashMap<OutcomeKey, bool>>,
}

/// Subschema, root and instance node, by address.
pub(crate) type OutcomeKey = (usize, usize, usize);

impl Context<'_> {
    fn recall(&self, key: Option<OutcomeKey>) -> Option<bool> {
        key.and_then(|key| self.outcomes.borrow().get(&key).copied())
    }

    fn remember(&self, key: Option<OutcomeKey>, accepted: bool) {
        if let Some(key) = key.filter(|_| !self.expired.get()) {
            self.outcomes.borrow_mut().insert(key, accepted);
        }
    }

    fn deadline_passed(&self) -> bool {
        if self.expired.get() {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.expired.set(true);
                true
            }
            _ => false,
        }
    }
}

/// The view of one schema object during validation.
pub struct Scope<'s, 'e> {
    ctx: &'s Context<'e>,
    acc: &'s mut Accumulator,
    schema: &'s FrozenMap,
    root: &'s Frozen,
    schema_path: Path,
    instance_path: Path,
    ref_depth: usize,
}

impl<'s, 'e> Scope<'s, 'e> {
    /// The schema object holding the current keyword.
    pub fn schema(&self) -> &'s FrozenMap {
        self.schema
    }

    /// A sibling keyword's value.
    pub fn sibling(&self, name: &str) -> Option<&'s Frozen> {
        self.schema.get(name)
    }

    /// The schema `#`-references resolve against.
    pub fn root(&self) -> &'s Frozen {
        self.root
    }

    /// Path of the current keyword inside the schema.
    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    /// Path of the current value inside the instance.
    pub fn instance_path(&self) -> &Path {
        &self.instance_path
    }

    /// True if format checkers assert rather than annotate.
    pub fn assert_formats(&self) -> bool {
        self.ctx.assert_formats
    }

    pub fn formats(&self) -> &FormatTable {
        self.ctx.formats
    }

    /// Compiled regex for `pattern`, from the shared cache.
    pub fn regex(&self, pattern: &str) -> Result<Arc<Regex>, String> {
        self.ctx.regexes.get(pattern)
    }

    /// True when no further failures will be recorded.
    pub fn is_full(&self) -> bool {
        self.acc.is_full() || self.ctx.deadline_passed()
    }

    /// Record a failure at the current keyword and instance location.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        let record = ErrorRecord::new(kind, self.schema_path.clone(), self.instance_path.clone(), message);
        self.acc.push(record);
    }

    /// Record a failure at a child location of the instance.
    pub fn fail_at(&mut self, instance_segment: impl Into<PathSegment>, kind: ErrorKind, message: impl Into<String>) {
        let record = ErrorRecord::new(
            kind,
            self.schema_path.clone(),
            self.instance_path.join(instance_segment),
            message,
        );
        self.acc.push(record);
    }

    /// Record a composite failure carrying branch failures.
    pub fn fail_with_children(&mut self, kind: ErrorKind, message: impl Into<String>, children: Vec<ErrorRecord>) {
        let record = ErrorRecord::new(kind, self.schema_path.clone(), self.instance_path.clone(), message)
            .with_children(children);
        self.acc.push(record);
    }

    /// Validate `instance` against `subschema` into the shared accumulator.
    ///
    /// `schema_segment` extends the schema path below the current keyword;
    /// `instance_segment` extends the instance path.
    pub fn descend(
        &mut self,
        schema_segment: Option<PathSegment>,
        subschema: &Frozen,
        instance_segment: Option<PathSegment>,
        instance: &Value,
    ) {
        let schema_path = extend(&self.schema_path, schema_segment);
        let instance_path = extend(&self.instance_path, instance_segment);
        evaluate(
            self.ctx,
            self.acc,
            self.root,
            subschema,
            schema_path,
            instance_path,
            self.ref_depth,
            instance,
        );
    }

    /// Validate against a sibling keyword's subschema (`then`, `else`).
    pub fn descend_sibling(&mut self, keyword: &str, subschema: &Frozen, instance: &Value) {
        let schema_path = self.schema_path.parent().join(keyword);
        let instance_path = self.instance_path.clone();
        evaluate(
            self.ctx,
            self.acc,
            self.root,
            subschema,
            schema_path,
            instance_path,
            self.ref_depth,
            instance,
        );
    }

    /// Validate into a private accumulator with the same cap and return the
    /// failures. An empty result means the subschema accepts.
    pub fn probe(&mut self, schema_segment: Option<PathSegment>, subschema: &Frozen, instance: &Value) -> Vec<ErrorRecord> {
        let key = outcome_key(subschema, self.root, instance);
        if self.ctx.recall(key) == Some(true) {
            return Vec::new();
        }
        let mut acc = Accumulator::new(self.acc.cap());
        let schema_path = extend(&self.schema_path, schema_segment);
        evaluate(
            self.ctx,
            &mut acc,
            self.root,
            subschema,
            schema_path,
            self.instance_path.clone(),
            self.ref_depth,
            instance,
        );
        let records = acc.into_records();
        self.ctx.remember(key, records.is_empty());
        records
    }

    /// True if `subschema` accepts `instance` (resolved against `root`).
    pub fn check(&self, subschema: &Frozen, root: &Frozen, instance: &Value) -> bool {
        let key = outcome_key(subschema, root, instance);
        if let Some(accepted) = self.ctx.recall(key) {
            return accepted;
        }
        let mut acc = Accumulator::new(1);
        evaluate(
            self.ctx,
            &mut acc,
            root,
            subschema,
            self.schema_path.clone(),
            self.instance_path.clone(),
            self.ref_depth,
            instance,
        );
        let accepted = acc.into_records().is_empty();
        self.ctx.remember(key, accepted);
        accepted
    }

    /// Resolve a `$ref` value to its target schema and the root the target
    /// resolves its own references against.
    pub fn resolve_reference(&self, reference: &str) -> Option<(Frozen, Frozen)> {
        let (base, fragment) = match reference.split_once('#') {
            Some((base, fragment)) => (base, fragment),
            None => (reference, ""),
        };
        let root = if base.is_empty() {
            self.root.clone()
        } else {
            self.ctx.resolver.resolve(base)?
        };
        let pointer = JsonPointer::parse(fragment).ok()?;
        let target = resolve_frozen(&root, &pointer)?.clone();
        Some((target, root))
    }

    /// Validate against a `$ref` target.
    pub fn descend_reference(&mut self, reference: &str, instance: &Value) {
        if self.ref_depth >= MAX_REFERENCE_DEPTH {
            self.fail(
                ErrorKind::UnresolvedForward,
                format!("reference {reference:?} nests deeper than {MAX_REFERENCE_DEPTH} levels"),
            );
            return;
        }
        let Some((target, root)) = self.resolve_reference(reference) else {
            self.fail(ErrorKind::UnresolvedForward, format!("unresolved reference {reference:?}"));
            return;
        };
        evaluate(
            self.ctx,
            self.acc,
            &root,
            &target,
            self.schema_path.clone(),
            self.instance_path.clone(),
            self.ref_depth + 1,
            instance,
        );
    }

    pub(crate) fn ref_depth(&self) -> usize {
        self.ref_depth
    }

    /// Dispatch every registered hook present in this scope's schema.
    fn run(&mut self, instance: &Value) {
        let schema = self.schema;
        for definition in self.ctx.registry.validators_for(schema) {
            if self.is_full() {
                break;
            }
            let (Some(value), Some(hook)) = (schema.get(definition.name()), definition.validator()) else {
                continue;
            };
            tracing::trace!(keyword = definition.name(), path = %self.schema_path, "dispatch");
            let mut keyword_scope = Scope {
                ctx: self.ctx,
                acc: &mut *self.acc,
                schema,
                root: self.root,
                schema_path: self.schema_path.join(definition.name()),
                instance_path: self.instance_path.clone(),
                ref_depth: self.ref_depth,
            };
            hook.validate(&mut keyword_scope, value, instance);
        }
    }
}

/// Only object subschemas over arrays and objects are remembered. Scalar
/// instances are often temporaries, such as the names `propertyNames`
/// validates, and their addresses get reused.
fn outcome_key(subschema: &Frozen, root: &Frozen, instance: &Value) -> Option<OutcomeKey> {
    let Frozen::Map(map) = subschema else { return None };
    if !matches!(instance, Value::Array(_) | Value::Object(_)) {
        return None;
    }
    let root = match root {
        Frozen::Map(root) => Arc::as_ptr(root) as usize,
        _ => 0,
    };
    Some((Arc::as_ptr(map) as usize, root, instance as *const Value as usize))
}

fn extend(path: &Path, segment: Option<PathSegment>) -> Path {
    match segment {
        Some(segment) => path.join(segment),
        None => path.clone(),
    }
}

/// Validate `instance` against a schema value: a boolean or an object.
#[allow(clippy::too_many_arguments)]
pub(crate) fn evaluate(
    ctx: &Context<'_>,
    acc: &mut Accumulator,
    root: &Frozen,
    subschema: &Frozen,
    schema_path: Path,
    instance_path: Path,
    ref_depth: usize,
    instance: &Value,
) {
    match subschema {
        Frozen::Bool(true) => {}
        Frozen::Bool(false) => acc.push(ErrorRecord::new(
            ErrorKind::Negation,
            schema_path,
            instance_path,
            format!("{instance} is rejected by the false schema"),
        )),
        Frozen::Map(map) => {
            let mut scope = Scope {
                ctx,
                acc,
                schema: map,
                root,
                schema_path,
                instance_path,
                ref_depth,
            };
            scope.run(instance);
        }
        other => tracing::warn!(found = other.type_name(), "skipping non-schema value"),
    }
}

/// Follow a pointer through frozen objects and arrays.
pub(crate) fn resolve_frozen<'a>(root: &'a Frozen, pointer: &JsonPointer) -> Option<&'a Frozen> {
    pointer.tokens().iter().try_fold(root, |node, token| match node {
        Frozen::Map(map) => map.get(token),
        Frozen::Seq(items) => schemata_core::pointer::parse_index(token).and_then(|i| items.get(i)),
        _ => None,
    })
}
