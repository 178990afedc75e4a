//! # Descriptors — Interned Schema Handles
//!
//! A [`Descriptor`] is the first-class handle for one canonical schema. It
//! validates values, builds instances (see `factory`), and combines with
//! other descriptors (see `algebra`).
//!
//! ## Invariant
//!
//! Descriptors are only created by the engine's descriptor cache. Two
//! descriptors obtained from the same engine for schemas with equal
//! digests are the same `Arc`, so `ptr_eq` and `==` agree while both are
//! alive.
//!
//! Ancestors (the operands an algebraic result was built from) and
//! instance back-references are weak: they never keep a descriptor alive.

use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use std::time::Instant;

use schemata_core::{CoreError, Frozen, Keyword, Schema, SchemaDigest};
use schemata_validate::{ValidationError, ValidationReport, ValidatorOptions};

use crate::carrier::Carrier;
use crate::engine::Engine;
use crate::hold::HoldGuard;

pub(crate) struct DescriptorInner {
    engine: Engine,
    schema: Schema,
    digest: SchemaDigest,
    carrier: Carrier,
    ancestors: Vec<WeakDescriptor>,
}

/// A shared, interned schema handle.
#[derive(Clone)]
pub struct Descriptor(pub(crate) Arc<DescriptorInner>);

/// A non-owning reference to a descriptor.
#[derive(Clone, Default)]
pub struct WeakDescriptor(Weak<DescriptorInner>);

impl WeakDescriptor {
    pub fn upgrade(&self) -> Option<Descriptor> {
        self.0.upgrade().map(Descriptor)
    }

    pub(crate) fn inner(&self) -> Weak<DescriptorInner> {
        Weak::clone(&self.0)
    }
}

impl fmt::Debug for WeakDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(d) => write!(f, "WeakDescriptor({})", d.digest().short()),
            None => f.write_str("WeakDescriptor(<dropped>)"),
        }
    }
}

impl Descriptor {
    pub(crate) fn create(engine: Engine, schema: Schema, digest: SchemaDigest, ancestors: Vec<WeakDescriptor>) -> Self {
        let carrier = Carrier::of_schema(&schema);
        Self(Arc::new(DescriptorInner {
            engine,
            schema,
            digest,
            carrier,
            ancestors,
        }))
    }

    pub fn engine(&self) -> &Engine {
        &self.0.engine
    }

    pub fn schema(&self) -> &Schema {
        &self.0.schema
    }

    pub fn digest(&self) -> &SchemaDigest {
        &self.0.digest
    }

    pub fn carrier(&self) -> Carrier {
        self.0.carrier
    }

    /// The human-facing name, taken from `title`.
    pub fn name(&self) -> Option<&str> {
        self.0.schema.keyword(Keyword::Title).and_then(Frozen::as_str)
    }

    /// The live operands this descriptor was derived from.
    pub fn ancestors(&self) -> Vec<Descriptor> {
        self.0.ancestors.iter().filter_map(WeakDescriptor::upgrade).collect()
    }

    pub fn downgrade(&self) -> WeakDescriptor {
        WeakDescriptor(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Descriptor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The Draft-7 document (the `ravel` export).
    pub fn to_value(&self) -> Value {
        self.0.schema.to_value()
    }

    /// Validate fail-fast, or with the engine's configured cap.
    ///
    /// # Errors
    ///
    /// `ValidationError::Invalid` carrying the report.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.engine().validator().validate(self.schema(), value)
    }

    /// Validate, giving up with `Timeout` once `deadline` passes.
    pub fn validate_until(&self, value: &Value, deadline: Instant) -> Result<(), ValidationError> {
        let options = ValidatorOptions {
            deadline: Some(deadline),
            ..self.engine().config().validator_options()
        };
        self.engine().validator().with_options(options).validate(self.schema(), value)
    }

    /// Collect up to `max` error records (0 is unlimited).
    pub fn audit(&self, value: &Value, max: usize) -> Result<ValidationReport, ValidationError> {
        self.engine().validator().audit(self.schema(), value, max)
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.engine().validator().is_valid(self.schema(), value)
    }

    /// Defer construction-time validation of this descriptor on the
    /// current thread until the guard drops.
    pub fn hold(&self) -> HoldGuard {
        HoldGuard::enter(self.0.digest)
    }

    /// Branches of the composite keyword `keyword` (`anyOf`, `oneOf` or
    /// `allOf`), interned in declared order. Empty if absent.
    pub fn branches_of(&self, keyword: Keyword) -> Result<Vec<Descriptor>, CoreError> {
        let Some(entries) = self.schema().keyword(keyword).and_then(Frozen::as_seq) else {
            return Ok(Vec::new());
        };
        entries.iter().map(|entry| self.engine().intern_frozen(entry)).collect()
    }

    /// Union branches: `anyOf` entries, else `oneOf` entries.
    pub fn branches(&self) -> Result<Vec<Descriptor>, CoreError> {
        let any = self.branches_of(Keyword::AnyOf)?;
        if any.is_empty() {
            self.branches_of(Keyword::OneOf)
        } else {
            Ok(any)
        }
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.0.digest == other.0.digest
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.digest.hash(state);
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0.schema),
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("digest", &self.0.digest.short())
            .field("carrier", &self.0.carrier)
            .field("schema", &self.0.schema.to_value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use schemata_core::ErrorKind;
    use serde_json::json;
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default())
    }

    #[test]
    fn test_identity_and_carrier() {
        let engine = engine();
        let a = engine.descriptor(&json!({"type": "integer", "minimum": 1})).unwrap();
        let b = engine.descriptor(&json!({"minimum": 1, "type": "integer"})).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_eq!(a.carrier(), Carrier::Integer);
        assert_eq!(a.to_value(), json!({"type": "integer", "minimum": 1}));
    }

    #[test]
    fn test_documentation_collapses() {
        let engine = engine();
        let a = engine.descriptor(&json!({"type": "string", "title": "Name"})).unwrap();
        let b = engine.descriptor(&json!({"type": "string"})).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.name(), Some("Name"));
        assert_eq!(a.to_string(), "Name");
    }

    #[test]
    fn test_validate_and_audit() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({"type": "object", "required": ["a", "b"]}))
            .unwrap();
        assert!(d.is_valid(&json!({"a": 1, "b": 2})));
        let err = d.validate(&json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiredMissing);
        assert_eq!(err.report().unwrap().len(), 1);
        let report = d.audit(&json!({}), 0).unwrap();
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let engine = engine();
        let d = engine.integer().unwrap();
        let past = Instant::now() - Duration::from_millis(5);
        let err = d.validate_until(&json!(1), past).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(d.validate_until(&json!(1), Instant::now() + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_branches_are_interned() {
        let engine = engine();
        let union = engine
            .descriptor(&json!({"anyOf": [{"type": "integer"}, {"type": "string"}]}))
            .unwrap();
        let branches = union.branches().unwrap();
        assert_eq!(branches.len(), 2);
        assert!(branches[0].ptr_eq(&engine.integer().unwrap()));
        assert!(branches[1].ptr_eq(&engine.text().unwrap()));
    }

    #[test]
    fn test_weak_reference_does_not_root() {
        let engine = engine();
        let weak = engine.descriptor(&json!({"const": "ephemeral"})).unwrap().downgrade();
        assert!(weak.upgrade().is_none());
    }
}
