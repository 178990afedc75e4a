//! # Canonical Serialization — JCS Bytes for Schema Identity
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in digest computation.
//!
//! ## Invariant
//!
//! The inner field is private. Bytes come either from
//! [`CanonicalBytes::new`] (any serializable value) or from
//! [`CanonicalBytes::for_schema`], which first removes documentation
//! keywords (`title`, `description`, `$comment`) from the schema and from
//! every nested schema position. Two schemas that differ only in
//! documentation therefore produce identical bytes.
//!
//! Serialization uses `serde_jcs` (RFC 8785): sorted keys, compact
//! separators, and shortest round-trip number formatting, so `1` and `1.0`
//! produce the same bytes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CanonicalizationError;
use crate::frozen::Frozen;
use crate::keyword::{KeywordCatalog, ValueKind};
use crate::schema::Schema;

/// Bytes produced exclusively by JCS canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonical bytes of any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if JCS
    /// serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        serialize_canonical(&value).map(Self)
    }

    /// Canonical bytes of a schema with documentation keywords removed at
    /// every depth.
    pub fn for_schema(schema: &Schema, catalog: &dyn KeywordCatalog) -> Result<Self, CanonicalizationError> {
        let stripped = strip_schema(&schema.to_frozen(), catalog);
        serialize_canonical(&stripped).map(Self)
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn serialize_canonical(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let s = serde_jcs::to_string(value)?;
    Ok(s.into_bytes())
}

fn strip_schema(schema: &Frozen, catalog: &dyn KeywordCatalog) -> Value {
    let Some(map) = schema.as_map() else {
        return schema.to_value();
    };
    let mut out = Map::new();
    for (name, value) in map.iter() {
        if catalog.is_documentation(name) {
            continue;
        }
        let stripped = match catalog.kind_of(name) {
            Some(kind) => strip_keyword_value(kind, value, catalog),
            None => value.to_value(),
        };
        out.insert(name.clone(), stripped);
    }
    Value::Object(out)
}

fn strip_keyword_value(kind: ValueKind, value: &Frozen, catalog: &dyn KeywordCatalog) -> Value {
    let nested = |v: &Frozen| {
        if v.is_schema() {
            strip_schema(v, catalog)
        } else {
            v.to_value()
        }
    };
    match (kind, value) {
        (ValueKind::Schema, v) => strip_schema(v, catalog),
        (ValueKind::SchemaList | ValueKind::CastChain | ValueKind::ItemSchemas, Frozen::Seq(items)) => {
            Value::Array(items.iter().map(nested).collect())
        }
        (ValueKind::ItemSchemas, v) => strip_schema(v, catalog),
        (ValueKind::SchemaMap | ValueKind::DependencyMap, Frozen::Map(map)) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), nested(v)))
                .collect(),
        ),
        (_, v) => v.to_value(),
    }
}
