//! # Schema — Validated, Frozen Schema Objects
//!
//! A [`Schema`] is a frozen JSON object whose every key is a registered
//! keyword and whose every keyword value has the kind that keyword
//! requires. Nested schemas (under `properties`, `items`, `allOf`, ...)
//! are checked recursively.
//!
//! ## Invariant
//!
//! A `Schema` value can only be produced by [`Schema::from_value`] or
//! [`Schema::from_map`], both of which run the keyword check against a
//! [`KeywordCatalog`]. Boolean schemas normalize at the top level:
//! `true` becomes `{}` and `false` becomes `{"not": {}}`.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::canonical::CanonicalBytes;
use crate::digest::{sha256_digest, SchemaDigest};
use crate::error::CoreError;
use crate::frozen::{Frozen, FrozenMap};
use crate::keyword::{Keyword, KeywordCatalog};
use crate::pointer::JsonPointer;

/// A validated, immutable schema object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema(Arc<FrozenMap>);

impl Schema {
    /// The empty schema `{}`, which accepts everything.
    pub fn any() -> Self {
        Self(Arc::new(FrozenMap::new()))
    }

    /// The schema `{"not": {}}`, which rejects everything.
    pub fn nothing() -> Self {
        let mut map = FrozenMap::new();
        map.insert(Keyword::Not.as_str().to_string(), Frozen::empty_map());
        Self(Arc::new(map))
    }

    /// Freeze and check a plain JSON schema document.
    pub fn from_value(value: &Value, catalog: &dyn KeywordCatalog) -> Result<Self, CoreError> {
        Self::from_frozen(&Frozen::from(value), catalog)
    }

    /// Check an already frozen schema document.
    pub fn from_frozen(value: &Frozen, catalog: &dyn KeywordCatalog) -> Result<Self, CoreError> {
        match value {
            Frozen::Bool(true) => Ok(Self::any()),
            Frozen::Bool(false) => Ok(Self::nothing()),
            Frozen::Map(map) => {
                check_object(map, &JsonPointer::root(), catalog)?;
                Ok(Self(Arc::clone(map)))
            }
            other => Err(CoreError::NotASchema {
                path: String::new(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Check a map of keyword entries.
    pub fn from_map(map: FrozenMap, catalog: &dyn KeywordCatalog) -> Result<Self, CoreError> {
        check_object(&map, &JsonPointer::root(), catalog)?;
        Ok(Self(Arc::new(map)))
    }

    pub fn get(&self, keyword: &str) -> Option<&Frozen> {
        self.0.get(keyword)
    }

    /// Lookup by built-in keyword.
    pub fn keyword(&self, keyword: Keyword) -> Option<&Frozen> {
        self.0.get(keyword.as_str())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.contains_key(keyword)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Frozen)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The keyword entries.
    pub fn entries(&self) -> &FrozenMap {
        &self.0
    }

    /// A copy of the keyword entries, for building derived schemas.
    pub fn to_map(&self) -> FrozenMap {
        (*self.0).clone()
    }

    /// The schema as a frozen object, for embedding in other schemas.
    pub fn to_frozen(&self) -> Frozen {
        Frozen::Map(Arc::clone(&self.0))
    }

    /// The plain Draft-7 JSON document.
    pub fn to_value(&self) -> Value {
        self.to_frozen().to_value()
    }

    /// True if this is exactly the `{"not": {}}` schema.
    pub fn is_nothing(&self) -> bool {
        self.0.len() == 1
            && self
                .keyword(Keyword::Not)
                .is_some_and(|n| matches!(n, Frozen::Bool(true)) || n.as_map().is_some_and(|m| m.is_empty()))
    }

    /// Canonical bytes with documentation keywords removed.
    pub fn canonical_bytes(&self, catalog: &dyn KeywordCatalog) -> Result<CanonicalBytes, CoreError> {
        Ok(CanonicalBytes::for_schema(self, catalog)?)
    }

    /// The structural identity of this schema.
    pub fn digest(&self, catalog: &dyn KeywordCatalog) -> Result<SchemaDigest, CoreError> {
        Ok(sha256_digest(&self.canonical_bytes(catalog)?))
    }
}

impl Serialize for Schema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

fn check_schema(value: &Frozen, path: &JsonPointer, catalog: &dyn KeywordCatalog) -> Result<(), CoreError> {
    match value {
        Frozen::Bool(_) => Ok(()),
        Frozen::Map(map) => check_object(map, path, catalog),
        other => Err(CoreError::NotASchema {
            path: path.to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

fn check_object(map: &FrozenMap, path: &JsonPointer, catalog: &dyn KeywordCatalog) -> Result<(), CoreError> {
    for (name, value) in map {
        let kind = catalog.kind_of(name).ok_or_else(|| CoreError::UnknownKeyword {
            keyword: name.clone(),
            path: path.to_string(),
        })?;
        if !kind.accepts(value) {
            return Err(CoreError::KeywordKind {
                keyword: name.clone(),
                path: path.to_string(),
                expected: kind.to_string(),
                found: value.to_string(),
            });
        }
        let here = path.join(name.as_str());
        for (token, sub) in kind.subschemas(value) {
            let sub_path = match token {
                Some(token) => here.join(token),
                None => here.clone(),
            };
            check_schema(sub, &sub_path, catalog)?;
        }
    }
    Ok(())
}
