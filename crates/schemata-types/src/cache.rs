//! # Descriptor Cache — Structural Identity
//!
//! Maps a schema digest to the one live descriptor for that schema.
//!
//! ## Invariants
//!
//! - Interning is a single `DashMap` entry operation: the shard lock is
//!   held between the lookup and the insert, so two threads interning the
//!   same schema concurrently receive the same descriptor.
//! - Entries are weak. A descriptor nobody holds is reclaimed; its dead
//!   entry is replaced on the next intern of that digest, or removed by
//!   [`DescriptorCache::purge`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Weak;

use schemata_core::SchemaDigest;

use crate::descriptor::{Descriptor, DescriptorInner};

/// Digest → weak descriptor.
#[derive(Default)]
pub struct DescriptorCache {
    entries: DashMap<SchemaDigest, Weak<DescriptorInner>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live descriptor for `digest`, or store the one `make`
    /// produces. The flag is true when `make` ran.
    ///
    /// `make` runs under the shard lock and must not touch the cache.
    pub(crate) fn intern<F>(&self, digest: SchemaDigest, make: F) -> (Descriptor, bool)
    where
        F: FnOnce() -> Descriptor,
    {
        match self.entries.entry(digest) {
            Entry::Occupied(mut slot) => {
                if let Some(inner) = slot.get().upgrade() {
                    return (Descriptor(inner), false);
                }
                let fresh = make();
                slot.insert(fresh.downgrade().inner());
                (fresh, true)
            }
            Entry::Vacant(slot) => {
                let fresh = make();
                slot.insert(fresh.downgrade().inner());
                (fresh, true)
            }
        }
    }

    /// The live descriptor for `digest`, if any.
    pub fn get(&self, digest: &SchemaDigest) -> Option<Descriptor> {
        self.entries.get(digest).and_then(|weak| weak.upgrade()).map(Descriptor)
    }

    /// True if a live descriptor exists for `digest`.
    pub fn contains(&self, digest: &SchemaDigest) -> bool {
        self.get(digest).is_some()
    }

    /// Drop entries whose descriptor has been reclaimed. Returns how many
    /// were removed.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "purged descriptor cache");
        }
        removed
    }

    /// Number of entries, dead ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache").field("entries", &self.entries.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_equal_schemas_share_entry() {
        let engine = Engine::new(EngineConfig::default());
        let a = engine.descriptor(&json!({"type": "string", "maxLength": 3})).unwrap();
        let b = engine.descriptor(&json!({"maxLength": 3, "type": "string"})).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(engine.cache().contains(a.digest()));
        assert!(engine.cache().get(a.digest()).unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_purge_drops_dead_entries() {
        let engine = Engine::new(EngineConfig::default());
        let keep = engine.descriptor(&json!({"const": 1})).unwrap();
        let digest = {
            let gone = engine.descriptor(&json!({"const": 2})).unwrap();
            *gone.digest()
        };
        assert!(!engine.cache().contains(&digest));
        let before = engine.cache().len();
        assert!(engine.cache().purge() >= 1);
        assert!(engine.cache().len() < before);
        assert!(engine.cache().contains(keep.digest()));
    }

    #[test]
    fn test_reinterning_after_reclaim() {
        let engine = Engine::new(EngineConfig::default());
        let digest = *engine.descriptor(&json!({"const": "x"})).unwrap().digest();
        let again = engine.descriptor(&json!({"const": "x"})).unwrap();
        assert_eq!(again.digest(), &digest);
        assert!(engine.cache().contains(&digest));
    }

    #[test]
    fn test_concurrent_intern_is_atomic() {
        let engine = Engine::new(EngineConfig::default());
        let schema = json!({"type": "array", "items": {"type": "integer"}, "minItems": 2});
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let schema = schema.clone();
                std::thread::spawn(move || engine.descriptor(&schema).unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = &results[0];
        assert!(results.iter().all(|d| Arc::ptr_eq(&d.0, &first.0)));
    }
}
