//! Memoized regex compilation for `pattern` and `patternProperties`.
//!
//! Compile failures are cached too, so a bad pattern is reported (and
//! logged) once per cache rather than once per validated value.

use dashmap::DashMap;
use regex::Regex;
use std::sync::Arc;

/// Concurrent pattern → compiled regex cache.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: DashMap<String, Result<Arc<Regex>, String>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled regex for `pattern`, or the compiler's message.
    pub fn get(&self, pattern: &str) -> Result<Arc<Regex>, String> {
        if let Some(hit) = self.compiled.get(pattern) {
            return hit.value().clone();
        }
        let entry = self.compiled.entry(pattern.to_string()).or_insert_with(|| {
            Regex::new(pattern).map(Arc::new).map_err(|e| {
                tracing::warn!(pattern, error = %e, "pattern does not compile");
                e.to_string()
            })
        });
        entry.value().clone()
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn clear(&self) {
        self.compiled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiles_once() {
        let cache = RegexCache::new();
        let a = cache.get("^[0-9]+$").unwrap();
        let b = cache.get("^[0-9]+$").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bad_pattern_cached_as_error() {
        let cache = RegexCache::new();
        assert!(cache.get("(unclosed").is_err());
        assert!(cache.get("(unclosed").is_err());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
