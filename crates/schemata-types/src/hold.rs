//! # Deferred Validation
//!
//! A hold suspends construction-time validation for one descriptor on the
//! current thread. Holds nest: each [`HoldGuard`] increments a per-thread
//! counter keyed by the descriptor's digest and decrements it on drop, so
//! the counter is restored on every exit path, unwinding included.
//!
//! ## Invariant
//!
//! While the counter for a digest is positive, `Descriptor::build` skips
//! validation for that descriptor. Validation of other descriptors, and
//! explicit calls to `validate`, are unaffected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

use schemata_core::SchemaDigest;

thread_local! {
    static HOLDS: RefCell<HashMap<SchemaDigest, usize>> = RefCell::new(HashMap::new());
}

/// Depth of the hold on `digest` for the current thread.
pub fn hold_depth(digest: &SchemaDigest) -> usize {
    HOLDS.with(|holds| holds.borrow().get(digest).copied().unwrap_or(0))
}

/// True if validation of `digest` is deferred on this thread.
pub fn is_held(digest: &SchemaDigest) -> bool {
    hold_depth(digest) > 0
}

/// An active hold. Not `Send`: it belongs to the thread that opened it.
#[must_use = "the hold is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct HoldGuard {
    digest: SchemaDigest,
    _thread_bound: PhantomData<*const ()>,
}

impl HoldGuard {
    pub fn enter(digest: SchemaDigest) -> Self {
        let depth = HOLDS.with(|holds| {
            let mut holds = holds.borrow_mut();
            let depth = holds.entry(digest).or_insert(0);
            *depth += 1;
            *depth
        });
        tracing::trace!(digest = %digest.short(), depth, "hold entered");
        Self {
            digest,
            _thread_bound: PhantomData,
        }
    }

    pub fn digest(&self) -> &SchemaDigest {
        &self.digest
    }

    /// Current depth, this guard included.
    pub fn depth(&self) -> usize {
        hold_depth(&self.digest)
    }
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        let remaining = HOLDS.with(|holds| {
            let mut holds = holds.borrow_mut();
            let remaining = match holds.get_mut(&self.digest) {
                Some(depth) => {
                    *depth = depth.saturating_sub(1);
                    *depth
                }
                None => 0,
            };
            if remaining == 0 {
                holds.remove(&self.digest);
            }
            remaining
        });
        tracing::trace!(digest = %self.digest.short(), depth = remaining, "hold released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_core::{sha256_digest, CanonicalBytes};

    fn digest(s: &str) -> SchemaDigest {
        sha256_digest(&CanonicalBytes::new(&s).unwrap())
    }

    #[test]
    fn test_nesting_counts() {
        let d = digest("a");
        assert!(!is_held(&d));
        let outer = HoldGuard::enter(d);
        {
            let inner = HoldGuard::enter(d);
            assert_eq!(inner.depth(), 2);
        }
        assert_eq!(outer.depth(), 1);
        drop(outer);
        assert!(!is_held(&d));
    }

    #[test]
    fn test_holds_are_per_digest() {
        let a = digest("a");
        let b = digest("b");
        let _guard = HoldGuard::enter(a);
        assert!(is_held(&a));
        assert!(!is_held(&b));
    }

    #[test]
    fn test_released_on_unwind() {
        let d = digest("unwind");
        let result = std::panic::catch_unwind(|| {
            let _guard = HoldGuard::enter(d);
            assert!(is_held(&d));
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!is_held(&d));
    }

    #[test]
    fn test_holds_are_per_thread() {
        let d = digest("thread");
        let _guard = HoldGuard::enter(d);
        let seen = std::thread::spawn(move || is_held(&d)).join().unwrap();
        assert!(!seen);
    }
}
