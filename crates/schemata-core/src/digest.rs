//! # Schema Digest — Structural Identity
//!
//! A [`SchemaDigest`] is the SHA-256 of a schema's canonical bytes. The
//! descriptor cache is keyed by it: structurally equal schemas share one
//! digest and therefore one descriptor.
//!
//! ## Invariant
//!
//! Digests can only be computed from [`CanonicalBytes`], so every digest in
//! the engine went through the documentation-stripping JCS pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// SHA-256 digest of canonical schema bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaDigest([u8; 32]);

impl SchemaDigest {
    /// The raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// The first eight hex characters, for log lines and display names.
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for SchemaDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Compute the SHA-256 digest of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> SchemaDigest {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    SchemaDigest(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_sha256_digest_deterministic() {
        let mut data = BTreeMap::new();
        data.insert("type", "integer");
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(sha256_digest(&cb), sha256_digest(&cb));
    }

    #[test]
    fn test_empty_object_known_digest() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(
            sha256_digest(&cb).to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_display_and_short() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        let digest = sha256_digest(&cb);
        assert!(digest.to_string().starts_with("sha256:44136fa3"));
        assert_eq!(digest.short(), "44136fa3");
        assert_eq!(digest.to_hex().len(), 64);
    }
}
