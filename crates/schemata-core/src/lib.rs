//! # schemata-core — Foundational Types for the Schemata Engine
//!
//! This crate defines the data model every other crate in the workspace
//! builds on. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Single `Keyword` enum.** The built-in vocabulary, with each
//!    keyword's value kind, validation phase, merge rule and role, is
//!    defined once. Runtime registration of custom keywords happens in
//!    `schemata-validate` on top of this seed.
//!
//! 2. **Frozen values.** `Frozen` is an immutable, `Arc`-backed JSON tree
//!    that can be hashed and shared across threads. A `Schema` is a frozen
//!    object whose keywords have all been checked against a
//!    [`KeywordCatalog`].
//!
//! 3. **`CanonicalBytes` newtype.** Schema identity is the SHA-256 of
//!    RFC 8785 bytes with documentation keywords removed. No other path
//!    produces a [`SchemaDigest`].
//!
//! 4. **One error taxonomy.** Every error type in the workspace maps onto
//!    [`ErrorKind`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `schemata-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod frozen;
pub mod keyword;
pub mod pointer;
pub mod schema;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, SchemaDigest};
pub use error::{CanonicalizationError, CoreError, ErrorKind};
pub use frozen::{is_integer, json_equal, json_type_name, Finite, Frozen, FrozenMap};
pub use keyword::{
    BuiltinCatalog, Draft, Keyword, KeywordCatalog, MergeRule, Phase, Role, ValueKind,
    SIMPLE_TYPES,
};
pub use pointer::{JsonPointer, Path, PathSegment};
pub use schema::Schema;
