//! # schemata-validate — Keyword Registry & Validator Core
//!
//! The runtime half of the keyword vocabulary and everything needed to run
//! a schema against a value.
//!
//! ## Registry (`registry`)
//!
//! [`KeywordRegistry`] is seeded from the built-in `Keyword` enum for a
//! chosen draft and accepts custom keywords with their own hooks. Hooks
//! run in `(phase, rank)` order: structural keywords first, then
//! composites, then constraints. Annotations have no hook.
//!
//! ## Validation (`validator`, `scope`, `keywords`)
//!
//! [`Validator`] walks a schema with an error accumulator capped at a
//! configurable number of records (1 by default, i.e. fail-fast). Each
//! failure is an [`ErrorRecord`] with schema and instance paths; `anyOf`
//! and `oneOf` attach their branch failures as children.
//!
//! ## Side Tables
//!
//! - [`FormatTable`]: format name → checker for the `format` keyword.
//! - [`MediaTypeTable`]: media type → load/dump codec. Never used by
//!   validation itself.
//! - [`check_draft7`]: the official metaschema, via the `jsonschema`
//!   crate, for schema import.
//!
//! ## Crate Policy
//!
//! - Depends only on `schemata-core` internally.
//! - Third-party validation errors are mapped onto `ErrorKind` at the
//!   metaschema boundary and never leak further.

pub mod error;
pub mod format;
mod keywords;
pub mod media;
pub mod metaschema;
pub mod regex_cache;
pub mod registry;
pub mod report;
pub mod scope;
pub mod validator;

pub use error::{MediaError, RegistryError, ValidationError};
pub use format::{FormatChecker, FormatTable};
pub use media::{yaml_to_json_value, MediaCodec, MediaTypeTable};
pub use metaschema::{check_draft7, DRAFT7_METASCHEMA};
pub use regex_cache::RegexCache;
pub use registry::{KeywordDefinition, KeywordRegistry, KeywordValidator, Registration};
pub use report::{ErrorRecord, ValidationReport};
pub use scope::{Scope, MAX_REFERENCE_DEPTH};
pub use validator::{NoReferences, ReferenceResolver, Validator, ValidatorOptions};
