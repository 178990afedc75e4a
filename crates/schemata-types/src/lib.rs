//! # schemata-types — Descriptors, Algebra & Instances
//!
//! A [`Descriptor`] is an interned, immutable type defined by a schema.
//! Two structurally equal schemas always yield the same descriptor, so
//! descriptor identity is schema identity.
//!
//! ## Engine (`engine`, `cache`, `config`)
//!
//! [`Engine`] owns the keyword registry, format/media/cast tables, the
//! named-descriptor table used by forward references, and the
//! [`DescriptorCache`]. A process-wide engine is available through
//! [`Engine::global`]; tests build their own to stay isolated.
//!
//! ## Algebra (`algebra`)
//!
//! Intersection (`&`, `+`), union (`|`), exclusive union (`^`),
//! difference (`-`) and negation (`-d`) return new interned descriptors.
//! Intersection merges keyword by keyword following each keyword's merge
//! rule, and lifts a keyword family into `allOf` when it cannot merge.
//!
//! ## Instances (`factory`, `instance`, `carrier`, `casts`, `hold`)
//!
//! `Descriptor::build` runs the cast chain, coerces into the carrier,
//! fills mapping defaults in dependency order, picks a union branch and
//! validates. A [`HoldGuard`] defers that validation for the current
//! thread.
//!
//! ## Mutation (`patch`, `mutable`)
//!
//! [`MutableList`] and [`MutableDict`] apply JSON Patch operations in
//! batches and roll back whatever fails validation.
//!
//! ## Crate Policy
//!
//! - Depends on `schemata-core` and `schemata-validate` internally.
//! - No `unsafe`. Shared state is behind `parking_lot` locks or `DashMap`
//!   shards; holds are thread-local.
//! - Descriptors hold their ancestors weakly and the cache holds every
//!   descriptor weakly. Only user code keeps a descriptor alive.

pub mod algebra;
pub mod cache;
pub mod carrier;
pub mod casts;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod factory;
pub mod hold;
pub mod instance;
pub mod mutable;
pub mod patch;

pub use cache::DescriptorCache;
pub use carrier::Carrier;
pub use casts::{CastFn, CastTable};
pub use config::EngineConfig;
pub use descriptor::{Descriptor, WeakDescriptor};
pub use engine::{Engine, IdentityCatalog, ObjectBuilder};
pub use error::{AlgebraError, BuildError, ConfigError, MutationError, PatchError, SchemataError};
pub use factory::Args;
pub use hold::{hold_depth, is_held, HoldGuard};
pub use instance::Instance;
pub use mutable::{Batch, MutableDict, MutableList};
pub use patch::{apply_patch, PatchOperation};
