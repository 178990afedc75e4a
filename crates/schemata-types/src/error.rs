//! # Error Types — Algebra, Construction, Patching
//!
//! One enum per subsystem, each exposing `kind()` onto the unified
//! [`ErrorKind`] taxonomy, and [`SchemataError`] wrapping them all for
//! callers that do not care which subsystem failed.

use thiserror::Error;

use schemata_core::{CoreError, ErrorKind};
use schemata_validate::{MediaError, RegistryError, ValidationError, ValidationReport};

/// Failure combining descriptors.
#[derive(Error, Debug)]
pub enum AlgebraError {
    /// Both sides constrain a keyword in ways no value can satisfy.
    #[error("cannot intersect {keyword:?}: {left} and {right} have no common value")]
    IncompatibleMerge {
        /// The keyword being merged.
        keyword: String,
        /// Left-hand value.
        left: String,
        /// Right-hand value.
        right: String,
    },

    /// A slice does not apply to the descriptor's carrier.
    #[error("cannot slice a {carrier} descriptor: {reason}")]
    InvalidSlice {
        /// Carrier of the sliced descriptor.
        carrier: String,
        /// What is wrong with the slice.
        reason: String,
    },

    /// The combined schema is malformed or cannot be interned.
    #[error("schema error: {0}")]
    Schema(#[from] CoreError),
}

impl AlgebraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IncompatibleMerge { .. } => ErrorKind::IncompatibleMerge,
            Self::InvalidSlice { .. } => ErrorKind::TypeMismatch,
            Self::Schema(e) => e.kind(),
        }
    }
}

/// Failure constructing an instance.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The input cannot be turned into the descriptor's carrier.
    #[error("cannot build a {carrier} from {found}: {reason}")]
    Coercion {
        /// Target carrier.
        carrier: String,
        /// The offending input.
        found: String,
        /// Why the conversion failed.
        reason: String,
    },

    /// A named cast or forward reference is not defined.
    #[error("unresolved forward reference {name:?}")]
    UnresolvedForward {
        /// The unresolved name.
        name: String,
    },

    /// A cast function rejected its input.
    #[error("cast {name:?} failed: {reason}")]
    Cast {
        /// The cast name.
        name: String,
        /// The cast's message.
        reason: String,
    },

    /// Mapping dependencies form a cycle.
    #[error("dependencies form a cycle through {keys:?}")]
    CyclicDependency {
        /// Keys left unordered when the cycle was detected.
        keys: Vec<String>,
    },

    /// The constructed value does not validate.
    #[error("validation failed:\n{0}")]
    Invalid(ValidationReport),

    /// Validation did not finish before its deadline.
    #[error("validation exceeded its deadline after {elapsed_ms} ms")]
    Timeout {
        /// Time spent before giving up.
        elapsed_ms: u128,
    },

    /// A schema met during construction is malformed.
    #[error("schema error: {0}")]
    Schema(#[from] CoreError),
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Coercion { .. } | Self::Cast { .. } => ErrorKind::CoercionFailure,
            Self::UnresolvedForward { .. } => ErrorKind::UnresolvedForward,
            Self::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Self::Invalid(report) => report.kind().unwrap_or(ErrorKind::TypeMismatch),
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Schema(e) => e.kind(),
        }
    }

    /// The validation report, for `Invalid` failures.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Invalid(report) => Some(report),
            _ => None,
        }
    }

    pub(crate) fn coercion(carrier: impl ToString, found: &serde_json::Value, reason: impl Into<String>) -> Self {
        Self::Coercion {
            carrier: carrier.to_string(),
            found: found.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ValidationError> for BuildError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Invalid(report) => Self::Invalid(report),
            ValidationError::Timeout { elapsed_ms } => Self::Timeout { elapsed_ms },
            ValidationError::Schema(e) => Self::Schema(e),
            ValidationError::Metaschema { reason } => Self::Coercion {
                carrier: "schema".into(),
                found: "metaschema".into(),
                reason,
            },
        }
    }
}

/// Failure applying a JSON Patch operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    /// The target (or its parent) does not exist.
    #[error("path {path:?} does not exist")]
    PathNotFound {
        /// The pointer that failed to resolve.
        path: String,
    },

    /// An array index token is malformed or out of bounds.
    #[error("invalid array index {index:?} at {path:?}")]
    InvalidIndex {
        /// Pointer to the array.
        path: String,
        /// The offending token.
        index: String,
    },

    /// A `test` operation found a different value.
    #[error("test failed at {path:?}")]
    TestFailed {
        /// The tested pointer.
        path: String,
    },

    /// A `move` would place a value inside itself.
    #[error("cannot move {from:?} into its own child {path:?}")]
    MoveIntoChild {
        /// Source pointer.
        from: String,
        /// Destination pointer.
        path: String,
    },

    /// The whole document cannot be removed.
    #[error("cannot remove the document root")]
    RootRemoval,
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PatchFailed
    }
}

/// Failure mutating a carrier.
#[derive(Error, Debug)]
pub enum MutationError {
    /// A patch operation could not be applied; nothing changed.
    #[error("patch failed: {0}")]
    Patch(#[from] PatchError),

    /// The patched value does not validate; the carrier was rolled back.
    #[error("rolled back: {0}")]
    Rejected(#[from] ValidationError),
}

impl MutationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Patch(e) => e.kind(),
            Self::Rejected(e) => e.kind(),
        }
    }
}

/// Failure loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// YAML could not be parsed into a configuration.
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON could not be parsed into a configuration.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CoercionFailure
    }
}

/// Top-level error for the engine.
#[derive(Error, Debug)]
pub enum SchemataError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SchemataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind(),
            Self::Registry(e) => e.kind(),
            Self::Validation(e) => e.kind(),
            Self::Algebra(e) => e.kind(),
            Self::Build(e) => e.kind(),
            Self::Patch(e) => e.kind(),
            Self::Mutation(e) => e.kind(),
            Self::Media(e) => e.kind(),
            Self::Config(e) => e.kind(),
        }
    }
}
