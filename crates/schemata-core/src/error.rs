//! # Error Types — Unified Error Taxonomy
//!
//! Every failure raised anywhere in the engine carries an [`ErrorKind`].
//! Crate-local error enums (`CoreError` here, `ValidationError`,
//! `AlgebraError`, `BuildError`, `PatchError` downstream) all expose a
//! `kind()` accessor so callers can branch on the taxonomy without
//! matching on every variant.
//!
//! ## Design
//!
//! - Schema construction errors name the offending keyword and the value
//!   kind it expected.
//! - Validation failures are structured records (see `schemata-validate`)
//!   whose kind is one of the validation kinds below.
//! - Errors produced by third-party validators are mapped into this
//!   taxonomy at the boundary; no foreign error type leaks through the
//!   public API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The instance is not of the declared `type`.
    TypeMismatch,
    /// A numeric, length, count, `enum`, or `const` bound was violated.
    OutOfRange,
    /// A `pattern` or `format` check failed.
    PatternMismatch,
    /// A `required` or dependency-required key is absent.
    RequiredMissing,
    /// A key was rejected by `additionalProperties` or `unevaluatedProperties`.
    UnknownKey,
    /// A `not` schema accepted, or `oneOf` matched zero or several branches.
    Negation,
    /// No `anyOf` branch accepted.
    AnyOfFailed,
    /// A value could not be coerced into the carrier of a descriptor.
    CoercionFailure,
    /// A named forward reference has no definition.
    UnresolvedForward,
    /// Dependency ordering of mapping keys contains a cycle.
    CyclicDependency,
    /// Two schemas cannot be intersected.
    IncompatibleMerge,
    /// A value cannot be represented as a frozen schema value.
    UnfreezableValue,
    /// A keyword was registered twice without override.
    Duplicate,
    /// A schema uses a keyword that is not registered.
    UnknownKeyword,
    /// Validation did not finish before its deadline.
    Timeout,
    /// A JSON Patch operation could not be applied.
    PatchFailed,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub fn all() -> &'static [ErrorKind] {
        &[
            Self::TypeMismatch,
            Self::OutOfRange,
            Self::PatternMismatch,
            Self::RequiredMissing,
            Self::UnknownKey,
            Self::Negation,
            Self::AnyOfFailed,
            Self::CoercionFailure,
            Self::UnresolvedForward,
            Self::CyclicDependency,
            Self::IncompatibleMerge,
            Self::UnfreezableValue,
            Self::Duplicate,
            Self::UnknownKeyword,
            Self::Timeout,
            Self::PatchFailed,
        ]
    }

    /// Returns the snake_case identifier used in reports and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeMismatch => "type_mismatch",
            Self::OutOfRange => "out_of_range",
            Self::PatternMismatch => "pattern_mismatch",
            Self::RequiredMissing => "required_missing",
            Self::UnknownKey => "unknown_key",
            Self::Negation => "negation",
            Self::AnyOfFailed => "any_of_failed",
            Self::CoercionFailure => "coercion_failure",
            Self::UnresolvedForward => "unresolved_forward",
            Self::CyclicDependency => "cyclic_dependency",
            Self::IncompatibleMerge => "incompatible_merge",
            Self::UnfreezableValue => "unfreezable_value",
            Self::Duplicate => "duplicate",
            Self::UnknownKeyword => "unknown_keyword",
            Self::Timeout => "timeout",
            Self::PatchFailed => "patch_failed",
        }
    }

    /// True for kinds produced by instance validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch
                | Self::OutOfRange
                | Self::PatternMismatch
                | Self::RequiredMissing
                | Self::UnknownKey
                | Self::Negation
                | Self::AnyOfFailed
                | Self::UnresolvedForward
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building frozen values and schemas.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A value has no frozen representation.
    #[error("cannot freeze value at {path}: {reason}")]
    Unfreezable {
        /// JSON Pointer to the offending location.
        path: String,
        /// What made the value unrepresentable.
        reason: String,
    },

    /// A schema names a keyword that is not in the registry.
    #[error("unknown keyword {keyword:?} at {path}")]
    UnknownKeyword {
        /// The unregistered keyword.
        keyword: String,
        /// JSON Pointer to the schema object using it.
        path: String,
    },

    /// A keyword value does not have the kind the keyword requires.
    #[error("keyword {keyword:?} at {path} expects {expected}, found {found}")]
    KeywordKind {
        /// The keyword whose value is malformed.
        keyword: String,
        /// JSON Pointer to the schema object using it.
        path: String,
        /// The required value kind.
        expected: String,
        /// A short description of the value actually found.
        found: String,
    },

    /// A schema document is neither an object nor a boolean.
    #[error("schema at {path} must be an object or a boolean, found {found}")]
    NotASchema {
        /// JSON Pointer to the offending location.
        path: String,
        /// A short description of the value actually found.
        found: String,
    },

    /// A JSON Pointer string is malformed.
    #[error("invalid JSON pointer {pointer:?}: {reason}")]
    InvalidPointer {
        /// The pointer text.
        pointer: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl CoreError {
    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unfreezable { .. } | Self::Canonicalization(_) => ErrorKind::UnfreezableValue,
            Self::UnknownKeyword { .. } => ErrorKind::UnknownKeyword,
            Self::KeywordKind { .. } | Self::NotASchema { .. } => ErrorKind::TypeMismatch,
            Self::InvalidPointer { .. } => ErrorKind::PatchFailed,
        }
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
