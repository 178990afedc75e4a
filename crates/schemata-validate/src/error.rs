//! Error types for the registry, the validator, and media-type codecs.

use thiserror::Error;

use schemata_core::{CoreError, ErrorKind};

use crate::report::ValidationReport;

/// Error in keyword registration.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The keyword is already registered and override was not requested.
    #[error("keyword {0:?} is already registered")]
    Duplicate(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Duplicate(_) => ErrorKind::Duplicate,
        }
    }
}

/// Validation failure.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The instance does not conform to the schema.
    #[error("validation failed:\n{0}")]
    Invalid(ValidationReport),

    /// The deadline passed before validation finished.
    #[error("validation exceeded its deadline after {elapsed_ms} ms")]
    Timeout {
        /// Time spent before giving up.
        elapsed_ms: u128,
    },

    /// The schema document itself is malformed.
    #[error("invalid schema: {0}")]
    Schema(#[from] CoreError),

    /// The Draft-7 metaschema could not be compiled.
    #[error("metaschema unavailable: {reason}")]
    Metaschema {
        /// Compiler message.
        reason: String,
    },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(report) => report.kind().unwrap_or(ErrorKind::TypeMismatch),
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Schema(e) => e.kind(),
            Self::Metaschema { .. } => ErrorKind::UnknownKeyword,
        }
    }

    /// The report, for `Invalid` failures.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Invalid(report) => Some(report),
            _ => None,
        }
    }
}

/// Error loading or dumping a content media type.
#[derive(Error, Debug)]
pub enum MediaError {
    /// No codec is registered for the media type.
    #[error("unknown media type {0:?}")]
    UnknownMediaType(String),

    /// The text could not be decoded.
    #[error("cannot decode {media_type}: {reason}")]
    Decode {
        /// The media type.
        media_type: String,
        /// Decoder message.
        reason: String,
    },

    /// The value could not be encoded.
    #[error("cannot encode {media_type}: {reason}")]
    Encode {
        /// The media type.
        media_type: String,
        /// Encoder message.
        reason: String,
    },
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownMediaType(_) => ErrorKind::UnknownKeyword,
            Self::Decode { .. } | Self::Encode { .. } => ErrorKind::CoercionFailure,
        }
    }
}
