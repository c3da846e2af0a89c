//! Error types for criteria validation, host introspection and registry loading.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::module::ModuleId;

/// Pattern clause a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternField {
    /// The module name pattern.
    Name,
    /// The module source pattern.
    Code,
}

impl fmt::Display for PatternField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Code => write!(f, "code"),
        }
    }
}

/// Errors raised while turning criteria settings into filter criteria.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A search pattern failed to compile.
    #[error("Invalid {field} pattern '{pattern}': {source}")]
    InvalidPattern {
        field: PatternField,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ValidationError {
    /// The clause whose pattern was rejected.
    pub fn field(&self) -> PatternField {
        match self {
            Self::InvalidPattern { field, .. } => *field,
        }
    }
}

/// A host value refused to be introspected (e.g. a property getter threw).
#[derive(Debug, Clone, Error)]
#[error("Failed to read property '{property}': {message}")]
pub struct IntrospectionError {
    /// Property being read when the failure occurred.
    pub property: String,
    /// Host-provided failure description.
    pub message: String,
}

impl IntrospectionError {
    /// Create a new introspection error.
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur while loading a registry snapshot.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Snapshot file not found.
    #[error("Snapshot not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot is not valid JSON or has the wrong shape.
    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// The same module id appears twice.
    #[error("Duplicate module id {id} in snapshot")]
    DuplicateId { id: ModuleId },

    /// A module id is too large to index.
    #[error("Module id {id} in snapshot exceeds the maximum of {max}")]
    IdOutOfRange { id: ModuleId, max: usize },
}

impl RegistryError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}
