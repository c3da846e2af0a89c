//! Error types for predicate evaluation.

use strum::Display;
use thiserror::Error;

use modscope_core::{IntrospectionError, ModuleId};

/// Criteria clause being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Clause {
    Named,
    Loaded,
    Component,
    NamePattern,
    CodePattern,
    Properties,
    PrototypeFields,
}

/// A module could not be classified because its exports refused introspection.
#[derive(Debug, Clone, Error)]
#[error("Failed to evaluate {clause} for module {id}: {source}")]
pub struct EvaluationError {
    /// Module being classified.
    pub id: ModuleId,
    /// Clause that was being checked.
    pub clause: Clause,
    /// Underlying host failure.
    #[source]
    pub source: IntrospectionError,
}

impl EvaluationError {
    /// Create a new evaluation error.
    pub fn new(id: ModuleId, clause: Clause, source: IntrospectionError) -> Self {
        Self { id, clause, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_names_clause() {
        let err = EvaluationError::new(
            ModuleId(4),
            Clause::PrototypeFields,
            IntrospectionError::new("prototype", "revoked proxy"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to evaluate prototype-fields for module 4: Failed to read property 'prototype': revoked proxy"
        );
    }
}
