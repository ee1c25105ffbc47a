// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Strata memory engine.

use thiserror::Error;

/// The primary error type used across all Strata crates and backend traits.
///
/// The variant set is deliberately closed: every public engine operation
/// resolves to a populated result or exactly one of these kinds.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Entity does not exist.
    #[error("not found: {entity} `{id}`")]
    NotFound { entity: &'static str, id: String },

    /// Input violates a type, length, or range invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Filter compilation failed for a type reason.
    #[error("filter type error: {0}")]
    FilterType(String),

    /// Optimistic concurrency or uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Temporarily unavailable store, cache, or capability. Retryable.
    #[error("transient error: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Deadline or explicit cancellation fired.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Invariant violation; not user-caused.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Construct a transient error without an underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        StrataError::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Construct a transient error wrapping an underlying cause.
    pub fn transient_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StrataError::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the caller may retry the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, StrataError::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = StrataError::NotFound {
            entity: "knowledge_item",
            id: "abc".into(),
        };
        assert_eq!(e.to_string(), "not found: knowledge_item `abc`");

        let e = StrataError::FilterType("importance expects a number".into());
        assert!(e.to_string().contains("filter type error"));
    }

    #[test]
    fn transient_is_retryable_others_are_not() {
        assert!(StrataError::transient("store busy").is_transient());
        assert!(!StrataError::Validation("bad".into()).is_transient());
        assert!(!StrataError::Cancelled("deadline".into()).is_transient());
    }

    #[test]
    fn transient_preserves_source() {
        let inner = std::io::Error::other("connection reset");
        let e = StrataError::transient_with("cache unreachable", inner);
        let source = std::error::Error::source(&e);
        assert!(source.is_some());
    }
}
