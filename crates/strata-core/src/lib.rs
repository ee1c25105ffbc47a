// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Strata memory engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Strata workspace. Pluggable backends
//! (stores, caches, capabilities) implement traits defined here.

pub mod deadline;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use deadline::Deadline;
pub use error::StrataError;
pub use types::{BackendKind, Classification, HealthStatus, MemoryLayer, UserId};

// Re-export all capability traits at crate root.
pub use traits::{BackendAdapter, Classifier, Embedder, Llm, ObservabilitySink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strata_error_has_all_seven_kinds() {
        // Verify every error kind from the propagation contract constructs.
        let _not_found = StrataError::NotFound {
            entity: "persona",
            id: "u1".into(),
        };
        let _validation = StrataError::Validation("test".into());
        let _filter = StrataError::FilterType("test".into());
        let _conflict = StrataError::Conflict("test".into());
        let _transient = StrataError::transient("test");
        let _cancelled = StrataError::Cancelled("test".into());
        let _internal = StrataError::Internal("test".into());
    }

    #[test]
    fn backend_kind_round_trips() {
        use std::str::FromStr;

        let variants = [
            BackendKind::Store,
            BackendKind::Cache,
            BackendKind::Embedding,
            BackendKind::Classifier,
            BackendKind::Llm,
            BackendKind::Observability,
        ];
        for variant in &variants {
            let s = variant.to_string();
            assert_eq!(BackendKind::from_str(&s).unwrap(), *variant);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        // Compile-time check that all capability traits are reachable through
        // the public API.
        fn _assert_backend<T: BackendAdapter>() {}
        fn _assert_embedder<T: Embedder>() {}
        fn _assert_classifier<T: Classifier>() {}
        fn _assert_llm<T: Llm>() {}
        fn _assert_observability<T: ObservabilitySink>() {}
    }
}
