// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability and backend trait definitions.

pub mod adapter;
pub mod classifier;
pub mod embedding;
pub mod llm;
pub mod observability;

pub use adapter::BackendAdapter;
pub use classifier::Classifier;
pub use embedding::Embedder;
pub use llm::Llm;
pub use observability::ObservabilitySink;
