// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strata: a layered memory engine for AI assistants.
//!
//! Unifies two long-lived memory kinds, semantic (timeless facts,
//! personas, skills, procedures) and episodic (time-ordered conversation
//! fragments consolidated into episodes and archived instances), behind a
//! single retrieval interface over a vector-capable store and a semantic
//! cache.
//!
//! ## Architecture
//!
//! - **MemoryEngine**: the facade (ingest, retrieve, context assembly,
//!   filter-building search wrappers)
//! - **HybridRetriever**: vector + BM25 subqueries fused with RRF
//! - **Optimizer**: dedup, diversity, contradiction flags, compression,
//!   adaptive re-ranking, token budget
//! - **SemanticCache**: persona / query / input namespaces with
//!   semantic-match lookups and coherent invalidation
//! - **JobScheduler**: episodization and instancization on timers
//!
//! ```no_run
//! use strata::{EngineBuilder, Deadline, UserId};
//! use strata_config::StrataConfig;
//!
//! # async fn demo() -> Result<(), strata::StrataError> {
//! let engine = EngineBuilder::new(StrataConfig::default()).build()?;
//! let user = UserId::from("user-1");
//! engine
//!     .ingest_memory(&user, "I prefer Rust for systems work", None, &Deadline::none())
//!     .await?;
//! let result = engine
//!     .retrieve(&user, "what language does the user prefer", None, 5, None, &Deadline::none())
//!     .await?;
//! println!("{} hits", result.entries.len());
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod recording;
pub mod rules;
pub mod types;

pub use engine::{EngineBuilder, IngestHints, MemoryEngine};
pub use types::{
    Context, ContextMessage, RetrievalResult, RetrievedEntry, StoreOutcome, WrittenRecord,
};

// Re-export the pieces callers compose with.
pub use strata_cache::CacheHitKind;
pub use strata_core::{Deadline, StrataError, UserId};
pub use strata_core::types::{Classification, MemoryLayer};
pub use strata_filter::{FilterExpr, FilterValue};
pub use strata_optimizer::{OptimizerProfile, OptimizerStats};
pub use strata_store::Category;
