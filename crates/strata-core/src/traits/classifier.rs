// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification capability trait.

use async_trait::async_trait;

use crate::error::StrataError;
use crate::traits::adapter::BackendAdapter;
use crate::types::Classification;

/// Capability for routing ingested text to a memory layer.
///
/// Optional: when no classifier is injected, the facade falls back to a
/// rule-based router over grammatical person and temporal markers.
#[async_trait]
pub trait Classifier: BackendAdapter {
    /// Classify `text`, optionally informed by a persona summary.
    async fn classify(
        &self,
        text: &str,
        persona_hint: Option<&str>,
    ) -> Result<Classification, StrataError>;
}
