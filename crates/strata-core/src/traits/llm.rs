// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM capability trait.

use async_trait::async_trait;

use crate::error::StrataError;
use crate::traits::adapter::BackendAdapter;

/// Capability for free-form text completion.
///
/// Used only by optional optimizer stages (contradiction judgement,
/// abstractive compression). Absence never breaks a core operation.
#[async_trait]
pub trait Llm: BackendAdapter {
    /// Complete `prompt` with at most `max_tokens` of output.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, StrataError>;
}
