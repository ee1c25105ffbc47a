// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned LLM capability for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::traits::Llm;
use strata_core::types::{BackendKind, HealthStatus};

/// Returns a fixed completion and records every prompt.
pub struct MockLlm {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendAdapter for MockLlm {
    fn name(&self) -> &str {
        "mock-llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, StrataError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canned_response_and_prompt_capture() {
        let llm = MockLlm::new("canned");
        assert_eq!(llm.complete("first prompt", 64).await.unwrap(), "canned");
        assert_eq!(llm.prompts(), vec!["first prompt"]);
    }
}
