// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted classifier capability for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use strata_core::error::StrataError;
use strata_core::traits::adapter::BackendAdapter;
use strata_core::traits::Classifier;
use strata_core::types::{BackendKind, Classification, HealthStatus, MemoryLayer};

/// Returns pre-configured classifications in order, then repeats the last
/// one. Captures every classified text for assertions.
pub struct MockClassifier {
    responses: Vec<Classification>,
    calls: Mutex<Vec<String>>,
    cursor: Mutex<usize>,
}

impl MockClassifier {
    pub fn new(responses: Vec<Classification>) -> Self {
        assert!(!responses.is_empty(), "at least one scripted response");
        Self {
            responses,
            calls: Mutex::new(Vec::new()),
            cursor: Mutex::new(0),
        }
    }

    /// A classifier that always answers with one fixed layer.
    pub fn always(layer: MemoryLayer) -> Self {
        Self::new(vec![Classification {
            layer,
            category: layer.to_string(),
            confidence: 0.95,
        }])
    }

    /// Texts classified so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 0)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, StrataError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), StrataError> {
        Ok(())
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        text: &str,
        _persona_hint: Option<&str>,
    ) -> Result<Classification, StrataError> {
        self.calls.lock().unwrap().push(text.to_string());
        let mut cursor = self.cursor.lock().unwrap();
        let response = self.responses[(*cursor).min(self.responses.len() - 1)].clone();
        *cursor += 1;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_play_in_order_then_repeat() {
        let classifier = MockClassifier::new(vec![
            Classification {
                layer: MemoryLayer::Persona,
                category: "persona".into(),
                confidence: 0.9,
            },
            Classification {
                layer: MemoryLayer::Knowledge,
                category: "knowledge".into(),
                confidence: 0.8,
            },
        ]);
        assert_eq!(
            classifier.classify("a", None).await.unwrap().layer,
            MemoryLayer::Persona
        );
        assert_eq!(
            classifier.classify("b", None).await.unwrap().layer,
            MemoryLayer::Knowledge
        );
        assert_eq!(
            classifier.classify("c", None).await.unwrap().layer,
            MemoryLayer::Knowledge
        );
        assert_eq!(classifier.calls(), vec!["a", "b", "c"]);
    }
}
