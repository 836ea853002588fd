//! LLM-assisted semantic review of drift suggestions
//!
//! This module handles:
//! - Talking to Ollama or OpenAI-compatible endpoints
//! - Structured prompt generation
//! - Folding the model's judgement back into a suggestion
//!
//! The backend is optional. When it is unreachable, slow or answers with
//! something unparsable, the original suggestion is kept with halved
//! confidence and the caller never sees an error.

mod client;
mod prompts;

pub use client::{LlmBackend, LlmClient, LlmResponse, MockLlmClient};
pub use prompts::ReviewPrompt;

use crate::drift::{DocumentationDrift, DriftDetectionResult, DriftSuggestion};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Confidence multiplier applied when the semantic review fails
pub const DEGRADED_CONFIDENCE_FACTOR: f64 = 0.5;

/// Structured judgement returned by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticJudgement {
    pub is_drift: bool,
    pub explanation: String,
    #[serde(default)]
    pub suggested_content: Option<String>,
    pub confidence: f64,
}

impl SemanticJudgement {
    /// Parse a reply, tolerating text around the JSON object
    pub fn parse(reply: &str) -> Result<Self> {
        let start = reply.find('{').context("reply contains no JSON object")?;
        let end = reply.rfind('}').context("reply contains no JSON object")?;
        if end < start {
            anyhow::bail!("reply contains no JSON object");
        }
        serde_json::from_str(&reply[start..=end]).context("Failed to parse LLM judgement")
    }
}

/// Reviews suggestions with an LLM backend
pub struct SemanticReviewer {
    backend: Box<dyn LlmBackend>,
}

impl SemanticReviewer {
    pub fn new(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Review one suggestion; failures degrade instead of propagating
    pub async fn review(
        &self,
        drift: &DocumentationDrift,
        suggestion: &DriftSuggestion,
    ) -> DriftSuggestion {
        match self.judge(drift, suggestion).await {
            Ok(judgement) => {
                debug!(
                    "LLM judged {} in {}: drift={}",
                    suggestion.symbol_name, suggestion.doc_file, judgement.is_drift
                );
                let mut reviewed = suggestion.clone();
                reviewed.confidence = judgement.confidence.clamp(0.0, 1.0);
                reviewed.reasoning = format!("{} {}", suggestion.reasoning, judgement.explanation);
                if !judgement.is_drift {
                    reviewed.auto_applicable = false;
                }
                if let Some(content) = judgement.suggested_content {
                    reviewed.suggested_content = content;
                }
                reviewed
            }
            Err(e) => {
                warn!("Semantic review unavailable, keeping rule-based suggestion: {:#}", e);
                let mut degraded = suggestion.clone();
                degraded.confidence *= DEGRADED_CONFIDENCE_FACTOR;
                degraded.reasoning = format!(
                    "{} (semantic review unavailable: {})",
                    suggestion.reasoning, e
                );
                degraded
            }
        }
    }

    /// Review every suggestion of every result in place
    pub async fn review_results(&self, results: &mut [DriftDetectionResult]) {
        for result in results.iter_mut() {
            let mut reviewed = Vec::with_capacity(result.suggestions.len());
            for suggestion in &result.suggestions {
                let drift = result
                    .drifts
                    .iter()
                    .find(|d| d.diff.symbol_name == suggestion.symbol_name);
                match drift {
                    Some(drift) => reviewed.push(self.review(drift, suggestion).await),
                    None => reviewed.push(suggestion.clone()),
                }
            }
            result.suggestions = reviewed;
        }
    }

    async fn judge(
        &self,
        drift: &DocumentationDrift,
        suggestion: &DriftSuggestion,
    ) -> Result<SemanticJudgement> {
        let prompt = ReviewPrompt::generate(drift, suggestion);
        let response = self.backend.complete(&prompt).await?;
        SemanticJudgement::parse(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::severity_for;
    use crate::extract::{CodeDiff, DiffCategory, DiffKind, ImpactLevel};

    fn drift() -> DocumentationDrift {
        DocumentationDrift {
            file_path: "src/math.ts".to_string(),
            diff: CodeDiff {
                kind: DiffKind::Modified,
                category: DiffCategory::Function,
                symbol_name: "add".to_string(),
                details: "parameter count 2 -> 3".to_string(),
                old_signature: Some("add(a, b)".to_string()),
                new_signature: Some("add(a, b, c)".to_string()),
                impact_level: ImpactLevel::Patch,
            },
            severity: severity_for(ImpactLevel::Patch),
            description: String::new(),
            affected_docs: vec!["docs/math.md".to_string()],
            affected_sections: Vec::new(),
        }
    }

    fn suggestion() -> DriftSuggestion {
        DriftSuggestion {
            id: "s1".to_string(),
            doc_file: "docs/math.md".to_string(),
            section_heading: "Adding".to_string(),
            symbol_name: "add".to_string(),
            original_content: "add(a, b)".to_string(),
            suggested_content: "add(a, b, c)".to_string(),
            reasoning: "Signature changed.".to_string(),
            confidence: 0.7,
            auto_applicable: true,
            feedback_score: None,
        }
    }

    #[test]
    fn test_parse_judgement_with_surrounding_text() {
        let judgement = SemanticJudgement::parse(
            "Sure:\n{\"isDrift\": false, \"explanation\": \"fine\", \"confidence\": 0.2}\nDone.",
        )
        .unwrap();
        assert!(!judgement.is_drift);
        assert!(judgement.suggested_content.is_none());

        assert!(SemanticJudgement::parse("no json here").is_err());
    }

    #[tokio::test]
    async fn test_review_applies_judgement() {
        let mut backend = MockLlmClient::new();
        backend.add_response(
            "add(a, b, c)",
            r#"{"isDrift": false, "explanation": "Docs are generic.", "suggestedContent": null, "confidence": 0.9}"#,
        );
        let reviewer = SemanticReviewer::new(Box::new(backend));

        let reviewed = reviewer.review(&drift(), &suggestion()).await;
        assert_eq!(reviewed.confidence, 0.9);
        assert!(!reviewed.auto_applicable);
        assert!(reviewed.reasoning.ends_with("Docs are generic."));
        assert_eq!(reviewed.suggested_content, "add(a, b, c)");
    }

    #[tokio::test]
    async fn test_unavailable_backend_degrades() {
        let reviewer = SemanticReviewer::new(Box::new(MockLlmClient::unavailable()));

        let reviewed = reviewer.review(&drift(), &suggestion()).await;
        assert!((reviewed.confidence - 0.35).abs() < 1e-9);
        assert!(reviewed.reasoning.contains("semantic review unavailable"));
        assert_eq!(reviewed.suggested_content, "add(a, b, c)");
    }

    #[tokio::test]
    async fn test_unparsable_reply_degrades() {
        let mut backend = MockLlmClient::new();
        backend.add_response("Adding", "I cannot answer that.");
        let reviewer = SemanticReviewer::new(Box::new(backend));

        let reviewed = reviewer.review(&drift(), &suggestion()).await;
        assert!((reviewed.confidence - 0.35).abs() < 1e-9);
    }
}
