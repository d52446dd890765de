use async_trait::async_trait;
use rampup_core::types::ChatMessage;
use rampup_core::{CapabilityDescriptor, Error, ReplyFragment, Result};
use rampup_providers::Provider;
use std::sync::Arc;
use tracing::debug;

use crate::{Capability, CapabilityRequest};

/// Handler of last resort. With a provider it answers generically; without
/// one it quotes the best retrieved excerpt so the turn still gets a
/// grounded reply instead of an error.
pub struct FallbackCapability {
    descriptor: CapabilityDescriptor,
    provider: Option<Arc<dyn Provider>>,
}

impl FallbackCapability {
    pub fn new(provider: Option<Arc<dyn Provider>>) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "general",
                "General onboarding conversation when no specialist matches",
            )
            .with_priority(10)
            .as_fallback(),
            provider,
        }
    }

    fn extractive_answer(request: &CapabilityRequest) -> Option<String> {
        let snippet = request.evidence_slice().first()?;
        Some(format!(
            "I found this in \"{}\":\n{}",
            snippet.title, snippet.excerpt
        ))
    }
}

#[async_trait]
impl Capability for FallbackCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &CapabilityRequest) -> Result<ReplyFragment> {
        if let Some(provider) = &self.provider {
            let system = format!(
                "You are the onboarding assistant for {}. Be helpful and \
                 concise. If a question is outside onboarding, point the \
                 employee to their manager or HR.",
                request.company
            );
            let mut messages = vec![ChatMessage::system(&system)];
            for turn in &request.recent_turns {
                match turn.speaker {
                    rampup_core::Speaker::User => messages.push(ChatMessage::user(&turn.content)),
                    rampup_core::Speaker::Assistant => {
                        messages.push(ChatMessage::assistant(&turn.content))
                    }
                }
            }
            messages.push(ChatMessage::user(&request.text));

            match provider.complete(&messages).await {
                Ok(answer) => {
                    return Ok(ReplyFragment::new("general", answer.trim(), 0.5)
                        .with_citations(request.evidence_slice().to_vec()))
                }
                Err(e) => debug!(error = %e, "fallback provider call failed"),
            }
        }

        if let Some(text) = Self::extractive_answer(request) {
            return Ok(ReplyFragment::new("general", &text, 0.35)
                .with_citations(request.evidence_slice().to_vec()));
        }

        Err(Error::AgentUnavailable(
            "general: no provider and no evidence to answer from".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampup_core::{EvidenceSnippet, UserProfile};

    fn request(evidence: Vec<EvidenceSnippet>) -> CapabilityRequest {
        CapabilityRequest {
            text: "tell me about parking".to_string(),
            profile: UserProfile::default(),
            recent_turns: Vec::new(),
            evidence,
            evidence_budget: 3,
            company: "Acme".to_string(),
        }
    }

    #[tokio::test]
    async fn test_extractive_without_provider() {
        let cap = FallbackCapability::new(None);
        let fragment = cap
            .handle(&request(vec![EvidenceSnippet {
                source_id: "facilities/parking.md".to_string(),
                title: "Parking".to_string(),
                excerpt: "Badge in at the garage on level B1.".to_string(),
                score: 0.7,
                retrieved_at_ms: 0,
            }]))
            .await
            .unwrap();
        assert!(fragment.text.contains("level B1"));
        assert_eq!(fragment.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_no_provider_no_evidence_fails() {
        let cap = FallbackCapability::new(None);
        let err = cap.handle(&request(Vec::new())).await.unwrap_err();
        assert!(matches!(err, Error::AgentUnavailable(_)));
    }

    #[test]
    fn test_is_fallback_descriptor() {
        let cap = FallbackCapability::new(None);
        assert!(cap.descriptor().is_fallback);
        assert_eq!(cap.descriptor().tag, "general");
    }
}
