use async_trait::async_trait;
use rampup_core::types::ChatMessage;
use rampup_core::{CapabilityDescriptor, Error, ReplyFragment, Result};
use rampup_providers::Provider;
use std::sync::Arc;
use tracing::debug;

use crate::{Capability, CapabilityRequest};

/// Grounded Q&A over the ingested onboarding corpus. The model is
/// constrained to the retrieved snippets; answers carry their citations.
pub struct FaqCapability {
    descriptor: CapabilityDescriptor,
    provider: Option<Arc<dyn Provider>>,
}

impl FaqCapability {
    pub fn new(provider: Option<Arc<dyn Provider>>) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "faq",
                "Answers onboarding questions grounded in company documents",
            )
            .with_intents(&["question", "howto", "policy"])
            .with_priority(50),
            provider,
        }
    }

    fn build_messages(&self, request: &CapabilityRequest) -> Vec<ChatMessage> {
        let mut system = format!(
            "You are the onboarding assistant for {}. Answer the employee's \
             question concisely. Use only the provided document excerpts; if \
             they do not contain the answer, say so and suggest contacting a \
             manager or IT.",
            request.company
        );

        let evidence = request.evidence_slice();
        if !evidence.is_empty() {
            system.push_str("\n\nDocument excerpts:\n");
            for (i, snippet) in evidence.iter().enumerate() {
                system.push_str(&format!(
                    "[{}] {} — {}\n",
                    i + 1,
                    snippet.title,
                    snippet.excerpt
                ));
            }
        }

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
        messages
    }
}

#[async_trait]
impl Capability for FaqCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &CapabilityRequest) -> Result<ReplyFragment> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::AgentUnavailable("faq: no provider configured".to_string()))?;

        let messages = self.build_messages(request);
        let answer = provider
            .complete(&messages)
            .await
            .map_err(|e| Error::AgentUnavailable(format!("faq: {}", e)))?;

        let evidence = request.evidence_slice().to_vec();
        let confidence = if evidence.is_empty() { 0.5 } else { 0.8 };
        debug!(citations = evidence.len(), "faq answered");

        Ok(ReplyFragment::new("faq", answer.trim(), confidence).with_citations(evidence))
    }
}
