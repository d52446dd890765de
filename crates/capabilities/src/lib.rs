pub mod assessment;
pub mod curation;
pub mod faq;
pub mod fallback;
pub mod personalization;
pub mod registry;

use async_trait::async_trait;
use rampup_core::{CapabilityDescriptor, EvidenceSnippet, ReplyFragment, Result, Turn, UserProfile};
use rampup_providers::Provider;
use std::sync::Arc;

/// Everything a capability may see for one turn. Capabilities are read-only
/// with respect to session state; profile changes travel back as a delta
/// inside the returned fragment.
#[derive(Debug, Clone)]
pub struct CapabilityRequest {
    pub text: String,
    pub profile: UserProfile,
    /// Recent turns, oldest first, for conversational context.
    pub recent_turns: Vec<Turn>,
    /// Evidence retrieved for this turn, relevance-descending.
    pub evidence: Vec<EvidenceSnippet>,
    /// Maximum citations a fragment should carry.
    pub evidence_budget: usize,
    pub company: String,
}

impl CapabilityRequest {
    pub fn evidence_slice(&self) -> &[EvidenceSnippet] {
        let end = self.evidence.len().min(self.evidence_budget);
        &self.evidence[..end]
    }
}

/// One specialized reasoning unit. A closed set of implementations is
/// registered at startup; new capabilities extend the set without touching
/// the orchestrator control flow.
#[async_trait]
pub trait Capability: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;
    async fn handle(&self, request: &CapabilityRequest) -> Result<ReplyFragment>;
}

pub use registry::{CapabilityRegistry, RegistryBuilder};

/// The builtin capability set wired into a registry. The provider is
/// optional: without one, the provider-backed capabilities report
/// `AgentUnavailable` and the fallback answers extractively from evidence.
pub fn builtin_registry(provider: Option<Arc<dyn Provider>>) -> Result<CapabilityRegistry> {
    RegistryBuilder::new()
        .register(Arc::new(faq::FaqCapability::new(provider.clone())))
        .register(Arc::new(assessment::AssessmentCapability::new()))
        .register(Arc::new(personalization::PersonalizationCapability::new()))
        .register(Arc::new(curation::ContentCurationCapability::new()))
        .register(Arc::new(fallback::FallbackCapability::new(provider)))
        .build()
}
