use rampup_core::{CapabilityDescriptor, Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

use crate::Capability;

/// Static capability mapping, built once at process start and shared behind
/// an `Arc`. Reads are unsynchronized; there is no runtime mutation.
pub struct CapabilityRegistry {
    capabilities: Vec<Arc<dyn Capability>>,
    fallback: Arc<dyn Capability>,
}

pub struct RegistryBuilder {
    capabilities: Vec<Arc<dyn Capability>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            capabilities: Vec::new(),
        }
    }

    pub fn register(mut self, capability: Arc<dyn Capability>) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Validation happens here, not at resolve time: duplicate tags and a
    /// missing default handler are configuration errors.
    pub fn build(self) -> Result<CapabilityRegistry> {
        let mut seen = HashSet::new();
        for cap in &self.capabilities {
            let tag = &cap.descriptor().tag;
            if !seen.insert(tag.clone()) {
                return Err(Error::Config(format!("duplicate capability tag: {}", tag)));
            }
        }

        let fallback = self
            .capabilities
            .iter()
            .find(|c| c.descriptor().is_fallback)
            .cloned()
            .ok_or_else(|| Error::Config("no fallback capability registered".to_string()))?;

        Ok(CapabilityRegistry {
            capabilities: self.capabilities,
            fallback,
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    /// Capabilities serving the given tag, priority-descending. Never empty:
    /// with no specific match the default handler is returned.
    pub fn resolve(&self, tag: &str) -> Vec<Arc<dyn Capability>> {
        let mut matches: Vec<Arc<dyn Capability>> = self
            .capabilities
            .iter()
            .filter(|c| {
                let desc = c.descriptor();
                desc.tag == tag || desc.serves(tag)
            })
            .cloned()
            .collect();

        if matches.is_empty() {
            return vec![self.fallback.clone()];
        }

        matches.sort_by(|a, b| b.descriptor().priority.cmp(&a.descriptor().priority));
        matches
    }

    pub fn fallback(&self) -> Arc<dyn Capability> {
        self.fallback.clone()
    }

    pub fn descriptors(&self) -> Vec<&CapabilityDescriptor> {
        self.capabilities.iter().map(|c| c.descriptor()).collect()
    }

    /// All tags known to the registry, for the router rule table and the
    /// model classifier prompt.
    pub fn tags(&self) -> Vec<String> {
        self.capabilities
            .iter()
            .map(|c| c.descriptor().tag.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CapabilityRequest;
    use async_trait::async_trait;
    use rampup_core::ReplyFragment;

    struct StubCapability {
        descriptor: CapabilityDescriptor,
    }

    impl StubCapability {
        fn new(descriptor: CapabilityDescriptor) -> Arc<dyn Capability> {
            Arc::new(Self { descriptor })
        }
    }

    #[async_trait]
    impl Capability for StubCapability {
        fn descriptor(&self) -> &CapabilityDescriptor {
            &self.descriptor
        }

        async fn handle(&self, _request: &CapabilityRequest) -> rampup_core::Result<ReplyFragment> {
            Ok(ReplyFragment::new(&self.descriptor.tag, "stub", 0.5))
        }
    }

    fn registry() -> CapabilityRegistry {
        RegistryBuilder::new()
            .register(StubCapability::new(
                CapabilityDescriptor::new("faq", "faq")
                    .with_intents(&["question"])
                    .with_priority(50),
            ))
            .register(StubCapability::new(
                CapabilityDescriptor::new("assessment", "assessment")
                    .with_intents(&["question", "quiz"])
                    .with_priority(45),
            ))
            .register(StubCapability::new(
                CapabilityDescriptor::new("general", "fallback")
                    .with_priority(10)
                    .as_fallback(),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_priority_order() {
        let registry = registry();
        let resolved = registry.resolve("question");
        let tags: Vec<&str> = resolved.iter().map(|c| c.descriptor().tag.as_str()).collect();
        assert_eq!(tags, vec!["faq", "assessment"]);
    }

    #[test]
    fn test_resolve_never_empty() {
        let registry = registry();
        let resolved = registry.resolve("no-such-intent");
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].descriptor().is_fallback);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let result = RegistryBuilder::new()
            .register(StubCapability::new(CapabilityDescriptor::new("faq", "a")))
            .register(StubCapability::new(CapabilityDescriptor::new("faq", "b")))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_fallback_rejected() {
        let result = RegistryBuilder::new()
            .register(StubCapability::new(CapabilityDescriptor::new("faq", "a")))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
