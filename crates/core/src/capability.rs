use serde::{Deserialize, Serialize};

/// Static description of one reasoning capability: which intents it serves
/// and how it ranks when several capabilities answer the same turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    /// Unique tag, e.g. "faq", "assessment", "personalization".
    pub tag: String,
    /// Human-readable description.
    pub description: String,
    /// Intent tags this capability serves.
    pub intents: Vec<String>,
    /// Priority weight for reconciliation tie-breaking; higher wins.
    pub priority: u8,
    /// The registry requires exactly one default handler.
    #[serde(default)]
    pub is_fallback: bool,
}

impl CapabilityDescriptor {
    pub fn new(tag: &str, description: &str) -> Self {
        Self {
            tag: tag.to_string(),
            description: description.to_string(),
            intents: Vec::new(),
            priority: 0,
            is_fallback: false,
        }
    }

    pub fn with_intents(mut self, intents: &[&str]) -> Self {
        self.intents = intents.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn as_fallback(mut self) -> Self {
        self.is_fallback = true;
        self
    }

    pub fn serves(&self, intent: &str) -> bool {
        self.intents.iter().any(|i| i == intent)
    }
}
