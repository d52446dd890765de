use async_trait::async_trait;
use rampup_core::{CapabilityDescriptor, ReplyFragment, Result, SuggestedAction};

use crate::{Capability, CapabilityRequest};

#[derive(Debug, Clone)]
pub struct ContentItem {
    pub name: &'static str,
    pub kind: &'static str,
    pub duration_min: u32,
}

#[derive(Debug, Clone)]
pub struct ContentCategory {
    pub key: &'static str,
    pub title: &'static str,
    pub items: &'static [ContentItem],
}

pub const CATEGORIES: &[ContentCategory] = &[
    ContentCategory {
        key: "company_culture",
        title: "Company Culture & Values",
        items: &[
            ContentItem { name: "Welcome Video", kind: "video", duration_min: 15 },
            ContentItem { name: "Mission & Vision", kind: "document", duration_min: 10 },
            ContentItem { name: "Company History", kind: "article", duration_min: 8 },
        ],
    },
    ContentCategory {
        key: "technical",
        title: "Technical Resources",
        items: &[
            ContentItem { name: "Development Setup Guide", kind: "guide", duration_min: 30 },
            ContentItem { name: "Architecture Overview", kind: "video", duration_min: 45 },
            ContentItem { name: "Best Practices", kind: "document", duration_min: 20 },
        ],
    },
    ContentCategory {
        key: "policies",
        title: "Policies & Procedures",
        items: &[
            ContentItem { name: "Employee Handbook", kind: "document", duration_min: 30 },
            ContentItem { name: "Code of Conduct", kind: "document", duration_min: 15 },
            ContentItem { name: "Security Policies", kind: "document", duration_min: 20 },
        ],
    },
    ContentCategory {
        key: "tools",
        title: "Tools & Systems",
        items: &[
            ContentItem { name: "Slack Guide", kind: "guide", duration_min: 10 },
            ContentItem { name: "Project Management Tools", kind: "video", duration_min: 15 },
            ContentItem { name: "Communication Best Practices", kind: "article", duration_min: 12 },
        ],
    },
];

pub fn category(key: &str) -> Option<&'static ContentCategory> {
    CATEGORIES.iter().find(|c| c.key == key)
}

/// Word-level match over the static catalog; the FTS index covers the
/// ingested corpus, this covers the curated one. Words under three
/// characters are too noisy to match on.
pub fn search_catalog(query: &str) -> Vec<&'static ContentItem> {
    let words: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return Vec::new();
    }
    CATEGORIES
        .iter()
        .flat_map(|c| c.items.iter())
        .filter(|item| {
            let name = item.name.to_lowercase();
            words.iter().any(|w| name.contains(w.as_str()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub name: &'static str,
    pub reason: &'static str,
}

pub fn recommendations_for(role: &str, turns_so_far: usize) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let role = role.to_lowercase();
    if role.contains("engineer") || role.contains("developer") {
        recs.push(Recommendation {
            name: "Code Review Best Practices",
            reason: "Essential for engineers",
        });
        recs.push(Recommendation {
            name: "System Architecture Deep Dive",
            reason: "Understanding our stack",
        });
    }
    if role.contains("sales") {
        recs.push(Recommendation {
            name: "Product Demo Training",
            reason: "Core sales skill",
        });
        recs.push(Recommendation {
            name: "Customer Success Stories",
            reason: "Learn from wins",
        });
    }
    // Early in onboarding everyone gets the basics.
    if turns_so_far < 6 {
        recs.push(Recommendation {
            name: "Getting Started Guide",
            reason: "Start with the basics",
        });
    }
    recs
}

/// Surfaces curated onboarding content and per-role recommendations,
/// blending in whatever the document index retrieved for the turn.
pub struct ContentCurationCapability {
    descriptor: CapabilityDescriptor,
}

impl ContentCurationCapability {
    pub fn new() -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "curation",
                "Recommends and organizes onboarding content",
            )
            .with_intents(&["content", "resources", "library"])
            .with_priority(35),
        }
    }
}

impl Default for ContentCurationCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for ContentCurationCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &CapabilityRequest) -> Result<ReplyFragment> {
        let role = request.profile.role.as_deref().unwrap_or("employee");
        let recs = recommendations_for(role, request.recent_turns.len());

        let mut text = String::from("Recommended for you:\n");
        for rec in &recs {
            text.push_str(&format!("- {} ({})\n", rec.name, rec.reason));
        }

        let matched = search_catalog(&request.text);
        if !matched.is_empty() {
            text.push_str("\nFrom the content library:\n");
            for item in matched.iter().take(3) {
                text.push_str(&format!(
                    "- {} ({}, {} min)\n",
                    item.name, item.kind, item.duration_min
                ));
            }
        }

        let evidence = request.evidence_slice().to_vec();
        if !evidence.is_empty() {
            text.push_str("\nRelated documents:\n");
            for snippet in &evidence {
                text.push_str(&format!("- {}\n", snippet.title));
            }
        }

        let confidence = if recs.is_empty() && matched.is_empty() { 0.4 } else { 0.65 };

        Ok(ReplyFragment::new("curation", text.trim_end(), confidence)
            .with_citations(evidence)
            .with_actions(vec![SuggestedAction::new(
                "Browse the content library",
                "browse_library",
            )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampup_core::UserProfile;

    #[test]
    fn test_category_lookup() {
        assert_eq!(category("technical").unwrap().items.len(), 3);
        assert!(category("nope").is_none());
    }

    #[test]
    fn test_search_catalog() {
        let hits = search_catalog("guide");
        assert!(hits.iter().any(|i| i.name == "Development Setup Guide"));
        assert!(hits.iter().any(|i| i.name == "Slack Guide"));
        assert!(search_catalog("zzz").is_empty());
    }

    #[test]
    fn test_search_catalog_natural_language() {
        // A whole-sentence turn still finds the item it names.
        let hits = search_catalog("where is the employee handbook?");
        assert!(hits.iter().any(|i| i.name == "Employee Handbook"));
        assert!(search_catalog("is it ok").is_empty());
    }

    #[test]
    fn test_recommendations_by_role_and_progress() {
        let recs = recommendations_for("engineer", 0);
        assert!(recs.iter().any(|r| r.name == "Code Review Best Practices"));
        assert!(recs.iter().any(|r| r.name == "Getting Started Guide"));

        // Past the early-onboarding window the basics drop off.
        let later = recommendations_for("engineer", 10);
        assert!(later.iter().all(|r| r.name != "Getting Started Guide"));
    }

    #[tokio::test]
    async fn test_handle_blends_catalog_and_recommendations() {
        let cap = ContentCurationCapability::new();
        let mut profile = UserProfile::default();
        profile.role = Some("sales".to_string());
        let request = CapabilityRequest {
            text: "where is the employee handbook?".to_string(),
            profile,
            recent_turns: Vec::new(),
            evidence: Vec::new(),
            evidence_budget: 3,
            company: "Acme".to_string(),
        };
        let fragment = cap.handle(&request).await.unwrap();
        assert!(fragment.text.contains("Product Demo Training"));
        assert!(fragment.text.contains("Employee Handbook"));
    }
}
