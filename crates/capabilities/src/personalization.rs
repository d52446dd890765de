use async_trait::async_trait;
use once_cell::sync::Lazy;
use rampup_core::{CapabilityDescriptor, ProfileDelta, ReplyFragment, Result, SuggestedAction};
use regex::Regex;

use crate::{Capability, CapabilityRequest};

// Up to two modifier words between the article and the role, so
// "a senior software engineer" still yields the role.
static ROLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:i am|i'm|as)\s+(?:a|an)\s+(?:\w+\s+){0,2}(engineer|developer|sales(?:person)?|marketer|marketing|designer)\b")
        .expect("role regex is valid")
});

static EXPERIENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(senior|junior|beginner|intermediate)\b").expect("experience regex is valid")
});

const TECH_TAGS: &[&str] = &[
    "rust", "python", "java", "go", "typescript", "react", "kubernetes", "aws",
];

#[derive(Debug, Clone, Copy)]
struct LearningModule {
    name: &'static str,
    hours: u32,
    priority: &'static str,
}

/// Role-keyed learning paths. Static configuration, like the assessment
/// catalog: the module curriculum is company content, not behavior.
fn modules_for_role(role: &str) -> &'static [LearningModule] {
    const ENGINEER: &[LearningModule] = &[
        LearningModule { name: "Company Culture", hours: 2, priority: "high" },
        LearningModule { name: "Technical Stack Overview", hours: 4, priority: "high" },
        LearningModule { name: "Development Environment Setup", hours: 3, priority: "high" },
        LearningModule { name: "Code Review Process", hours: 2, priority: "medium" },
        LearningModule { name: "Deployment Procedures", hours: 2, priority: "medium" },
    ];
    const SALES: &[LearningModule] = &[
        LearningModule { name: "Company Culture", hours: 2, priority: "high" },
        LearningModule { name: "Product Knowledge", hours: 4, priority: "high" },
        LearningModule { name: "Sales Process & CRM", hours: 3, priority: "high" },
        LearningModule { name: "Customer Success Stories", hours: 2, priority: "medium" },
    ];
    const MARKETING: &[LearningModule] = &[
        LearningModule { name: "Company Culture", hours: 2, priority: "high" },
        LearningModule { name: "Brand Guidelines", hours: 3, priority: "high" },
        LearningModule { name: "Marketing Tools", hours: 2, priority: "high" },
        LearningModule { name: "Campaign Processes", hours: 2, priority: "medium" },
    ];
    const DEFAULT: &[LearningModule] = &[
        LearningModule { name: "Company Culture", hours: 2, priority: "high" },
        LearningModule { name: "Company Policies", hours: 1, priority: "high" },
        LearningModule { name: "Team Introduction", hours: 1, priority: "high" },
        LearningModule { name: "Tools & Systems", hours: 2, priority: "medium" },
    ];

    let role = role.to_lowercase();
    if role.contains("engineer") || role.contains("developer") {
        ENGINEER
    } else if role.contains("sales") {
        SALES
    } else if role.contains("marketing") || role.contains("marketer") {
        MARKETING
    } else {
        DEFAULT
    }
}

/// Adaptive learning paths and progress encouragement.
pub struct PersonalizationCapability {
    descriptor: CapabilityDescriptor,
}

impl PersonalizationCapability {
    pub fn new() -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "personalization",
                "Builds adaptive learning paths from the employee profile",
            )
            .with_intents(&["learning", "path", "progress"])
            .with_priority(40),
        }
    }

    /// Seniors skip the basics.
    pub fn learning_path(role: &str, experience: Option<&str>) -> Vec<LearningModuleView> {
        let senior = experience.is_some_and(|e| e.eq_ignore_ascii_case("senior"));
        modules_for_role(role)
            .iter()
            .filter(|m| !(senior && m.name == "Company Culture"))
            .map(|m| LearningModuleView {
                name: m.name.to_string(),
                hours: m.hours,
                priority: m.priority.to_string(),
            })
            .collect()
    }

    pub fn total_hours(path: &[LearningModuleView]) -> u32 {
        path.iter().map(|m| m.hours).sum()
    }

    fn encouragement(readiness: Option<u8>) -> &'static str {
        match readiness {
            None => "Let's start by finding out where you stand.",
            Some(score) if score < 30 => "Great start! Keep up the momentum.",
            Some(score) if score < 70 => {
                "You are halfway there! Take a moment to review what you have learned."
            }
            Some(_) => "Almost done! Prepare for your final assessment.",
        }
    }

    /// Profile facts volunteered in the turn text become a delta applied at
    /// commit; the capability itself never mutates the session.
    pub fn extract_delta(text: &str) -> ProfileDelta {
        let mut delta = ProfileDelta::default();

        if let Some(cap) = ROLE_RE.captures(text) {
            let role = cap[1].to_lowercase();
            let normalized = match role.as_str() {
                "developer" => "engineer",
                "salesperson" => "sales",
                "marketer" => "marketing",
                other => other,
            };
            delta.role = Some(normalized.to_string());
        }
        if let Some(cap) = EXPERIENCE_RE.captures(text) {
            delta.experience_level = Some(cap[1].to_lowercase());
        }
        let lower = text.to_lowercase();
        for tag in TECH_TAGS {
            if lower.contains(tag) {
                delta.tech_stack.push(tag.to_string());
            }
        }
        delta
    }
}

impl Default for PersonalizationCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearningModuleView {
    pub name: String,
    pub hours: u32,
    pub priority: String,
}

#[async_trait]
impl Capability for PersonalizationCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &CapabilityRequest) -> Result<ReplyFragment> {
        let delta = Self::extract_delta(&request.text);

        let role = delta
            .role
            .clone()
            .or_else(|| request.profile.role.clone())
            .unwrap_or_else(|| "employee".to_string());
        let experience = delta
            .experience_level
            .clone()
            .or_else(|| request.profile.experience_level.clone());

        let path = Self::learning_path(&role, experience.as_deref());
        let total = Self::total_hours(&path);

        let mut text = format!(
            "Here is your learning path as {} (about {} hours total):\n",
            role, total
        );
        for module in &path {
            text.push_str(&format!(
                "- {} ({} h, {} priority)\n",
                module.name, module.hours, module.priority
            ));
        }
        text.push_str(Self::encouragement(request.profile.readiness_score));

        // Stronger signal when the turn explicitly mentioned role/experience.
        let confidence = if delta.role.is_some() || request.profile.role.is_some() {
            0.75
        } else {
            0.55
        };

        let mut fragment = ReplyFragment::new("personalization", &text, confidence).with_actions(
            vec![SuggestedAction::new(
                "Start your first module",
                "start_module",
            )],
        );
        if !delta.is_empty() {
            fragment = fragment.with_profile_delta(delta);
        }
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampup_core::UserProfile;

    #[test]
    fn test_engineer_path() {
        let path = PersonalizationCapability::learning_path("Engineer", None);
        assert_eq!(path.len(), 5);
        assert_eq!(path[0].name, "Company Culture");
        assert_eq!(PersonalizationCapability::total_hours(&path), 13);
    }

    #[test]
    fn test_senior_skips_culture() {
        let path = PersonalizationCapability::learning_path("engineer", Some("senior"));
        assert!(path.iter().all(|m| m.name != "Company Culture"));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_unknown_role_gets_default_path() {
        let path = PersonalizationCapability::learning_path("chef", None);
        assert_eq!(path.len(), 4);
        assert!(path.iter().any(|m| m.name == "Company Policies"));
    }

    #[test]
    fn test_extract_delta_with_modified_role() {
        let delta =
            PersonalizationCapability::extract_delta("I am a senior software engineer here");
        assert_eq!(delta.role.as_deref(), Some("engineer"));
    }

    #[test]
    fn test_extract_delta_from_text() {
        let delta = PersonalizationCapability::extract_delta(
            "I'm a senior engineer working with rust and kubernetes",
        );
        assert_eq!(delta.role.as_deref(), Some("engineer"));
        assert_eq!(delta.experience_level.as_deref(), Some("senior"));
        assert!(delta.tech_stack.contains(&"rust".to_string()));
        assert!(delta.tech_stack.contains(&"kubernetes".to_string()));
    }

    #[tokio::test]
    async fn test_handle_carries_delta() {
        let cap = PersonalizationCapability::new();
        let request = CapabilityRequest {
            text: "I'm an engineer, what should I learn first?".to_string(),
            profile: UserProfile::default(),
            recent_turns: Vec::new(),
            evidence: Vec::new(),
            evidence_budget: 3,
            company: "Acme".to_string(),
        };
        let fragment = cap.handle(&request).await.unwrap();
        assert_eq!(fragment.capability, "personalization");
        assert!(fragment.text.contains("Technical Stack Overview"));
        let delta = fragment.profile_delta.unwrap();
        assert_eq!(delta.role.as_deref(), Some("engineer"));
    }
}
