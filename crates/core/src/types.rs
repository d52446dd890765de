use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// A retrieved document excerpt used to ground an answer.
/// Never mutated after retrieval; owned by the turn that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceSnippet {
    pub source_id: String,
    pub title: String,
    pub excerpt: String,
    /// Relevance in [0, 1], comparable within one retrieval call only.
    pub score: f64,
    pub retrieved_at_ms: i64,
}

/// A follow-up action suggested alongside a reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestedAction {
    pub label: String,
    pub action: String,
}

impl SuggestedAction {
    pub fn new(label: &str, action: &str) -> Self {
        Self {
            label: label.to_string(),
            action: action.to_string(),
        }
    }
}

/// One exchange unit within a session. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    #[serde(default)]
    pub intents: Vec<String>,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<EvidenceSnippet>,
    /// Reconciliation alternatives that lost to the primary reply, kept on
    /// the assistant turn for audit rather than silently dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<SuppressedFragment>,
}

impl Turn {
    pub fn user(content: &str, now_ms: i64) -> Self {
        Self {
            speaker: Speaker::User,
            content: content.to_string(),
            intents: Vec::new(),
            timestamp_ms: now_ms,
            citations: Vec::new(),
            suppressed: Vec::new(),
        }
    }

    pub fn assistant(content: &str, now_ms: i64) -> Self {
        Self {
            speaker: Speaker::Assistant,
            content: content.to_string(),
            intents: Vec::new(),
            timestamp_ms: now_ms,
            citations: Vec::new(),
            suppressed: Vec::new(),
        }
    }

    pub fn with_intents(mut self, intents: Vec<String>) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_citations(mut self, citations: Vec<EvidenceSnippet>) -> Self {
        self.citations = citations;
        self
    }

    pub fn with_suppressed(mut self, suppressed: Vec<SuppressedFragment>) -> Self {
        self.suppressed = suppressed;
        self
    }
}

/// Resolved employee profile attached to a session.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub learning_style: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    /// Readiness score in [0, 100]; None means "not yet assessed".
    #[serde(default)]
    pub readiness_score: Option<u8>,
}

impl UserProfile {
    /// Out-of-range scores are rejected, never clamped.
    pub fn set_readiness_score(&mut self, score: u8) -> Result<()> {
        if score > 100 {
            return Err(Error::Validation(format!(
                "readiness score {} out of range [0, 100]",
                score
            )));
        }
        self.readiness_score = Some(score);
        Ok(())
    }

    pub fn apply(&mut self, delta: &ProfileDelta) -> Result<()> {
        if let Some(role) = &delta.role {
            self.role = Some(role.clone());
        }
        if let Some(team) = &delta.team {
            self.team = Some(team.clone());
        }
        for tag in &delta.tech_stack {
            if !self.tech_stack.contains(tag) {
                self.tech_stack.push(tag.clone());
            }
        }
        if let Some(style) = &delta.learning_style {
            self.learning_style = Some(style.clone());
        }
        if let Some(level) = &delta.experience_level {
            self.experience_level = Some(level.clone());
        }
        if let Some(score) = delta.readiness_score {
            self.set_readiness_score(score)?;
        }
        Ok(())
    }
}

/// Partial profile update. Applied atomically at turn commit.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub learning_style: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub readiness_score: Option<u8>,
}

impl ProfileDelta {
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.team.is_none()
            && self.tech_stack.is_empty()
            && self.learning_style.is_none()
            && self.experience_level.is_none()
            && self.readiness_score.is_none()
    }

    /// Later deltas win field-by-field; tech-stack tags accumulate.
    pub fn merge(&mut self, other: ProfileDelta) {
        if other.role.is_some() {
            self.role = other.role;
        }
        if other.team.is_some() {
            self.team = other.team;
        }
        for tag in other.tech_stack {
            if !self.tech_stack.contains(&tag) {
                self.tech_stack.push(tag);
            }
        }
        if other.learning_style.is_some() {
            self.learning_style = other.learning_style;
        }
        if other.experience_level.is_some() {
            self.experience_level = other.experience_level;
        }
        if other.readiness_score.is_some() {
            self.readiness_score = other.readiness_score;
        }
    }
}

/// Per-user conversation state. Owned exclusively by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    pub profile: UserProfile,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Session {
    pub fn new(id: &str, now_ms: i64) -> Self {
        Self {
            id: id.to_string(),
            turns: Vec::new(),
            profile: UserProfile::default(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn is_idle_expired(&self, now_ms: i64, idle_timeout_secs: u64) -> bool {
        now_ms.saturating_sub(self.updated_at_ms) > (idle_timeout_secs as i64) * 1000
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// A candidate reply proposed by one capability. Capabilities never mutate
/// session state; profile changes travel as a delta inside the fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyFragment {
    pub capability: String,
    pub text: String,
    /// Agent-reported confidence in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub citations: Vec<EvidenceSnippet>,
    #[serde(default)]
    pub actions: Vec<SuggestedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_delta: Option<ProfileDelta>,
}

impl ReplyFragment {
    pub fn new(capability: &str, text: &str, confidence: f64) -> Self {
        Self {
            capability: capability.to_string(),
            text: text.to_string(),
            confidence,
            citations: Vec::new(),
            actions: Vec::new(),
            profile_delta: None,
        }
    }

    pub fn with_citations(mut self, citations: Vec<EvidenceSnippet>) -> Self {
        self.citations = citations;
        self
    }

    pub fn with_actions(mut self, actions: Vec<SuggestedAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_profile_delta(mut self, delta: ProfileDelta) -> Self {
        self.profile_delta = Some(delta);
        self
    }
}

/// Why a fragment was suppressed during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    LowerPriority,
    LowerConfidence,
    AgentFailed,
}

/// A losing fragment, retained for audit/analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressedFragment {
    pub capability: String,
    pub text: String,
    pub reason: SuppressReason,
}

/// The finalized reply for one turn, consumed once by the response composer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredReply {
    pub text: String,
    pub citations: Vec<EvidenceSnippet>,
    pub actions: Vec<SuggestedAction>,
    /// Capabilities that contributed, primary first.
    pub capabilities: Vec<String>,
    pub suppressed: Vec<SuppressedFragment>,
    /// True when the turn was answered without grounding evidence.
    pub degraded: bool,
}

impl StructuredReply {
    pub fn from_fragment(fragment: &ReplyFragment) -> Self {
        Self {
            text: fragment.text.clone(),
            citations: fragment.citations.clone(),
            actions: fragment.actions.clone(),
            capabilities: vec![fragment.capability.clone()],
            suppressed: Vec::new(),
            degraded: false,
        }
    }
}

/// A chat message sent to the model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_score_bounds() {
        let mut profile = UserProfile::default();
        assert!(profile.set_readiness_score(0).is_ok());
        assert!(profile.set_readiness_score(100).is_ok());
        assert_eq!(profile.readiness_score, Some(100));

        let err = profile.set_readiness_score(101).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // Rejected, not clamped: previous value stays.
        assert_eq!(profile.readiness_score, Some(100));
    }

    #[test]
    fn test_profile_delta_apply() {
        let mut profile = UserProfile::default();
        let delta = ProfileDelta {
            role: Some("engineer".to_string()),
            tech_stack: vec!["rust".to_string()],
            readiness_score: Some(55),
            ..Default::default()
        };
        profile.apply(&delta).unwrap();
        assert_eq!(profile.role.as_deref(), Some("engineer"));
        assert_eq!(profile.tech_stack, vec!["rust"]);
        assert_eq!(profile.readiness_score, Some(55));

        // Invalid score rejects the delta field.
        let bad = ProfileDelta {
            readiness_score: Some(200),
            ..Default::default()
        };
        assert!(profile.apply(&bad).is_err());
    }

    #[test]
    fn test_profile_delta_merge() {
        let mut a = ProfileDelta {
            role: Some("engineer".to_string()),
            tech_stack: vec!["rust".to_string()],
            ..Default::default()
        };
        let b = ProfileDelta {
            role: Some("sales".to_string()),
            tech_stack: vec!["rust".to_string(), "python".to_string()],
            ..Default::default()
        };
        a.merge(b);
        assert_eq!(a.role.as_deref(), Some("sales"));
        assert_eq!(a.tech_stack, vec!["rust", "python"]);
    }

    #[test]
    fn test_session_idle_expiry() {
        let session = Session::new("s1", 0);
        assert!(!session.is_idle_expired(1_000, 60));
        assert!(session.is_idle_expired(61_001, 60));
    }
}
