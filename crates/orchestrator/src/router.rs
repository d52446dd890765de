use rampup_core::config::RouterConfig;
use rampup_core::types::ChatMessage;
use rampup_core::{Result, UserProfile};
use rampup_providers::Provider;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// One scoring rule for an intent tag. A hit on any pattern scores higher
/// than keyword hits; negative keywords veto the rule outright.
struct RouteRule {
    tag: &'static str,
    keywords: Vec<&'static str>,
    patterns: Vec<Regex>,
    negative: Vec<&'static str>,
}

/// Outcome of routing one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    /// Tags to dispatch, best first. Never empty.
    pub tags: Vec<String>,
    /// Confidence of the best tag.
    pub confidence: f64,
    /// True when the model classifier decided the route.
    pub used_model: bool,
}

/// Two-stage intent router: a deterministic rule pass first, and a model
/// classifier only when the rule pass stays under the confidence threshold.
/// Without a provider the rule result stands, whatever its confidence.
pub struct IntentRouter {
    rules: Vec<RouteRule>,
    config: RouterConfig,
    provider: Option<Arc<dyn Provider>>,
    known_tags: Vec<String>,
}

impl IntentRouter {
    pub fn new(
        config: RouterConfig,
        provider: Option<Arc<dyn Provider>>,
        known_tags: Vec<String>,
    ) -> Self {
        let rules = vec![
            RouteRule {
                tag: "faq",
                keywords: vec![
                    "how do i", "how to", "what is", "where", "when", "policy",
                    "benefits", "vacation", "pto", "holiday", "payroll", "vpn",
                    "badge", "laptop", "expense", "insurance", "hr",
                ],
                patterns: vec![
                    Regex::new(r"(?i)\?\s*$").expect("faq pattern is valid"),
                    Regex::new(r"(?i)^(who|what|where|when|why|how|can i|do we|is there)\b")
                        .expect("faq pattern is valid"),
                ],
                negative: vec![],
            },
            RouteRule {
                tag: "assessment",
                keywords: vec![
                    "assessment", "quiz", "test", "exam", "evaluate", "evaluation",
                    "readiness", "score", "grade", "certification", "skills check",
                ],
                patterns: vec![],
                negative: vec!["test environment", "unit test", "test account"],
            },
            RouteRule {
                tag: "personalization",
                keywords: vec![
                    "learning path", "learning plan", "curriculum", "what should i learn",
                    "my progress", "next module", "study plan", "training plan",
                    "i am a", "i'm a", "my role",
                ],
                patterns: vec![Regex::new(r"(?i)\b(i am|i'm)\s+(?:a|an)\s+\w+")
                    .expect("personalization pattern is valid")],
                negative: vec![],
            },
            RouteRule {
                tag: "curation",
                keywords: vec![
                    "content", "resources", "materials", "documents", "library",
                    "videos", "reading", "recommend", "recommendation", "handbook",
                    "guide", "watch", "browse",
                ],
                patterns: vec![],
                negative: vec![],
            },
        ];

        Self {
            rules,
            config,
            provider,
            known_tags,
        }
    }

    /// Deterministic rule pass: per-tag confidence in [0, 1].
    fn rule_scores(&self, input: &str) -> Vec<(String, f64)> {
        let input_lower = input.to_lowercase();
        let mut scores = Vec::new();

        for rule in &self.rules {
            if rule
                .negative
                .iter()
                .any(|neg| input_lower.contains(&neg.to_lowercase()))
            {
                continue;
            }

            let pattern_hit = rule.patterns.iter().any(|p| p.is_match(input));
            let keyword_hits = rule
                .keywords
                .iter()
                .filter(|k| input_lower.contains(&k.to_lowercase()))
                .count();

            if !pattern_hit && keyword_hits == 0 {
                continue;
            }

            // A keyword is a stronger signal than a shape pattern; extra
            // hits raise confidence with diminishing returns.
            let mut score: f64 = 0.0;
            if keyword_hits > 0 {
                score = 0.6 + 0.1 * (keyword_hits.saturating_sub(1) as f64);
            }
            if pattern_hit {
                score = f64::max(score + 0.15, 0.5);
            }
            scores.push((rule.tag.to_string(), score.min(0.95)));
        }

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores
    }

    /// Route one turn against the session's profile snapshot. Tags within
    /// `tie_epsilon` of the best score are all dispatched; an empty rule
    /// pass falls through to the default tag.
    pub async fn route(&self, input: &str, profile: &UserProfile) -> Result<RouteDecision> {
        let scores = self.rule_scores(input);

        let best = scores.first().map(|(_, s)| *s).unwrap_or(0.0);
        if best >= self.config.confidence_threshold {
            let tags = self.tie_window(&scores, best);
            debug!(?tags, confidence = best, "Routed by rules");
            return Ok(RouteDecision {
                tags,
                confidence: best,
                used_model: false,
            });
        }

        // Below the threshold the model classifier gets one shot. Any
        // provider failure leaves the rule result in charge.
        if self.config.use_model_fallback {
            if let Some(provider) = &self.provider {
                match self
                    .classify_with_model(provider.as_ref(), input, profile)
                    .await
                {
                    Ok(Some(tag)) => {
                        debug!(tag = %tag, "Routed by model classifier");
                        return Ok(RouteDecision {
                            confidence: self.config.confidence_threshold,
                            tags: vec![tag],
                            used_model: true,
                        });
                    }
                    Ok(None) => debug!("Model classifier returned no known tag"),
                    Err(e) => warn!(error = %e, "Model classifier failed, using rule result"),
                }
            }
        }

        if scores.is_empty() {
            return Ok(RouteDecision {
                tags: vec!["general".to_string()],
                confidence: 0.0,
                used_model: false,
            });
        }

        // Rule-only mode keeps the tie window: a low-confidence tie still
        // dispatches every tied tag.
        let tags = self.tie_window(&scores, best);
        debug!(?tags, confidence = best, "Routed by rules below threshold");
        Ok(RouteDecision {
            tags,
            confidence: best,
            used_model: false,
        })
    }

    fn tie_window(&self, scores: &[(String, f64)], best: f64) -> Vec<String> {
        scores
            .iter()
            .filter(|(_, s)| best - s <= self.config.tie_epsilon)
            .map(|(t, _)| t.clone())
            .collect()
    }

    async fn classify_with_model(
        &self,
        provider: &dyn Provider,
        input: &str,
        profile: &UserProfile,
    ) -> Result<Option<String>> {
        let mut system = format!(
            "Classify the employee message into exactly one of these intents: \
             {}. Reply with the intent name only, nothing else.",
            self.known_tags.join(", ")
        );
        if let Some(role) = &profile.role {
            system.push_str(&format!(" The employee's role is {}.", role));
        }
        let messages = vec![ChatMessage::system(&system), ChatMessage::user(input)];
        let answer = provider.complete(&messages).await?;
        let answer = answer.trim().to_lowercase();

        Ok(self
            .known_tags
            .iter()
            .find(|t| t.to_lowercase() == answer)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rampup_core::Error;

    fn router() -> IntentRouter {
        IntentRouter::new(
            RouterConfig::default(),
            None,
            vec![
                "faq".to_string(),
                "assessment".to_string(),
                "personalization".to_string(),
                "curation".to_string(),
                "general".to_string(),
            ],
        )
    }

    #[tokio::test]
    async fn test_faq_routing() {
        let decision = router()
            .route("What is the vacation policy?", &UserProfile::default())
            .await
            .unwrap();
        assert_eq!(decision.tags[0], "faq");
        assert!(decision.confidence >= 0.55);
        assert!(!decision.used_model);
    }

    #[tokio::test]
    async fn test_assessment_routing() {
        let decision = router()
            .route("I want to take the readiness quiz", &UserProfile::default())
            .await
            .unwrap();
        assert_eq!(decision.tags[0], "assessment");
    }

    #[tokio::test]
    async fn test_negative_keyword_vetoes() {
        let decision = router()
            .route(
                "how do I get a test account for staging",
                &UserProfile::default(),
            )
            .await
            .unwrap();
        assert!(!decision.tags.contains(&"assessment".to_string()));
    }

    #[tokio::test]
    async fn test_no_match_falls_back_to_general() {
        let decision = router().route("blorp", &UserProfile::default()).await.unwrap();
        assert_eq!(decision.tags, vec!["general"]);
        assert_eq!(decision.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_tie_window_multi_dispatch() {
        // "recommend" (curation) and "quiz" (assessment) both land a single
        // keyword hit, so both fall inside the epsilon window.
        let decision = router()
            .route("recommend a quiz I could take", &UserProfile::default())
            .await
            .unwrap();
        assert!(decision.tags.contains(&"assessment".to_string()));
        assert!(decision.tags.contains(&"curation".to_string()));
    }

    #[tokio::test]
    async fn test_tie_window_holds_below_threshold() {
        // No provider and a threshold above both scores: the rule result
        // stands, and both tied tags still dispatch.
        let mut config = RouterConfig::default();
        config.confidence_threshold = 0.7;
        let router = IntentRouter::new(
            config,
            None,
            vec![
                "assessment".to_string(),
                "curation".to_string(),
                "general".to_string(),
            ],
        );
        let decision = router
            .route("recommend a quiz I could take", &UserProfile::default())
            .await
            .unwrap();
        assert!(decision.tags.contains(&"assessment".to_string()));
        assert!(decision.tags.contains(&"curation".to_string()));
        assert!(!decision.used_model);
    }

    struct FixedProvider {
        answer: String,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.answer.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(Error::Provider("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_model_fallback_below_threshold() {
        let router = IntentRouter::new(
            RouterConfig::default(),
            Some(Arc::new(FixedProvider {
                answer: "Curation".to_string(),
            })),
            vec!["faq".to_string(), "curation".to_string()],
        );
        let decision = router.route("blorp", &UserProfile::default()).await.unwrap();
        assert_eq!(decision.tags, vec!["curation"]);
        assert!(decision.used_model);
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_rules() {
        let router = IntentRouter::new(
            RouterConfig::default(),
            Some(Arc::new(FailingProvider)),
            vec!["faq".to_string(), "general".to_string()],
        );
        let decision = router.route("blorp", &UserProfile::default()).await.unwrap();
        assert_eq!(decision.tags, vec!["general"]);
        assert!(!decision.used_model);
    }

    struct CapturingProvider {
        prompts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for CapturingProvider {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push(messages[0].content.clone());
            Ok("faq".to_string())
        }
    }

    #[tokio::test]
    async fn test_classifier_sees_profile_role() {
        let provider = Arc::new(CapturingProvider {
            prompts: std::sync::Mutex::new(Vec::new()),
        });
        let router = IntentRouter::new(
            RouterConfig::default(),
            Some(provider.clone()),
            vec!["faq".to_string(), "general".to_string()],
        );
        let mut profile = UserProfile::default();
        profile.role = Some("engineer".to_string());
        router.route("blorp", &profile).await.unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("role is engineer"));
    }
}
