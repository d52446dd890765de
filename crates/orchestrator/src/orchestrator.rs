use rampup_capabilities::{Capability, CapabilityRegistry, CapabilityRequest};
use rampup_core::config::{Config, ReadinessPolicy};
use rampup_core::types::now_ms;
use rampup_core::{
    Channel, Error, ProfileDelta, ReplyFragment, Result, Session, StructuredReply,
    SuggestedAction, SuppressReason, SuppressedFragment, Turn, TurnRequest,
};
use rampup_retrieval::{DocumentIndex, IndexFilters};
use rampup_storage::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::router::IntentRouter;

/// Where a turn is in its lifecycle. Transitions are logged; a turn ends in
/// Done or Errored and in both cases the session is committed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Routing,
    Dispatching,
    Reconciling,
    Composing,
    Done,
    Errored,
}

/// How many prior turns each capability sees.
const CONTEXT_WINDOW: usize = 6;

#[derive(Debug)]
pub struct TurnResult {
    pub reply: StructuredReply,
    pub session: Session,
}

/// Drives one conversational turn end to end: route, retrieve, fan out to
/// capabilities, reconcile, commit. Session state changes exactly once per
/// turn, at commit; every failure path before that leaves the session as it
/// was.
pub struct Orchestrator {
    store: SessionStore,
    registry: Arc<CapabilityRegistry>,
    router: IntentRouter,
    index: Option<Arc<dyn DocumentIndex>>,
    config: Config,
}

impl Orchestrator {
    pub fn new(
        store: SessionStore,
        registry: Arc<CapabilityRegistry>,
        router: IntentRouter,
        index: Option<Arc<dyn DocumentIndex>>,
        config: Config,
    ) -> Self {
        Self {
            store,
            registry,
            router,
            index,
            config,
        }
    }

    pub async fn handle_turn(&self, request: &TurnRequest) -> Result<TurnResult> {
        let guard = self.store.begin_turn(&request.session_id)?;
        let session = guard.session().clone();

        // A garbled voice transcript gets a clarification reply before any
        // routing or dispatch happens.
        if request.channel == Channel::Voice {
            let floor = self.config.orchestrator.transcript_confidence_floor;
            if request.transcript_confidence.unwrap_or(1.0) < floor {
                info!(session_id = %request.session_id, "Low transcript confidence, asking to repeat");
                let reply = StructuredReply {
                    text: "I didn't catch that clearly. Could you repeat it, or type it instead?"
                        .to_string(),
                    citations: Vec::new(),
                    actions: Vec::new(),
                    capabilities: vec!["clarification".to_string()],
                    suppressed: Vec::new(),
                    degraded: false,
                };
                let user_turn = Turn::user(&request.content, now_ms())
                    .with_intents(vec!["clarification".to_string()]);
                let assistant_turn = Turn::assistant(&reply.text, now_ms());
                let session = guard.commit(user_turn, assistant_turn, None)?;
                return Ok(TurnResult { reply, session });
            }
        }

        let mut state = TurnState::Routing;
        debug!(session_id = %request.session_id, ?state, "Turn started");

        let decision = self.router.route(&request.content, &session.profile).await?;

        // One retrieval pass per turn, shared by every dispatched
        // capability. An unavailable index degrades the turn, it does not
        // fail it.
        let (evidence, degraded) = self.retrieve(&request.content).await;

        state = TurnState::Dispatching;
        debug!(session_id = %request.session_id, ?state, tags = ?decision.tags, "Dispatching");

        let capabilities = self.resolve_capabilities(&decision.tags);
        let capability_request = CapabilityRequest {
            text: request.content.clone(),
            profile: session.profile.clone(),
            recent_turns: recent_turns(&session),
            evidence: evidence.clone(),
            evidence_budget: self.config.orchestrator.evidence_top_k,
            company: self.config.company.name.clone(),
        };

        let outcomes = self.dispatch(&capabilities, &capability_request).await;

        state = TurnState::Reconciling;
        debug!(session_id = %request.session_id, ?state, "Reconciling");

        let mut fragments = Vec::new();
        let mut suppressed = Vec::new();
        for (capability, outcome) in capabilities.iter().zip(outcomes) {
            match outcome {
                Ok(fragment) => fragments.push((capability.descriptor().priority, fragment)),
                Err(e) => {
                    warn!(tag = %capability.descriptor().tag, error = %e, "Capability failed");
                    suppressed.push(SuppressedFragment {
                        capability: capability.descriptor().tag.clone(),
                        text: String::new(),
                        reason: SuppressReason::AgentFailed,
                    });
                }
            }
        }

        if fragments.is_empty() {
            state = TurnState::Errored;
            warn!(session_id = %request.session_id, ?state, "All capabilities failed");
            let reply = StructuredReply {
                text: format!(
                    "I'm having trouble answering right now. Please try again in a \
                     moment, or reach out to your manager or {} HR directly.",
                    self.config.company.name
                ),
                citations: Vec::new(),
                actions: Vec::new(),
                capabilities: Vec::new(),
                suppressed,
                degraded,
            };
            let user_turn =
                Turn::user(&request.content, now_ms()).with_intents(decision.tags.clone());
            let assistant_turn = Turn::assistant(&reply.text, now_ms())
                .with_suppressed(reply.suppressed.clone());
            let session = guard.commit(user_turn, assistant_turn, None)?;
            return Ok(TurnResult { reply, session });
        }

        let (mut reply, delta) = reconcile(fragments, suppressed);
        reply.degraded = degraded;

        for fragment in &reply.suppressed {
            info!(
                session_id = %request.session_id,
                capability = %fragment.capability,
                reason = ?fragment.reason,
                "Suppressed reply fragment"
            );
        }

        state = TurnState::Composing;
        debug!(session_id = %request.session_id, ?state, "Composing");

        self.apply_readiness_policy(&session, &mut reply);

        let user_turn = Turn::user(&request.content, now_ms()).with_intents(decision.tags.clone());
        let assistant_turn = Turn::assistant(&reply.text, now_ms())
            .with_intents(reply.capabilities.clone())
            .with_citations(reply.citations.clone())
            .with_suppressed(reply.suppressed.clone());

        let session = guard.commit(user_turn, assistant_turn, delta.as_ref())?;

        state = TurnState::Done;
        debug!(session_id = %request.session_id, ?state, "Turn committed");

        Ok(TurnResult { reply, session })
    }

    async fn retrieve(&self, query: &str) -> (Vec<rampup_core::EvidenceSnippet>, bool) {
        let Some(index) = &self.index else {
            return (Vec::new(), true);
        };
        match index
            .retrieve(
                query,
                self.config.orchestrator.evidence_top_k,
                &IndexFilters::default(),
            )
            .await
        {
            Ok(evidence) => (evidence, false),
            Err(e) => {
                warn!(error = %e, "Retrieval unavailable, answering uncited");
                (Vec::new(), true)
            }
        }
    }

    /// Capabilities for the dispatched tags, deduplicated, best priority
    /// first.
    fn resolve_capabilities(&self, tags: &[String]) -> Vec<Arc<dyn Capability>> {
        let mut seen = std::collections::HashSet::new();
        let mut result: Vec<Arc<dyn Capability>> = Vec::new();
        for tag in tags {
            for capability in self.registry.resolve(tag) {
                if seen.insert(capability.descriptor().tag.clone()) {
                    result.push(capability);
                }
            }
        }
        result.sort_by(|a, b| b.descriptor().priority.cmp(&a.descriptor().priority));
        result
    }

    /// Fan out with a per-call timeout. A transient failure is retried once
    /// after a short delay; the second failure demotes the capability for
    /// this turn.
    async fn dispatch(
        &self,
        capabilities: &[Arc<dyn Capability>],
        request: &CapabilityRequest,
    ) -> Vec<Result<ReplyFragment>> {
        let timeout = Duration::from_secs(self.config.orchestrator.agent_timeout_secs);
        let retry_delay = Duration::from_millis(self.config.orchestrator.retry_delay_ms);

        let calls = capabilities.iter().map(|capability| {
            let capability = capability.clone();
            async move {
                match call_with_timeout(capability.as_ref(), request, timeout).await {
                    Ok(fragment) => Ok(fragment),
                    Err(e) if e.is_transient() => {
                        debug!(tag = %capability.descriptor().tag, error = %e, "Retrying capability");
                        tokio::time::sleep(retry_delay).await;
                        call_with_timeout(capability.as_ref(), request, timeout).await
                    }
                    Err(e) => Err(e),
                }
            }
        });

        futures::future::join_all(calls).await
    }

    /// A missing or low readiness score appends a follow-up suggestion,
    /// unless the assessment capability already answered this turn.
    fn apply_readiness_policy(&self, session: &Session, reply: &mut StructuredReply) {
        if self.config.orchestrator.readiness_policy != ReadinessPolicy::Suggest {
            return;
        }
        let gap = match session.profile.readiness_score {
            None => true,
            Some(score) => score < self.config.orchestrator.readiness_floor,
        };
        let already_assessed = reply.capabilities.iter().any(|c| c == "assessment");
        let already_suggested = reply.actions.iter().any(|a| a.action == "start_assessment");
        if gap && !already_assessed && !already_suggested {
            reply.actions.push(SuggestedAction::new(
                "Check your readiness with a quick assessment",
                "start_assessment",
            ));
        }
    }
}

async fn call_with_timeout(
    capability: &dyn Capability,
    request: &CapabilityRequest,
    timeout: Duration,
) -> Result<ReplyFragment> {
    match tokio::time::timeout(timeout, capability.handle(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "capability {} timed out",
            capability.descriptor().tag
        ))),
    }
}

fn recent_turns(session: &Session) -> Vec<Turn> {
    let start = session.turns.len().saturating_sub(CONTEXT_WINDOW);
    session.turns[start..].to_vec()
}

/// Pick the primary fragment by priority, then confidence, then tag for a
/// stable order. Losing fragments are kept as suppressed alternatives and
/// their profile deltas still merge (the primary's delta wins conflicts).
fn reconcile(
    mut fragments: Vec<(u8, ReplyFragment)>,
    mut suppressed: Vec<SuppressedFragment>,
) -> (StructuredReply, Option<ProfileDelta>) {
    fragments.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| {
                b.1.confidence
                    .partial_cmp(&a.1.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.1.capability.cmp(&b.1.capability))
    });

    let (primary_priority, primary) = fragments.remove(0);

    let mut delta = ProfileDelta::default();
    let mut capabilities = vec![primary.capability.clone()];
    for (priority, loser) in fragments {
        let reason = if priority < primary_priority {
            SuppressReason::LowerPriority
        } else {
            SuppressReason::LowerConfidence
        };
        if let Some(loser_delta) = loser.profile_delta {
            delta.merge(loser_delta);
        }
        capabilities.push(loser.capability.clone());
        suppressed.push(SuppressedFragment {
            capability: loser.capability,
            text: loser.text,
            reason,
        });
    }
    if let Some(primary_delta) = primary.profile_delta.clone() {
        delta.merge(primary_delta);
    }

    let reply = StructuredReply {
        text: primary.text,
        citations: primary.citations,
        actions: primary.actions,
        capabilities,
        suppressed,
        degraded: false,
    };
    let delta = if delta.is_empty() { None } else { Some(delta) };
    (reply, delta)
}
