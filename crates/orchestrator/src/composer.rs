use rampup_core::{Channel, ChannelOutput, StructuredReply};
use serde_json::json;

/// Render a reconciled reply for the front-end surface. Pure: the same
/// reply always produces the same output, and nothing here touches session
/// state.
pub fn compose(reply: &StructuredReply, channel: Channel) -> ChannelOutput {
    let mut text = reply.text.trim_end().to_string();

    if !reply.citations.is_empty() {
        text.push_str("\n\nSources:");
        for snippet in &reply.citations {
            text.push_str(&format!("\n- {} ({})", snippet.title, snippet.source_id));
        }
    }

    if !reply.actions.is_empty() {
        // Voice surfaces read the reply aloud; suggested actions stay in
        // the metadata there instead of the spoken text.
        if channel == Channel::Text {
            text.push_str("\n\nNext steps:");
            for action in &reply.actions {
                text.push_str(&format!("\n- {}", action.label));
            }
        }
    }

    let metadata = json!({
        "capabilities": reply.capabilities,
        "citations": reply
            .citations
            .iter()
            .map(|s| s.source_id.clone())
            .collect::<Vec<_>>(),
        "actions": reply
            .actions
            .iter()
            .map(|a| a.action.clone())
            .collect::<Vec<_>>(),
        "suppressed": reply.suppressed.len(),
        "degraded": reply.degraded,
    });

    ChannelOutput { text, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampup_core::{EvidenceSnippet, SuggestedAction};

    fn reply() -> StructuredReply {
        StructuredReply {
            text: "You accrue 20 days of PTO.\n".to_string(),
            citations: vec![EvidenceSnippet {
                source_id: "hr/pto.md".to_string(),
                title: "PTO policy".to_string(),
                excerpt: "Employees accrue 20 days per year.".to_string(),
                score: 0.9,
                retrieved_at_ms: 0,
            }],
            actions: vec![SuggestedAction::new("Review the handbook", "browse_library")],
            capabilities: vec!["faq".to_string()],
            suppressed: Vec::new(),
            degraded: false,
        }
    }

    #[test]
    fn test_text_output_lists_sources_and_actions() {
        let output = compose(&reply(), Channel::Text);
        assert!(output.text.contains("Sources:\n- PTO policy (hr/pto.md)"));
        assert!(output.text.contains("Next steps:\n- Review the handbook"));
        assert_eq!(output.metadata["degraded"], false);
        assert_eq!(output.metadata["capabilities"][0], "faq");
    }

    #[test]
    fn test_voice_output_keeps_actions_in_metadata() {
        let output = compose(&reply(), Channel::Voice);
        assert!(!output.text.contains("Next steps"));
        assert_eq!(output.metadata["actions"][0], "browse_library");
    }

    #[test]
    fn test_deterministic() {
        let a = compose(&reply(), Channel::Text);
        let b = compose(&reply(), Channel::Text);
        assert_eq!(a.text, b.text);
        assert_eq!(a.metadata, b.metadata);
    }
}
