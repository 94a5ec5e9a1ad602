// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use futures::StreamExt;
use kit_model::{CompletionRequest, LanguageModel, Message, Role};
use thiserror::Error;
use tracing::warn;

use crate::cutpoint::resolve_cut_point;

const SYSTEM_PROMPT: &str = "You are a context summarization assistant for a software \
engineering agent. Produce a structured checkpoint summary of the conversation below so \
the agent can continue its work after older messages are discarded. Be information-dense: \
preserve file paths, function names, error messages, and technical decisions verbatim \
where they matter.";

const SCHEMA_INSTRUCTIONS: &str = "\
Summarise the conversation using EXACTLY the following Markdown sections, in this order:

## Goal
What the user is ultimately trying to accomplish.

## Constraints
Requirements, preferences, or limits the agent must keep respecting.

## Progress
What has already been done.

## Key Decisions
Significant technical choices made and why.

## Next Steps
What remains to be done.

## Critical Context
Anything else the agent would otherwise lose — file paths, error messages, open questions.";

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("summarizer returned an empty summary")]
    EmptySummary,
    #[error("summarizer invocation failed: {0}")]
    Summarizer(#[from] anyhow::Error),
}

/// Result of a successful compaction.
#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    pub summary: String,
    /// Full replacement sequence: one synthesised system message followed
    /// by the preserved tail.
    pub messages: Vec<Message>,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

/// Serialise `messages[..cut]` as a role-labelled plaintext conversation for
/// inclusion in the summarisation prompt.
fn serialize_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
                Role::System => "System",
            };
            let text = m.as_text().unwrap_or_else(|| {
                m.tool_calls()
                    .iter()
                    .filter_map(|p| p.tool_id())
                    .map(|id| format!("[tool_call {id}]"))
                    .collect::<Vec<_>>()
                    .join(" ")
            });
            format!("{role}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Run the disposable toolless summarisation agent over `messages[..cut]`
/// and return its raw text output.
async fn summarize_prefix(
    model: Arc<dyn LanguageModel>,
    prefix: &[Message],
    custom_instructions: Option<&str>,
) -> Result<String, CompactionError> {
    let mut prompt = format!(
        "{SCHEMA_INSTRUCTIONS}\n\n---\n\nConversation to summarise:\n\n{}",
        serialize_history(prefix)
    );
    if let Some(extra) = custom_instructions {
        prompt.push_str("\n\n---\n\nAdditional instructions:\n");
        prompt.push_str(extra);
    }

    let req = CompletionRequest {
        messages: vec![Message::user(prompt)],
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        tools: Vec::new(),
    };

    let mut stream = model.generate(req).await.map_err(CompactionError::Summarizer)?;
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event.map_err(CompactionError::Summarizer)? {
            kit_model::ResponseEvent::TextDelta(chunk) => text.push_str(&chunk),
            kit_model::ResponseEvent::Finish { .. } => break,
            _ => {}
        }
    }
    Ok(text)
}

/// Full compaction: resolve the cut point, summarise the
/// discarded prefix, and return the replacement message sequence.
///
/// Returns `Ok(None)` for "nothing to compact".
/// On a summariser failure the session is left untouched — the caller
/// simply does not apply the `None`/`Err` result.
pub async fn compact_messages(
    model: Arc<dyn LanguageModel>,
    messages: &[Message],
    keep_recent_tokens: usize,
    forced: bool,
    custom_instructions: Option<&str>,
) -> Result<Option<CompactionOutcome>, CompactionError> {
    let cut = match resolve_cut_point(messages, keep_recent_tokens, forced) {
        Some(c) => c,
        None => return Ok(None),
    };

    let tokens_before = crate::estimate::estimate_tokens(messages);
    let summary = summarize_prefix(model, &messages[..cut], custom_instructions).await?;
    if summary.trim().is_empty() {
        warn!("compaction summariser returned empty text; session left uncompacted");
        return Err(CompactionError::EmptySummary);
    }

    let mut out = Vec::with_capacity(1 + (messages.len() - cut));
    out.push(Message::system(format!(
                "[Conversation summary — earlier messages were compacted]\n\n{summary}"
    )));
    out.extend_from_slice(&messages[cut..]);
    let tokens_after = crate::estimate::estimate_tokens(&out);

    Ok(Some(CompactionOutcome { summary, messages: out, tokens_before, tokens_after }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use kit_model::MockLanguageModel;

    use super::*;

    fn chars(n: usize) -> String {
        "x".repeat(n)
    }

    fn big_conversation() -> Vec<Message> {
        vec![
            Message::user(chars(4000)),
            Message::assistant(chars(4000)),
            Message::tool_result("c1", chars(4000), false),
            Message::user(chars(4000)),
            Message::assistant(chars(4000)),
        ]
    }

    #[tokio::test]
    async fn nothing_to_compact_returns_none() {
        let model: Arc<dyn LanguageModel> = Arc::new(MockLanguageModel::always_text("## Goal\nfoo"));
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let result = compact_messages(model, &messages, 100_000, false, None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn successful_compaction_produces_summary_and_preserved_tail() {
        let model: Arc<dyn LanguageModel> =
        Arc::new(MockLanguageModel::always_text("## Goal\nDo the thing.\n## Next Steps\nFinish."));
        let messages = big_conversation();
        let outcome = compact_messages(model, &messages, 150, false, None).await.unwrap().unwrap();
        assert_eq!(outcome.messages[0].role, Role::System);
        assert!(outcome.messages[0].as_text().unwrap().contains("Do the thing"));
        assert!(outcome.tokens_after < outcome.tokens_before);
    }

    #[tokio::test]
    async fn empty_summary_is_a_hard_failure() {
        let model: Arc<dyn LanguageModel> = Arc::new(MockLanguageModel::always_text(""));
        let messages = big_conversation();
        let result = compact_messages(model, &messages, 150, false, None).await;
        assert!(matches!(result, Err(CompactionError::EmptySummary)));
    }

    #[tokio::test]
    async fn custom_instructions_are_forwarded_to_the_summarizer() {
        let model = Arc::new(MockLanguageModel::always_text("## Goal\nok"));
        let messages = big_conversation();
        let _ = compact_messages(model.clone(), &messages, 150, false, Some("focus on tests")).await.unwrap();
        let last = model.last_request.lock().unwrap().clone().unwrap();
        let text = last.messages[0].as_text().unwrap();
        assert!(text.contains("focus on tests"));
    }

    #[tokio::test]
    async fn summary_preserves_tail_messages_verbatim() {
        let model: Arc<dyn LanguageModel> = Arc::new(MockLanguageModel::always_text("## Goal\nok"));
        let messages = big_conversation();
        let outcome = compact_messages(model, &messages, 150, false, None).await.unwrap().unwrap();
        // Tail is messages[4..] = [assistant(4000 x's)]
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn forced_compaction_when_everything_fits() {
        let model: Arc<dyn LanguageModel> = Arc::new(MockLanguageModel::always_text("## Goal\nok"));
        let messages: Vec<Message> = (0..6).map(|i| Message::user(format!("msg {i}"))).collect();
        let outcome = compact_messages(model, &messages, 100_000, true, None).await.unwrap();
        assert!(outcome.is_some());
    }
}
