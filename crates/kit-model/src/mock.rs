// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{provider::ResponseStream, CompletionRequest, LanguageModel, ResponseEvent};

/// A pre-scripted model for tests. Each call to `generate` pops the next
/// response script from the front of the queue, so tests can specify exact
/// event sequences — including tool calls spanning multiple steps — without
/// any network access.
pub struct MockLanguageModel {
    scripts: Arc<Mutex<Vec<Vec<ResponseEvent>>>>,
    provider: String,
    model: String,
    context_window: usize,
    /// The last request this mock saw, for test assertions.
    pub last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl MockLanguageModel {
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            provider: "mock".into(),
            model: "mock-model".into(),
            context_window: 128_000,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    /// A model that always replies with the given text and `end_turn`.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let r = reply.into();
        Self::new(vec![vec![
                    ResponseEvent::TextDelta(r),
                    ResponseEvent::Finish { reason: "end_turn".into(), usage: None },
        ]])
    }

    /// A model that emits a single tool call on round one, then a final
    /// text reply on round two.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        input_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
                vec![
                    ResponseEvent::ToolCall {
                        id: tool_id.into(),
                        name: tool_name.into(),
                        input_json: input_json.into(),
                    },
                    ResponseEvent::Finish { reason: "tool_use".into(), usage: None },
                ],
                vec![
                    ResponseEvent::TextDelta(final_text.into()),
                    ResponseEvent::Finish { reason: "end_turn".into(), usage: None },
                ],
        ])
    }

    /// Echoes back the last user message's text, prefixed `MOCK: `.
    pub fn echo() -> Self {
        Self::new(vec![])
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    async fn generate(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                let reply = req
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == crate::Role::User)
                    .and_then(|m| m.as_text())
                    .unwrap_or_else(|| "[no input]".into());
                vec![
                    ResponseEvent::TextDelta(format!("MOCK: {reply}")),
                    ResponseEvent::Finish { reason: "end_turn".into(), usage: None },
                ]
            } else {
                scripts.remove(0)
            }
        };
        *self.last_request.lock().unwrap() = Some(req);
        let wrapped: Vec<anyhow::Result<ResponseEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
