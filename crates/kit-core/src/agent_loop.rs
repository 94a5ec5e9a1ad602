// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use futures::StreamExt;
use kit_bus::{Event, EventBus};
use kit_ext::ExtensionRuntime;
use kit_model::{CompletionRequest, LanguageModel, Part, ResponseEvent, Role, Usage};
use kit_tools::{ToolCall, ToolDispatcher, ToolOutput};
use kit_tree::TreeStore;
use tokio::sync::oneshot;
use tracing::warn;

/// Signal a caller may use to abort an in-flight turn. A oneshot is
/// single-use by construction, which matches the one-shot nature of a
/// cancellation request.
pub type CancelSignal = oneshot::Receiver<()>;

/// Outcome of a complete turn. Always `Ok` —
/// a model-generation failure is carried in `error` rather than propagated,
/// so the caller (`Kit::run_turn`) can still run `AfterTurn` hooks uniformly
/// before deciding whether to surface an error to its own caller.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response_text: String,
    pub stop_reason: String,
    pub total_usage: Usage,
    pub final_usage: Option<Usage>,
    pub error: Option<String>,
}

fn is_cancelled(cancel: &mut Option<CancelSignal>) -> bool {
    match cancel {
        Some(rx) => matches!(rx.try_recv(), Ok(()) | Err(oneshot::error::TryRecvError::Closed)),
        None => false,
    }
}

/// The bounded step machine: `awaiting-model → streaming →
/// parsing → tools-dispatching → awaiting-model | terminal`. Rebuilds its
/// prompt from the [`TreeStore`] at the top of every step, so tool results
/// appended mid-turn are automatically part of the next `Generate` call —
/// the loop itself carries no message-list state beyond one step's
/// accumulator.
pub struct AgentLoop {
    model: Arc<dyn LanguageModel>,
    dispatcher: Arc<ToolDispatcher>,
    bus: EventBus,
    ext: ExtensionRuntime,
    max_steps: u32,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn LanguageModel>, dispatcher: Arc<ToolDispatcher>, bus: EventBus, ext: ExtensionRuntime, max_steps: u32) -> Self {
        Self { model, dispatcher, bus, ext, max_steps }
    }

    /// Run one turn to completion: repeated `Generate` + tool-dispatch
    /// rounds until a terminal stop reason, `max_steps`, or cancellation.
    pub async fn run(&self, store: &TreeStore, system_prompt: Option<&str>, mut cancel: Option<CancelSignal>) -> TurnOutcome {
        self.ext.dispatch_agent_start();

        let mut step: u32 = 0;
        let mut total_usage = Usage::default();
        let mut final_usage: Option<Usage> = None;
        let mut last_text = String::new();

        let outcome = loop {
            if is_cancelled(&mut cancel) {
                break self.finish_cancelled(store, &last_text).await;
            }

            step += 1;
            if step > self.max_steps {
                break self.terminal("max_steps", total_usage, final_usage, last_text, None);
            }

            let (messages, _, _) = store.build_context();
            let req = CompletionRequest { messages, system_prompt: system_prompt.map(str::to_string), tools: self.dispatcher.schemas() };

            self.bus.emit(Event::MessageStart);
            self.ext.dispatch_message_start();

            let stream = match self.model.generate(req).await {
                Ok(s) => s,
                Err(e) => {
                    let msg = format!("{e:#}");
                    self.bus.emit(Event::TurnEnd { error: Some(msg.clone()) });
                    self.ext.dispatch_agent_end("error");
                    return TurnOutcome { response_text: last_text, stop_reason: "error".into(), total_usage, final_usage, error: Some(msg) };
                }
            };
            tokio::pin!(stream);

            let mut text = String::new();
            let mut pending_calls: Vec<(String, String, String)> = Vec::new(); // (id, name, input_json)
            let mut stop_reason = "end_turn".to_string();
            let mut step_usage: Option<Usage> = None;
            let mut stream_error: Option<String> = None;
            let mut cancelled_mid_stream = false;

            loop {
                let next = if let Some(rx) = cancel.as_mut() {
                    tokio::select! {
                        biased;
                        _ = &mut *rx => { cancelled_mid_stream = true; None }
                        item = stream.next() => item,
                    }
                } else {
                    stream.next().await
                };
                let Some(event) = next else { break };
                if cancelled_mid_stream {
                    break;
                }
                match event {
                    Ok(ResponseEvent::TextDelta(chunk)) => {
                        text.push_str(&chunk);
                        self.bus.emit(Event::MessageUpdate { text_delta: chunk.clone() });
                        self.ext.dispatch_message_update(&chunk);
                    }
                    Ok(ResponseEvent::ReasoningDelta(_)) => {}
                    Ok(ResponseEvent::ToolCall { id, name, input_json }) => {
                        pending_calls.push((id, name, input_json));
                    }
                    Ok(ResponseEvent::Finish { reason, usage }) => {
                        stop_reason = reason;
                        step_usage = usage;
                    }
                    Err(e) => {
                        stream_error = Some(format!("{e:#}"));
                        break;
                    }
                }
            }

            if let Some(usage) = &step_usage {
                total_usage.input_tokens += usage.input_tokens;
                total_usage.output_tokens += usage.output_tokens;
                final_usage = Some(usage.clone());
            }

            self.bus.emit(Event::MessageEnd { text: text.clone() });
            self.ext.dispatch_message_end(&text);
            last_text = text.clone();

            let mut assistant_parts: Vec<Part> = Vec::new();
            if !text.is_empty() {
                assistant_parts.push(Part::text(text.clone()));
            }
            for (id, name, input_json) in &pending_calls {
                assistant_parts.push(Part::tool_call(id.clone(), name.clone(), input_json.clone()));
                self.bus.emit(Event::ToolCall { call: ToolCall { id: id.clone(), name: name.clone(), args: serde_json::from_str(input_json).unwrap_or(serde_json::Value::Null) } });
            }
            if !assistant_parts.is_empty() {
                if let Err(e) = store.append_message(Role::Assistant, assistant_parts, Some(self.model.model_id().to_string()), Some(self.model.provider_name().to_string())) {
                    warn!(error = %e, "failed to persist assistant message");
                }
            }

            if cancelled_mid_stream {
                break self.finish_cancelled_with_pending(store, &last_text, &pending_calls).await;
            }
            if let Some(msg) = stream_error {
                self.bus.emit(Event::TurnEnd { error: Some(msg.clone()) });
                self.ext.dispatch_agent_end("error");
                return TurnOutcome { response_text: last_text, stop_reason: "error".into(), total_usage, final_usage, error: Some(msg) };
            }

            if pending_calls.is_empty() {
                break self.terminal(&stop_reason, total_usage, final_usage, last_text, None);
            }

            if is_cancelled(&mut cancel) {
                break self.finish_cancelled_with_pending(store, &last_text, &pending_calls).await;
            }

            let results = self.dispatch_tools(&pending_calls).await;
            let result_parts: Vec<Part> = results.iter().map(|r| Part::tool_result(r.call_id.clone(), r.content.clone(), r.is_error)).collect();
            if let Err(e) = store.append_message(Role::Tool, result_parts, None, None) {
                warn!(error = %e, "failed to persist tool result message");
            }
            // Loop back to `awaiting-model`.
        };

        outcome
    }

    /// Dispatch every pending tool call in parallel within one step: all calls are awaited together, their results
    /// collected en bloc before the next `Generate`.
    async fn dispatch_tools(&self, calls: &[(String, String, String)]) -> Vec<ToolOutput> {
        let futures = calls.iter().map(|(id, name, input_json)| {
                let dispatcher = self.dispatcher.clone();
                let bus = self.bus.clone();
                let id = id.clone();
                let name = name.clone();
                let args: serde_json::Value = serde_json::from_str(input_json).unwrap_or(serde_json::Value::Null);
                async move {
                    bus.emit(Event::ToolExecutionStart { call_id: id.clone(), tool_name: name.clone() });
                    let call = ToolCall { id: id.clone(), name: name.clone(), args };
                    let output = dispatcher.execute(&call).await;
                    bus.emit(Event::ToolExecutionEnd { call_id: id.clone(), tool_name: name.clone() });
                    bus.emit(Event::ToolResult { output: output.clone() });
                    output
                }
        });
        futures::future::join_all(futures).await
    }

    fn terminal(&self, stop_reason: &str, total_usage: Usage, final_usage: Option<Usage>, response_text: String, error: Option<String>) -> TurnOutcome {
        self.bus.emit(Event::Response { text: response_text.clone() });
        self.bus.emit(Event::TurnEnd { error: error.clone() });
        self.ext.dispatch_agent_end(stop_reason);
        TurnOutcome { response_text, stop_reason: stop_reason.to_string(), total_usage, final_usage, error }
    }

    /// Cancellation before any tool calls were parsed this step: nothing to
    /// synthesise, the partial text already persisted (if any) stands.
    async fn finish_cancelled(&self, _store: &TreeStore, last_text: &str) -> TurnOutcome {
        self.terminal("cancelled", Usage::default(), None, last_text.to_string(), None)
    }

    /// Cancellation with tool calls already committed to the assistant
    /// message: synthesise error results for every one so no `ToolCall`
    /// part is ever left without a matching `ToolResult`.
    async fn finish_cancelled_with_pending(&self, store: &TreeStore, last_text: &str, pending: &[(String, String, String)]) -> TurnOutcome {
        if !pending.is_empty() {
            let parts: Vec<Part> = pending.iter().map(|(id, _, _)| Part::tool_result(id.clone(), "Error: cancelled".to_string(), true)).collect();
            if let Err(e) = store.append_message(Role::Tool, parts, None, None) {
                warn!(error = %e, "failed to persist synthesised cancellation results");
            }
        }
        self.terminal("cancelled", Usage::default(), None, last_text.to_string(), None)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
