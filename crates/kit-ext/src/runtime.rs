// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kit_runtime::{build_sorted_search_dirs, CONFIG_DIR_NAMES};
use kit_tools::{OutputCategory, Tool, ToolCall, ToolOutput};
use serde_json::Value;
use tracing::warn;

use crate::event::{
    AgentEndEvent, AgentStartEvent, BeforeAgentStartEvent, BeforeAgentStartResult, Extension, InputAction, InputEvent,
    InputResult, MessageEndEvent, MessageStartEvent, MessageUpdateEvent, SessionShutdownEvent, SessionStartEvent,
    ToolCallEvent, ToolCallResult, ToolExecutionEndEvent, ToolExecutionStartEvent, ToolResultEvent, ToolResultResult,
};
use crate::manifest::{build_from_manifest_path, MANIFEST_FILE_NAME};

/// Outcome of running the chain of extensions over a freshly submitted
/// user input.
#[derive(Debug, Clone)]
pub enum InputOutcome {
    /// No extension intervened, or every extension returned `Continue`.
    Continue(String),
    /// An extension rewrote the input; the agent loop proceeds with it.
    Transformed(String),
    /// An extension fully answered the input itself; the agent loop must
    /// not run this turn.
    Handled(String),
}

/// Holds every extension discovered under `.agents|.claude|.codex|.cursor|.kit/extensions`
/// across the project/home ancestor-walk precedence chain, and
/// dispatches the 13-kind lifecycle event taxonomy to them.
///
/// Every event/result type crossing this boundary is a concrete struct or
/// enum, never a trait object or generic — the sandbox constraint
/// states explicitly. Dispatch order is discovery order (shallowest
/// directory first); within a directory, manifests are visited in the
/// filesystem's own readdir order.
#[derive(Clone)]
pub struct ExtensionRuntime {
    extensions: Arc<Vec<Arc<dyn Extension>>>,
}

impl ExtensionRuntime {
    pub fn new(extensions: Vec<Arc<dyn Extension>>) -> Self {
        Self { extensions: Arc::new(extensions) }
    }

    pub fn empty() -> Self {
        Self { extensions: Arc::new(Vec::new()) }
    }

    /// Walk the same ancestor-directory precedence chain skill discovery
    /// uses, looking for `<config_dir>/extensions/*/extension.yaml`
    /// under each of `.agents`, `.claude`, `.codex`, `.cursor`, `.kit`.
    pub fn discover(project_root: Option<&Path>) -> Self {
        let mut extensions = Vec::new();
        for dir in build_sorted_search_dirs(project_root) {
            for config_dir in CONFIG_DIR_NAMES {
                let ext_root = dir.join(config_dir).join("extensions");
                let Ok(entries) = std::fs::read_dir(&ext_root) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if !path.is_dir() {
                        continue;
                    }
                    let manifest_path = path.join(MANIFEST_FILE_NAME);
                    match build_from_manifest_path(&manifest_path) {
                        Ok(Some(ext)) => extensions.push(ext),
                        Ok(None) => {}
                        Err(e) => warn!(path = %manifest_path.display(), error = %e, "skipping invalid extension"),
                    }
                }
            }
        }
        Self::new(extensions)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// All tools contributed by all loaded extensions, each
    /// already wrapped so its events reach this runtime. Use this when the
    /// caller has no hook layer of its own to interpose.
    pub fn all_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.raw_tools().into_iter().map(|t| self.wrap_tool(t)).collect()
    }

    /// The unwrapped tools every loaded extension contributes,
    /// before this runtime's extension wrapper is applied. Lets a caller
    /// interpose its own wrapper (e.g. `kit-core`'s hook layer) between the
    /// raw tool and this runtime's `ToolCall`/`ToolResult` dispatch, following
    /// the fixed "extension-outermost, hook-innermost" order.
    pub fn raw_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.extensions.iter().flat_map(|e| e.tools()).collect()
    }

    /// Wrap an arbitrary tool (typically already hook-wrapped, following
    /// the fixed "hook wrapper innermost, extension wrapper outermost"
    /// order) so its calls and results pass through every loaded extension
    /// first.
    pub fn wrap_tool(&self, tool: Arc<dyn Tool>) -> Arc<dyn Tool> {
        Arc::new(ExtensionWrappedTool { inner: tool, runtime: self.clone() })
    }

    /// Run the cancellable `Input` chain. First non-`Continue`
    /// result wins; extensions after it do not run.
    pub fn dispatch_input(&self, text: &str) -> InputOutcome {
        let event = InputEvent { text: text.to_string() };
        for ext in self.extensions.iter() {
            if let Some(InputResult { action }) = ext.on_input(&event) {
                match action {
                    InputAction::Continue => continue,
                    InputAction::Transform(t) => return InputOutcome::Transformed(t),
                    InputAction::Handled(t) => return InputOutcome::Handled(t),
                }
            }
        }
        InputOutcome::Continue(text.to_string())
    }

    /// Run the cancellable `ToolCall` chain. First blocking
    /// result wins and carries the reason surfaced to the model.
    pub fn dispatch_tool_call(&self, tool_name: &str, args_json: &str) -> Option<String> {
        let event = ToolCallEvent { tool_name: tool_name.to_string(), args_json: args_json.to_string() };
        for ext in self.extensions.iter() {
            if let Some(ToolCallResult { block: true, reason }) = ext.on_tool_call(&event) {
                return Some(reason.unwrap_or_else(|| "blocked by extension".to_string()));
            }
        }
        None
    }

    pub fn dispatch_tool_execution_start(&self, call_id: &str, tool_name: &str) {
        let event = ToolExecutionStartEvent { call_id: call_id.to_string(), tool_name: tool_name.to_string() };
        for ext in self.extensions.iter() {
            ext.on_tool_execution_start(&event);
        }
    }

    pub fn dispatch_tool_execution_end(&self, call_id: &str, tool_name: &str) {
        let event = ToolExecutionEndEvent { call_id: call_id.to_string(), tool_name: tool_name.to_string() };
        for ext in self.extensions.iter() {
            ext.on_tool_execution_end(&event);
        }
    }

    /// Run the accumulating `ToolResult` chain.
    pub fn dispatch_tool_result(&self, call_id: &str, tool_name: &str, mut content: String, mut is_error: bool) -> (String, bool) {
        let mut event = ToolResultEvent { call_id: call_id.to_string(), tool_name: tool_name.to_string(), content: content.clone(), is_error };
        for ext in self.extensions.iter() {
            if let Some(patch) = ext.on_tool_result(&event) {
                if let Some(c) = patch.content {
                    content = c;
                }
                if let Some(e) = patch.is_error {
                    is_error = e;
                }
                event.content = content.clone();
                event.is_error = is_error;
            }
        }
        (content, is_error)
    }

    pub fn dispatch_before_agent_start(&self, mode: &str) -> Vec<String> {
        let event = BeforeAgentStartEvent { mode: mode.to_string() };
        self.extensions
            .iter()
            .filter_map(|e| e.on_before_agent_start(&event))
            .filter_map(|r| r.system_injection)
            .collect()
    }

    pub fn dispatch_agent_start(&self) {
        for ext in self.extensions.iter() {
            ext.on_agent_start(&AgentStartEvent);
        }
    }

    pub fn dispatch_agent_end(&self, stop_reason: &str) {
        let event = AgentEndEvent { stop_reason: stop_reason.to_string() };
        for ext in self.extensions.iter() {
            ext.on_agent_end(&event);
        }
    }

    pub fn dispatch_message_start(&self) {
        for ext in self.extensions.iter() {
            ext.on_message_start(&MessageStartEvent);
        }
    }

    pub fn dispatch_message_update(&self, chunk: &str) {
        let event = MessageUpdateEvent { chunk: chunk.to_string() };
        for ext in self.extensions.iter() {
            ext.on_message_update(&event);
        }
    }

    pub fn dispatch_message_end(&self, text: &str) {
        let event = MessageEndEvent { text: text.to_string() };
        for ext in self.extensions.iter() {
            ext.on_message_end(&event);
        }
    }

    pub fn dispatch_session_start(&self) {
        for ext in self.extensions.iter() {
            ext.on_session_start(&SessionStartEvent);
        }
    }

    pub fn dispatch_session_shutdown(&self) {
        for ext in self.extensions.iter() {
            ext.on_session_shutdown(&SessionShutdownEvent);
        }
    }
}

/// Outermost tool wrapper: runs the `ToolCall`/`ToolResult`
/// extension chains around whatever it wraps, typically an already
/// hook-wrapped tool.
struct ExtensionWrappedTool {
    inner: Arc<dyn Tool>,
    runtime: ExtensionRuntime,
}

#[async_trait]
impl Tool for ExtensionWrappedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn description(&self) -> &str {
        self.inner.description()
    }
    fn parameters_schema(&self) -> Value {
        self.inner.parameters_schema()
    }
    fn output_category(&self) -> OutputCategory {
        self.inner.output_category()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let args_json = call.args.to_string();
        if let Some(reason) = self.runtime.dispatch_tool_call(&call.name, &args_json) {
            return ToolOutput::err(&call.id, format!("Error: {reason}"));
        }

        self.runtime.dispatch_tool_execution_start(&call.id, &call.name);
        let mut output = self.inner.execute(call).await;
        self.runtime.dispatch_tool_execution_end(&call.id, &call.name);

        let (content, is_error) = self.runtime.dispatch_tool_result(&call.id, &call.name, output.content.clone(), output.is_error);
        output.content = content;
        output.is_error = is_error;
        output
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
