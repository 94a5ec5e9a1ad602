// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use kit_tools::Tool;

/// Every event and result type below is a concrete record — the sandbox
/// constraint forbids an interface/trait-object type from
/// crossing the extension boundary, so `On<Event>` methods on [`Extension`]
/// always take and return one of these, never a generic `Event`/`Result`.
#[derive(Debug, Clone)]
pub struct ToolCallEvent {
    pub tool_name: String,
    pub args_json: String,
}

#[derive(Debug, Clone, Default)]
pub struct ToolCallResult {
    pub block: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionStartEvent {
    pub call_id: String,
    pub tool_name: String,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionEndEvent {
    pub call_id: String,
    pub tool_name: String,
}

#[derive(Debug, Clone)]
pub struct ToolResultEvent {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ToolResultResult {
    pub content: Option<String>,
    pub is_error: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct InputEvent {
    pub text: String,
}

/// What an extension wants done with a user input. `Handled` is the other cancellable outcome: the extension
/// fully answered the input itself and the agent loop should not run.
#[derive(Debug, Clone)]
pub enum InputAction {
    Continue,
    Transform(String),
    Handled(String),
}

#[derive(Debug, Clone)]
pub struct InputResult {
    pub action: InputAction,
}

#[derive(Debug, Clone)]
pub struct BeforeAgentStartEvent {
    pub mode: String,
}

#[derive(Debug, Clone, Default)]
pub struct BeforeAgentStartResult {
    pub system_injection: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentStartEvent;

#[derive(Debug, Clone)]
pub struct AgentEndEvent {
    pub stop_reason: String,
}

#[derive(Debug, Clone)]
pub struct MessageStartEvent;

#[derive(Debug, Clone)]
pub struct MessageUpdateEvent {
    pub chunk: String,
}

#[derive(Debug, Clone)]
pub struct MessageEndEvent {
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SessionStartEvent;

#[derive(Debug, Clone)]
pub struct SessionShutdownEvent;

/// A user-supplied module that registers handlers for the 13-kind lifecycle
/// event taxonomy and may contribute tools. Every method has a
/// no-op default so a given extension only implements what it needs.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn on_tool_call(&self, _event: &ToolCallEvent) -> Option<ToolCallResult> {
        None
    }
    fn on_tool_execution_start(&self, _event: &ToolExecutionStartEvent) {}
    fn on_tool_execution_end(&self, _event: &ToolExecutionEndEvent) {}
    fn on_tool_result(&self, _event: &ToolResultEvent) -> Option<ToolResultResult> {
        None
    }
    fn on_input(&self, _event: &InputEvent) -> Option<InputResult> {
        None
    }
    fn on_before_agent_start(&self, _event: &BeforeAgentStartEvent) -> Option<BeforeAgentStartResult> {
        None
    }
    fn on_agent_start(&self, _event: &AgentStartEvent) {}
    fn on_agent_end(&self, _event: &AgentEndEvent) {}
    fn on_message_start(&self, _event: &MessageStartEvent) {}
    fn on_message_update(&self, _event: &MessageUpdateEvent) {}
    fn on_message_end(&self, _event: &MessageEndEvent) {}
    fn on_session_start(&self, _event: &SessionStartEvent) {}
    fn on_session_shutdown(&self, _event: &SessionShutdownEvent) {}

    /// Tools this extension contributes. Empty by
    /// default; an extension that only observes events need not override it.
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }
}
