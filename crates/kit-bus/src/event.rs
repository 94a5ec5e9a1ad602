// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use kit_tools::{ToolCall, ToolOutput};

/// One lifecycle event emitted by the agent loop over the course of a turn.
/// Observation only — nothing on this bus can block or rewrite
/// agent state; that is the hook registry's job.
#[derive(Debug, Clone)]
pub enum Event {
    TurnStart,
    TurnEnd { error: Option<String> },
    MessageStart,
    MessageUpdate { text_delta: String },
    MessageEnd { text: String },
    ToolCall { call: ToolCall },
    ToolExecutionStart { call_id: String, tool_name: String },
    ToolExecutionEnd { call_id: String, tool_name: String },
    ToolResult { output: ToolOutput },
    ToolCallContent { call_id: String, content_delta: String },
    Response { text: String },
    Compaction { tokens_before: usize, tokens_after: usize },
}
