// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

/// Input to a `BeforeTurn` handler.
#[derive(Debug, Clone)]
pub struct BeforeTurnInput {
    pub prompt: String,
}

/// Output of a `BeforeTurn` handler: rewrite the user prompt, prepend a
/// system prompt, or inject extra context text.
#[derive(Debug, Clone, Default)]
pub struct BeforeTurnOutput {
    pub prompt: Option<String>,
    pub system_prompt: Option<String>,
    pub inject_text: Option<String>,
}

/// Input to a `BeforeToolCall` handler.
#[derive(Debug, Clone)]
pub struct BeforeToolCallInput {
    pub tool_name: String,
    pub args_json: String,
}

/// Output of a `BeforeToolCall` handler: veto the tool execution.
#[derive(Debug, Clone, Default)]
pub struct BeforeToolCallOutput {
    pub block: bool,
    pub reason: Option<String>,
}

/// Input to an `AfterToolResult` handler.
#[derive(Debug, Clone)]
pub struct AfterToolResultInput {
    pub tool_name: String,
    pub args_json: String,
    pub result: String,
    pub is_error: bool,
}

/// Output of an `AfterToolResult` handler: modify the tool output before the
/// LLM sees it.
#[derive(Debug, Clone, Default)]
pub struct AfterToolResultOutput {
    pub result: Option<String>,
    pub is_error: Option<bool>,
}

/// Input to an `AfterTurn` handler. Observation only — no output type.
#[derive(Debug, Clone)]
pub struct AfterTurnInput {
    pub response: String,
    pub error: Option<String>,
}
