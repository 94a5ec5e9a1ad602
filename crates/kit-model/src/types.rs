// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// A single shape a [`Message`] can carry,.
///
/// Unlike a single-content-field message, a message here is an ordered
/// sequence of parts — an assistant turn may mix reasoning, text, and one or
/// more tool calls in a single message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    /// Extended-thinking output. `signature` round-trips provider-specific
    /// metadata needed to resubmit the reasoning block verbatim.
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// The model's request to invoke a named tool.
    ///
    /// `id` is provider-assigned and must be globally unique within the turn
    /// — it is the join key used to pair a later `ToolResult` part.
    ToolCall {
        id: String,
        name: String,
        input_json: String,
        #[serde(default)]
        finished: bool,
    },
    /// Result bound to a prior `ToolCall` part by `tool_call_id`.
    ToolResult {
        tool_call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    /// Terminal marker for one model turn.
    Finish {
        reason: String,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, input_json: impl Into<String>) -> Self {
        Self::ToolCall { id: id.into(), name: name.into(), input_json: input_json.into(), finished: true }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult { tool_call_id: tool_call_id.into(), content: content.into(), is_error }
    }

    /// Approximate token cost of this part. Chars/4, coarse but sufficient
    /// for the compactor's trigger policy.
    pub fn approx_tokens(&self) -> usize {
        let chars = match self {
            Part::Text { text } => text.len(),
            Part::Reasoning { text, signature } => {
                text.len() + signature.as_deref().map(str::len).unwrap_or(0)
            }
            Part::ToolCall { name, input_json, .. } => name.len() + input_json.len(),
            Part::ToolResult { content, .. } => content.len(),
            Part::Finish { reason } => reason.len(),
        };
        chars / 4
    }

    /// The `tool_call_id` this part carries, if it is a `ToolCall` or
    /// `ToolResult` part. Used to verify the pairing invariant.
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            Part::ToolCall { id, .. } => Some(id),
            Part::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        };
        write!(f, "{s}")
    }
}

/// A single message in the conversation history: a role plus an ordered
/// sequence of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![Part::text(text)] }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, parts: vec![Part::text(text)] }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, parts: vec![Part::text(text)] }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self { role: Role::Tool, parts: vec![Part::tool_result(tool_call_id, content, is_error)] }
    }

    /// Concatenation of all `Text` parts, or `None` if there are none.
    pub fn as_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join(""))
        }
    }

    /// All `ToolCall` parts in this message.
    pub fn tool_calls(&self) -> Vec<&Part> {
        self.parts.iter().filter(|p| matches!(p, Part::ToolCall { .. })).collect()
    }

    /// Approximate token count, summing per-part estimates. Minimum 1 for a
    /// non-empty message so an all-whitespace message is never free.
    pub fn approx_tokens(&self) -> usize {
        let sum: usize = self.parts.iter().map(Part::approx_tokens).sum();
        if self.parts.is_empty() {
            0
        } else {
            sum.max(1)
        }
    }
}

/// A tool schema exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request sent to a [`crate::LanguageModel`].
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolSchema>,
}

/// A single streamed event from the model, step 2.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    TextDelta(String),
    ReasoningDelta(String),
    ToolCall { id: String, name: String, input_json: String },
    Finish { reason: String, usage: Option<Usage> },
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
