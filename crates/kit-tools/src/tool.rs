// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Provider-assigned identifier, forwarded verbatim.
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: false }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: msg.into(), is_error: true }
    }
}

/// Describes the shape of a tool's text output for context-aware truncation
/// (used by `kit-compact::smart_truncate`). Dispatching on this category —
/// not on tool names — keeps the compactor independent of the concrete tool
/// list; each tool declares its own category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// Terminal/process output: keep the first 60 + last 40 lines.
    HeadTail,
    /// Ordered match list: keep the leading matches (highest relevance first).
    MatchList,
    /// File content: balanced head + tail window with a separator.
    FileContent,
    /// Hard-truncate at the nearest line boundary.
    #[default]
    Generic,
}

/// Every built-in and extension-registered tool implements this trait.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters, in whatever dialect the implementor
    /// wrote it in — `ToolDispatcher` normalises it before exposure.
    fn parameters_schema(&self) -> Value;
    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
