// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! A couple of minimal illustrative tools. Concrete tool implementations
//! (bash, HTTP fetch, filesystem) are out of scope — these exist
//! only to exercise `ToolRegistry`/`ToolDispatcher` in tests and examples.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Echoes its `text` argument back as the tool result.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the `text` argument back as the result."
    }

    fn parameters_schema(&self) -> Value {
        json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match call.args.get("text").and_then(Value::as_str) {
            Some(text) => ToolOutput::ok(&call.id, text),
            None => ToolOutput::err(&call.id, "missing required argument: text"),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_the_text_argument() {
        let call = ToolCall { id: "1".into(), name: "echo".into(), args: json!({"text": "hi"}) };
        let out = EchoTool.execute(&call).await;
        assert_eq!(out.content, "hi");
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn echo_without_text_is_an_error() {
        let call = ToolCall { id: "1".into(), name: "echo".into(), args: json!({}) };
        let out = EchoTool.execute(&call).await;
        assert!(out.is_error);
    }
}
