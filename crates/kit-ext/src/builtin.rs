// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use kit_tools::{Tool, ToolCall, ToolOutput};
use serde_json::{json, Value};

use crate::event::{Extension, InputAction, InputEvent, InputResult};
use crate::manifest::Manifest;

/// Construct a built-in extension from a parsed manifest, or `None` if
/// `manifest.kind` names no recognised built-in.
pub fn construct(manifest: &Manifest) -> Option<Arc<dyn Extension>> {
    match manifest.kind.as_str() {
        "rewrite_input" => Some(Arc::new(RewriteInputExtension::from_config(manifest.name.clone(), &manifest.config))),
        "greet_tool" => Some(Arc::new(GreetToolExtension::from_config(manifest.name.clone(), &manifest.config))),
        _ => None,
    }
}

/// Grounds spec scenario E6: an extension that rewrites the user's raw input
/// text before the agent loop ever sees it, by prepending a fixed prefix.
struct RewriteInputExtension {
    name: String,
    prefix: String,
}

impl RewriteInputExtension {
    fn from_config(name: String, config: &Value) -> Self {
        let prefix = config.get("prefix").and_then(Value::as_str).unwrap_or("").to_string();
        Self { name, prefix }
    }
}

impl Extension for RewriteInputExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_input(&self, event: &InputEvent) -> Option<InputResult> {
        if self.prefix.is_empty() {
            return None;
        }
        Some(InputResult { action: InputAction::Transform(format!("{}{}", self.prefix, event.text)) })
    }
}

/// Grounds spec scenario E7: an extension that contributes a tool rather
/// than intercepting events. `greet` takes a `name` argument and returns a
/// fixed greeting, standing in for any extension-registered capability.
struct GreetToolExtension {
    name: String,
    greeting: String,
}

impl GreetToolExtension {
    fn from_config(name: String, config: &Value) -> Self {
        let greeting = config.get("greeting").and_then(Value::as_str).unwrap_or("Hello").to_string();
        Self { name, greeting }
    }
}

impl Extension for GreetToolExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(GreetTool { greeting: self.greeting.clone() })]
    }
}

struct GreetTool {
    greeting: String,
}

#[async_trait]
impl Tool for GreetTool {
    fn name(&self) -> &str {
        "greet"
    }
    fn description(&self) -> &str {
        "Greets a person by name"
    }
    fn parameters_schema(&self) -> Value {
        json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"],
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let who = call.args.get("name").and_then(Value::as_str).unwrap_or("there");
        ToolOutput::ok(&call.id, format!("{}, {}!", self.greeting, who))
    }
}
