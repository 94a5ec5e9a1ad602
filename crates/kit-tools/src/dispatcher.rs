// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kit_hooks::{AfterToolResultInput, BeforeToolCallInput, HookRegistry};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::registry::{ToolRegistry, ToolSchema};
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// The double-underscore delimiter used to prefix remote-provider tool
/// names. An external contract — names flow to the LLM — so it is preserved
/// verbatim rather than changed silently.
pub const TOOL_NAME_DELIMITER: &str = "__";

#[derive(Debug, Error)]
pub enum ToolLoadError {
    #[error("every configured tool server failed to load")]
    AllServersFailed,
}

/// A remote tool provider, modelled as a thin black-box seam.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn server_name(&self) -> &str;
    /// List the tools this server exposes, unprefixed.
    async fn tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>>;
}

/// Wraps a tool so its exposed name carries the `<serverName>__<toolName>`
/// prefix, while dispatch still reaches the original
/// implementation.
struct PrefixedTool {
    prefixed_name: String,
    inner: Arc<dyn Tool>,
}

#[async_trait]
impl Tool for PrefixedTool {
    fn name(&self) -> &str {
        &self.prefixed_name
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
        self.inner.execute(call).await
    }
}

/// Innermost wrapper: runs
/// `BeforeToolCall` (may block), executes the underlying tool, then runs
/// `AfterToolResult` (may modify the output).
struct HookWrappedTool {
    inner: Arc<dyn Tool>,
    hooks: HookRegistry,
}

#[async_trait]
impl Tool for HookWrappedTool {
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
        let before = self.hooks.before_tool_call.invoke_first(&BeforeToolCallInput {
                tool_name: call.name.clone(),
                args_json: call.args.to_string(),
        });
        if let Some(decision) = before {
            if decision.block {
                let reason = decision.reason.unwrap_or_else(|| "blocked by hook".to_string());
                return ToolOutput::err(&call.id, format!("Error: {reason}"));
            }
        }

        let mut output = self.inner.execute(call).await;

        let after = self.hooks.after_tool_result.invoke_first(&AfterToolResultInput {
                tool_name: call.name.clone(),
                args_json: call.args.to_string(),
                result: output.content.clone(),
                is_error: output.is_error,
        });
        if let Some(patch) = after {
            if let Some(result) = patch.result {
                output.content = result;
            }
            if let Some(is_error) = patch.is_error {
                output.is_error = is_error;
            }
        }
        output
    }
}

/// Name-prefix routing, schema normalisation, and hook wrapping over a flat
/// [`ToolRegistry`].
pub struct ToolDispatcher {
    registry: ToolRegistry,
    hooks: HookRegistry,
}

impl ToolDispatcher {
    pub fn new(hooks: HookRegistry) -> Self {
        Self { registry: ToolRegistry::new(), hooks }
    }

    /// Register a core (non-remote) tool, hook-wrapped.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        self.registry.register(self.hook_wrap(tool));
    }

    /// Apply the `BeforeToolCall`/`AfterToolResult` hook wrapper without
    /// registering the result. Exposed so a caller (e.g. `kit-ext`) that
    /// needs to wrap something else *around* the hook layer — following
    /// the fixed "hook wrapper innermost, extension wrapper outermost"
    /// order — can build the hook layer first and register the composed
    /// result via [`ToolDispatcher::register_wrapped`].
    pub fn hook_wrap(&self, tool: Arc<dyn Tool>) -> Arc<dyn Tool> {
        Arc::new(HookWrappedTool { inner: tool, hooks: self.hooks.clone() })
    }

    /// Register a tool that has already been wrapped (e.g. by
    /// [`ToolDispatcher::hook_wrap`] and then an outer extension wrapper)
    /// without applying any further wrapping.
    pub fn register_wrapped(&mut self, tool: Arc<dyn Tool>) {
        self.registry.register(tool);
    }

    /// Load tool servers under a per-server deadline. A single server
    /// failing to load emits a warning; tools from other servers remain
    /// usable. Only if every server fails does this return an error.
    pub async fn load_providers(&mut self, providers: Vec<Arc<dyn ToolProvider>>, deadline: Duration) -> Result<(), ToolLoadError> {
        if providers.is_empty() {
            return Ok(());
        }
        let mut any_succeeded = false;
        for provider in providers {
            let server_name = provider.server_name().to_string();
            match tokio::time::timeout(deadline, provider.tools()).await {
                Ok(Ok(tools)) => {
                    for tool in tools {
                        let prefixed_name = format!("{server_name}{TOOL_NAME_DELIMITER}{}", tool.name());
                        let prefixed: Arc<dyn Tool> = Arc::new(PrefixedTool { prefixed_name, inner: tool });
                        self.registry.register(Arc::new(HookWrappedTool { inner: prefixed, hooks: self.hooks.clone() }));
                    }
                    any_succeeded = true;
                }
                Ok(Err(e)) => {
                    warn!(server = %server_name, error = %e, "tool server failed to load");
                }
                Err(_) => {
                    warn!(server = %server_name, "tool server load timed out");
                }
            }
        }
        if any_succeeded {
            Ok(())
        } else {
            Err(ToolLoadError::AllServersFailed)
        }
    }

    /// Split a prefixed name back into `(server_name, original_name)`, or
    /// `None` if it carries no delimiter (a core tool).
    pub fn split_prefixed(name: &str) -> Option<(&str, &str)> {
        name.split_once(TOOL_NAME_DELIMITER)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        self.registry.execute(call).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, "echoed")
        }
    }

    struct OneServerProvider;

    #[async_trait]
    impl ToolProvider for OneServerProvider {
        fn server_name(&self) -> &str {
            "myserver"
        }
        async fn tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
            Ok(vec![Arc::new(EchoTool)])
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ToolProvider for FailingProvider {
        fn server_name(&self) -> &str {
            "broken"
        }
        async fn tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
            anyhow::bail!("connection refused")
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall { id: "1".into(), name: name.into(), args: json!({}) }
    }

    #[tokio::test]
    async fn provider_tools_get_prefixed_names() {
        let mut dispatcher = ToolDispatcher::new(HookRegistry::new());
        dispatcher.load_providers(vec![Arc::new(OneServerProvider)], Duration::from_secs(1)).await.unwrap();
        assert!(dispatcher.names().contains(&"myserver__echo".to_string()));
    }

    #[tokio::test]
    async fn split_prefixed_recovers_server_and_tool() {
        assert_eq!(ToolDispatcher::split_prefixed("myserver__echo"), Some(("myserver", "echo")));
    }

    #[tokio::test]
    async fn single_server_failure_is_not_fatal_when_others_succeed() {
        let mut dispatcher = ToolDispatcher::new(HookRegistry::new());
        let result = dispatcher
            .load_providers(vec![Arc::new(FailingProvider), Arc::new(OneServerProvider)], Duration::from_secs(1))
            .await;
        assert!(result.is_ok());
        assert!(dispatcher.names().contains(&"myserver__echo".to_string()));
    }

    #[tokio::test]
    async fn all_servers_failing_is_a_load_error() {
        let mut dispatcher = ToolDispatcher::new(HookRegistry::new());
        let result = dispatcher.load_providers(vec![Arc::new(FailingProvider)], Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ToolLoadError::AllServersFailed)));
    }

    #[tokio::test]
    async fn before_tool_call_block_prevents_execution() {
        let hooks = HookRegistry::new();
        hooks.before_tool_call.register(0, |input: &BeforeToolCallInput| {
                if input.tool_name == "echo" {
                    Some(kit_hooks::BeforeToolCallOutput { block: true, reason: Some("nope".into()) })
                } else {
                    None
                }
        });
        let mut dispatcher = ToolDispatcher::new(hooks);
        dispatcher.register_tool(Arc::new(EchoTool));
        let out = dispatcher.execute(&call("echo")).await;
        assert!(out.is_error);
        assert!(out.content.contains("nope"));
    }

    #[tokio::test]
    async fn after_tool_result_can_rewrite_output() {
        let hooks = HookRegistry::new();
        hooks.after_tool_result.register(0, |_input: &AfterToolResultInput| {
                Some(kit_hooks::AfterToolResultOutput { result: Some("rewritten".into()), is_error: None })
        });
        let mut dispatcher = ToolDispatcher::new(hooks);
        dispatcher.register_tool(Arc::new(EchoTool));
        let out = dispatcher.execute(&call("echo")).await;
        assert_eq!(out.content, "rewritten");
    }

    #[tokio::test]
    async fn schemas_are_normalised() {
        let mut dispatcher = ToolDispatcher::new(HookRegistry::new());
        dispatcher.register_tool(Arc::new(EchoTool));
        let schemas = dispatcher.schemas();
        assert_eq!(schemas.len(), 1);
        assert!(schemas[0].parameters.get("properties").is_some());
    }
}
