// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use kit_bus::{Event, EventBus, Subscription};
use kit_compact::{compact_messages, DEFAULT_KEEP_RECENT_TOKENS, DEFAULT_RESERVE_TOKENS};
use kit_ext::{ExtensionRuntime, InputOutcome};
use kit_hooks::{
    AfterToolResultInput, AfterToolResultOutput, AfterTurnInput, BeforeToolCallInput, BeforeToolCallOutput,
    BeforeTurnInput, BeforeTurnOutput, HookRegistry,
};
use kit_model::{LanguageModel, Message, Part, Role, Usage};
use kit_tools::{Tool, ToolCall, ToolDispatcher};
use kit_tree::TreeStore;

use crate::agent_loop::{AgentLoop, CancelSignal, TurnOutcome};
use crate::error::KitError;

/// Options for a manual [`Kit::compact`] call.
#[derive(Debug, Clone, Default)]
pub struct CompactOptions {
    /// Force compaction even if the conversation fits comfortably — mirrors
    /// a user-initiated `/compact`.
    pub force: bool,
    pub custom_instructions: Option<String>,
}

/// Result of a successful compaction, surfaced to the caller.
#[derive(Debug, Clone)]
pub struct CompactionSummary {
    pub summary: String,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

/// Result of [`Kit::prompt_result`].
#[derive(Debug, Clone)]
pub struct PromptOutcome {
    pub response: String,
    pub total_usage: Usage,
    pub final_usage: Option<Usage>,
    /// The full conversation visible to the LLM after this turn, per
    /// `TreeStore::build_context`.
    pub messages: Vec<Message>,
}

/// The composition root: wires the tree store, hooks,
/// extensions, tool dispatcher, event bus, and compactor behind one shared
/// `run_turn` contract. No prompt mode bypasses it.
pub struct Kit {
    store: TreeStore,
    model: Arc<dyn LanguageModel>,
    dispatcher: Arc<ToolDispatcher>,
    bus: EventBus,
    ext: ExtensionRuntime,
    hooks: HookRegistry,
    agent_loop: AgentLoop,
    reserve_tokens: usize,
    keep_recent_tokens: usize,
    system_prompt: Mutex<Option<String>>,
}

impl Kit {
    /// `Kit.Prompt(ctx, text) -> responseText`.
    pub async fn prompt(&self, text: &str) -> Result<String, KitError> {
        self.run_turn(text.to_string(), None, "prompt", plain_user_messages).await.map(|o| o.response_text)
    }

    /// `Kit.PromptResult(ctx, text) -> {response, totalUsage, finalUsage, messages}`.
    pub async fn prompt_result(&self, text: &str) -> Result<PromptOutcome, KitError> {
        let outcome = self.run_turn(text.to_string(), None, "prompt", plain_user_messages).await?;
        Ok(self.into_prompt_outcome(outcome))
    }

    /// `Kit.Steer(ctx, instruction) -> responseText`: appends a system-role
    /// entry followed by a synthetic user acknowledgement, then runs one
    /// turn.
    pub async fn steer(&self, instruction: &str) -> Result<String, KitError> {
        self.run_turn(instruction.to_string(), None, "steer", steer_messages).await.map(|o| o.response_text)
    }

    /// `Kit.FollowUp(ctx, text)`: appends user text (or `"Continue."`)
    /// without special framing.
    pub async fn follow_up(&self, text: Option<&str>) -> Result<String, KitError> {
        let prompt = text.unwrap_or("Continue.").to_string();
        self.run_turn(prompt, None, "follow_up", plain_user_messages).await.map(|o| o.response_text)
    }

    /// `Kit.Compact(ctx, opts)`: manual compaction. Returns
    /// `Ok(None)` for "nothing to compact" rather than
    /// an error — that outcome is not a failure.
    pub async fn compact(&self, opts: CompactOptions) -> Result<Option<CompactionSummary>, KitError> {
        self.compact_internal(opts.force, opts.custom_instructions.as_deref()).await
    }

    /// `Kit.Branch(entryID)`: fails if `entry_id` is unknown.
    pub fn branch(&self, entry_id: &str) -> Result<(), KitError> {
        self.store.branch(entry_id).map_err(KitError::from)
    }

    /// `Kit.ResetLeaf()`.
    pub fn reset_leaf(&self) {
        self.store.reset_leaf();
    }

    /// `Kit.SetSessionName(name)`.
    pub fn set_session_name(&self, name: impl Into<String>) -> Result<(), KitError> {
        self.store.append_session_info(name).map_err(KitError::from)?;
        Ok(())
    }

    /// `Kit.Subscribe(listener)`: raw access to every lifecycle
    /// event on the bus.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
    F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }

    /// Typed helper: fires only for `Event::ToolCall`.
    pub fn on_tool_call<F>(&self, listener: F) -> Subscription
    where
    F: Fn(&ToolCall) + Send + Sync + 'static,
    {
        self.bus.subscribe(move |event| {
                if let Event::ToolCall { call } = event {
                    listener(call);
                }
        })
    }

    /// Typed helper: fires for every streamed text chunk (`MessageUpdate`).
    pub fn on_streaming<F>(&self, listener: F) -> Subscription
    where
    F: Fn(&str) + Send + Sync + 'static,
    {
        self.bus.subscribe(move |event| {
                if let Event::MessageUpdate { text_delta } = event {
                    listener(text_delta);
                }
        })
    }

    /// `Kit.On<Hook>(priority, handler) -> unregister closure` for
    /// `BeforeTurn`.
    pub fn on_before_turn<F>(&self, priority: i32, handler: F) -> kit_hooks::Unregister<BeforeTurnInput, BeforeTurnOutput>
    where
    F: Fn(&BeforeTurnInput) -> Option<BeforeTurnOutput> + Send + Sync + 'static,
    {
        self.hooks.before_turn.register(priority, handler)
    }

    pub fn on_before_tool_call<F>(
        &self,
        priority: i32,
        handler: F,
    ) -> kit_hooks::Unregister<BeforeToolCallInput, BeforeToolCallOutput>
    where
    F: Fn(&BeforeToolCallInput) -> Option<BeforeToolCallOutput> + Send + Sync + 'static,
    {
        self.hooks.before_tool_call.register(priority, handler)
    }

    pub fn on_after_tool_result<F>(
        &self,
        priority: i32,
        handler: F,
    ) -> kit_hooks::Unregister<AfterToolResultInput, AfterToolResultOutput>
    where
    F: Fn(&AfterToolResultInput) -> Option<AfterToolResultOutput> + Send + Sync + 'static,
    {
        self.hooks.after_tool_result.register(priority, handler)
    }

    /// `AfterTurn` is observation-only: every handler fires,
    /// none can veto or rewrite anything.
    pub fn on_after_turn<F>(&self, priority: i32, handler: F) -> kit_hooks::Unregister<AfterTurnInput, ()>
    where
    F: Fn(&AfterTurnInput) + Send + Sync + 'static,
    {
        self.hooks.after_turn.register_observer(priority, move |input: &AfterTurnInput| {
                handler(input);
                None
        })
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.dispatcher.names()
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// Ends the session: fires `SessionShutdown` to every loaded extension
    /// and releases the store's file handle. Pairs with the `SessionStart`
    /// dispatch `KitBuilder::build` fires when the `Kit` is assembled.
    pub fn close(&self) {
        self.ext.dispatch_session_shutdown();
        self.store.close();
    }

    fn into_prompt_outcome(&self, outcome: TurnOutcome) -> PromptOutcome {
        let (messages, _, _) = self.store.build_context();
        PromptOutcome { response: outcome.response_text, total_usage: outcome.total_usage, final_usage: outcome.final_usage, messages }
    }

    /// The one shared contract every prompt mode converges on: bridge the
    /// extension `Input` chain (rewrite or short-circuit), run `BeforeTurn`
    /// hooks, bridge `BeforeAgentStart` system injections in alongside the
    /// hook chain's own `inject_text`, persist the pre-turn messages the
    /// caller's `build_messages` constructs, auto-compact if the budget
    /// demands it, invoke [`AgentLoop`], then run `AfterTurn` hooks. A
    /// `Handled` input is the one early return: the extension already
    /// answered, so `AgentLoop` never runs that turn. Every other path
    /// converges on the same machinery below.
    async fn run_turn(
        &self,
        raw_prompt: String,
        cancel: Option<CancelSignal>,
        mode: &str,
        build_messages: fn(&str, Option<&str>) -> Vec<(Role, Vec<Part>)>,
    ) -> Result<TurnOutcome, KitError> {
        self.bus.emit(Event::TurnStart);

        let prompt_after_input = match self.ext.dispatch_input(&raw_prompt) {
            InputOutcome::Continue(text) | InputOutcome::Transformed(text) => text,
            InputOutcome::Handled(text) => return self.finish_handled_by_extension(&raw_prompt, text, build_messages),
        };

        let before = self.hooks.before_turn.invoke_first(&BeforeTurnInput { prompt: prompt_after_input.clone() });
        let final_prompt = before.as_ref().and_then(|b| b.prompt.clone()).unwrap_or(prompt_after_input);
        let system_override = before.as_ref().and_then(|b| b.system_prompt.clone());
        let hook_inject = before.as_ref().and_then(|b| b.inject_text.clone());

        let agent_start_injections = self.ext.dispatch_before_agent_start(mode);
        let inject_text = combine_injections(hook_inject, agent_start_injections);

        for (role, parts) in build_messages(&final_prompt, inject_text.as_deref()) {
            self.store.append_message(role, parts, None, None)?;
        }

        let (messages_so_far, _, _) = self.store.build_context();
        if kit_compact::should_compact(&messages_so_far, self.model.context_window(), self.reserve_tokens) {
            if let Err(e) = self.compact_internal(false, None).await {
                tracing::warn!(error = %e, "auto-compaction failed; continuing with uncompacted session");
            }
        }

        let effective_system_prompt = system_override.or_else(|| self.system_prompt.lock().expect("system prompt lock poisoned").clone());

        let outcome = self.agent_loop.run(&self.store, effective_system_prompt.as_deref(), cancel).await;

        self.hooks.after_turn.invoke_all(&AfterTurnInput { response: outcome.response_text.clone(), error: outcome.error.clone() });

        if let Some(err) = &outcome.error {
            return Err(KitError::Generation(anyhow::anyhow!(err.clone())));
        }
        Ok(outcome)
    }

    /// An extension's `on_input` fully answered the turn: persist the
    /// unmodified input via the caller's own `build_messages` (so the
    /// journal shape matches a normal turn), persist the extension's answer
    /// as the assistant message, and run `AfterTurn` observers the same as
    /// any other turn. [`AgentLoop`] never runs.
    fn finish_handled_by_extension(
        &self,
        raw_prompt: &str,
        answer: String,
        build_messages: fn(&str, Option<&str>) -> Vec<(Role, Vec<Part>)>,
    ) -> Result<TurnOutcome, KitError> {
        for (role, parts) in build_messages(raw_prompt, None) {
            self.store.append_message(role, parts, None, None)?;
        }
        self.store.append_message(Role::Assistant, vec![Part::text(answer.clone())], None, None)?;

        self.bus.emit(Event::Response { text: answer.clone() });
        self.bus.emit(Event::TurnEnd { error: None });

        let outcome = TurnOutcome {
            response_text: answer,
            stop_reason: "handled_by_extension".to_string(),
            total_usage: Usage::default(),
            final_usage: None,
            error: None,
        };
        self.hooks.after_turn.invoke_all(&AfterTurnInput { response: outcome.response_text.clone(), error: None });
        Ok(outcome)
    }

    /// Shared by [`Kit::compact`] and the automatic trigger inside
    /// `run_turn`.
    async fn compact_internal(&self, forced: bool, custom_instructions: Option<&str>) -> Result<Option<CompactionSummary>, KitError> {
        let (messages, _, _) = self.store.build_context();
        let outcome = compact_messages(self.model.clone(), &messages, self.keep_recent_tokens, forced, custom_instructions).await?;
        let Some(outcome) = outcome else {
            return Ok(None);
        };

        self.store.reset_leaf();
        for message in &outcome.messages {
            self.store.append_message(message.role, message.parts.clone(), None, None)?;
        }
        self.bus.emit(Event::Compaction { tokens_before: outcome.tokens_before, tokens_after: outcome.tokens_after });

        Ok(Some(CompactionSummary { summary: outcome.summary, tokens_before: outcome.tokens_before, tokens_after: outcome.tokens_after }))
    }
}

/// Folds a `BeforeTurn` hook's `inject_text` together with every
/// `BeforeAgentStart` extension `system_injection`, in that order, into the
/// single context string `build_messages` prepends. `None` only when
/// neither side contributed anything.
fn combine_injections(hook_inject: Option<String>, agent_start_injections: Vec<String>) -> Option<String> {
    let mut parts: Vec<String> = hook_inject.into_iter().collect();
    parts.extend(agent_start_injections);
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// `build_messages` for `Prompt`/`FollowUp`/`PromptResult`: a
/// plain user message, with any `inject_text` from a `BeforeTurn` handler
/// prepended as a system-role context message.
fn plain_user_messages(prompt: &str, inject_text: Option<&str>) -> Vec<(Role, Vec<Part>)> {
    let mut out = Vec::with_capacity(2);
    if let Some(inject) = inject_text {
        out.push((Role::System, vec![Part::text(format!("[Context: {inject}]"))]));
    }
    out.push((Role::User, vec![Part::text(prompt.to_string())]));
    out
}

/// `build_messages` for `Steer`: a system-role instruction
/// followed by a synthetic user acknowledgement, so the agent loop's next
/// `Generate` sees an ordinary user-turn shape.
fn steer_messages(instruction: &str, inject_text: Option<&str>) -> Vec<(Role, Vec<Part>)> {
    let mut out = Vec::with_capacity(3);
    if let Some(inject) = inject_text {
        out.push((Role::System, vec![Part::text(format!("[Context: {inject}]"))]));
    }
    out.push((Role::System, vec![Part::text(instruction.to_string())]));
    out.push((Role::User, vec![Part::text("Understood.".to_string())]));
    out
}

/// Builds a [`Kit`] from its constituent subsystems. Every field has a sensible default except the model, which the
/// caller must always supply — there is no meaningful default `LanguageModel`.
pub struct KitBuilder {
    model: Arc<dyn LanguageModel>,
    store: Option<TreeStore>,
    hooks: HookRegistry,
    ext: ExtensionRuntime,
    bus: EventBus,
    tools: Vec<Arc<dyn Tool>>,
    max_steps: u32,
    reserve_tokens: usize,
    keep_recent_tokens: usize,
    system_prompt: Option<String>,
}

impl KitBuilder {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            store: None,
            hooks: HookRegistry::new(),
            ext: ExtensionRuntime::empty(),
            bus: EventBus::new(),
            tools: Vec::new(),
            max_steps: 200,
            reserve_tokens: DEFAULT_RESERVE_TOKENS,
            keep_recent_tokens: DEFAULT_KEEP_RECENT_TOKENS,
            system_prompt: None,
        }
    }

    pub fn with_store(mut self, store: TreeStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_extensions(mut self, ext: ExtensionRuntime) -> Self {
        self.ext = ext;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_reserve_tokens(mut self, reserve_tokens: usize) -> Self {
        self.reserve_tokens = reserve_tokens;
        self
    }

    pub fn with_keep_recent_tokens(mut self, keep_recent_tokens: usize) -> Self {
        self.keep_recent_tokens = keep_recent_tokens;
        self
    }

    /// Assemble the `Kit`: registers every built-in/extension tool through
    /// the hook wrapper (innermost) then the extension wrapper (outermost),
    /// fixed wrapping order.
    pub fn build(self) -> Kit {
        let store = self.store.unwrap_or_else(|| TreeStore::in_memory("."));
        let mut dispatcher = ToolDispatcher::new(self.hooks.clone());
        for tool in self.tools.into_iter().chain(self.ext.raw_tools()) {
            let hook_wrapped = dispatcher.hook_wrap(tool);
            let fully_wrapped = self.ext.wrap_tool(hook_wrapped);
            dispatcher.register_wrapped(fully_wrapped);
        }
        let dispatcher = Arc::new(dispatcher);

        let agent_loop = AgentLoop::new(self.model.clone(), dispatcher.clone(), self.bus.clone(), self.ext.clone(), self.max_steps);

        self.ext.dispatch_session_start();

        Kit {
            store,
            model: self.model,
            dispatcher,
            bus: self.bus,
            ext: self.ext,
            hooks: self.hooks,
            agent_loop,
            reserve_tokens: self.reserve_tokens,
            keep_recent_tokens: self.keep_recent_tokens,
            system_prompt: Mutex::new(self.system_prompt),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use kit_model::MockLanguageModel;

    use super::*;

    #[tokio::test]
    async fn prompt_persists_user_and_assistant_messages() {
        let model = Arc::new(MockLanguageModel::always_text("hello there"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();

        let response = kit.prompt("hi").await.unwrap();
        assert_eq!(response, "hello there");

        let (messages, _, _) = kit.store().build_context();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].as_text(), Some("hi".to_string()));
    }

    #[tokio::test]
    async fn before_turn_hook_rewrites_prompt_text() {
        let model = Arc::new(MockLanguageModel::always_text("ack"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();
        kit.on_before_turn(0, |_input: &BeforeTurnInput| Some(BeforeTurnOutput { prompt: Some("rewritten".into()), ..Default::default() }));

        kit.prompt("original").await.unwrap();

        let (messages, _, _) = kit.store().build_context();
        assert_eq!(messages[0].as_text(), Some("rewritten".to_string()));
    }

    #[tokio::test]
    async fn steer_appends_system_instruction_and_user_acknowledgement() {
        let model = Arc::new(MockLanguageModel::always_text("done"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();

        kit.steer("focus on tests").await.unwrap();

        let (messages, _, _) = kit.store().build_context();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].as_text(), Some("focus on tests".to_string()));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].as_text(), Some("Understood.".to_string()));
    }

    #[tokio::test]
    async fn follow_up_without_text_sends_continue() {
        let model = Arc::new(MockLanguageModel::always_text("continuing"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();

        kit.follow_up(None).await.unwrap();

        let (messages, _, _) = kit.store().build_context();
        assert_eq!(messages[0].as_text(), Some("Continue.".to_string()));
    }

    #[tokio::test]
    async fn blocked_tool_call_hook_is_wired_through_the_facade() {
        use kit_tools::EchoTool;

        let model = Arc::new(MockLanguageModel::tool_then_text("c1", "echo", "{}", "acknowledged"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).with_tool(Arc::new(EchoTool)).build();
        kit.on_before_tool_call(0, |input: &BeforeToolCallInput| {
                if input.tool_name == "echo" {
                    Some(BeforeToolCallOutput { block: true, reason: Some("nope".into()) })
                } else {
                    None
                }
        });

        let response = kit.prompt("run the echo tool").await.unwrap();
        assert_eq!(response, "acknowledged");
    }

    #[tokio::test]
    async fn after_turn_observer_sees_final_response() {
        let model = Arc::new(MockLanguageModel::always_text("final answer"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();
        let seen = Arc::new(Mutex::new(String::new()));
        let seen2 = seen.clone();
        kit.on_after_turn(0, move |input: &AfterTurnInput| {
                *seen2.lock().unwrap() = input.response.clone();
        });

        kit.prompt("hi").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), "final answer");
    }

    #[tokio::test]
    async fn manual_compact_returns_none_when_nothing_to_compact() {
        let model = Arc::new(MockLanguageModel::always_text("hi"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();
        kit.prompt("short").await.unwrap();

        let result = kit.compact(CompactOptions::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn branch_to_unknown_entry_is_an_error() {
        let model = Arc::new(MockLanguageModel::always_text("hi"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();
        assert!(kit.branch("nonexistent").is_err());
    }

    #[tokio::test]
    async fn set_session_name_is_reflected_on_the_store() {
        let model = Arc::new(MockLanguageModel::always_text("hi"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).build();
        kit.set_session_name("My Session").unwrap();
        assert_eq!(kit.store().session_name(), Some("My Session".to_string()));
    }

    #[tokio::test]
    async fn tool_names_reports_registered_tools() {
        use kit_tools::EchoTool;
        let model = Arc::new(MockLanguageModel::always_text("hi"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).with_tool(Arc::new(EchoTool)).build();
        assert!(kit.tool_names().contains(&"echo".to_string()));
    }

    struct TransformInputExtension;
    impl kit_ext::Extension for TransformInputExtension {
        fn name(&self) -> &str {
            "transform"
        }
        fn on_input(&self, event: &kit_ext::InputEvent) -> Option<kit_ext::InputResult> {
            Some(kit_ext::InputResult { action: kit_ext::InputAction::Transform(format!("rewritten: {}", event.text)) })
        }
    }

    struct HandledInputExtension(&'static str);
    impl kit_ext::Extension for HandledInputExtension {
        fn name(&self) -> &str {
            "handler"
        }
        fn on_input(&self, _event: &kit_ext::InputEvent) -> Option<kit_ext::InputResult> {
            Some(kit_ext::InputResult { action: kit_ext::InputAction::Handled(self.0.to_string()) })
        }
    }

    struct InjectingExtension;
    impl kit_ext::Extension for InjectingExtension {
        fn name(&self) -> &str {
            "injector"
        }
        fn on_before_agent_start(&self, _event: &kit_ext::BeforeAgentStartEvent) -> Option<kit_ext::BeforeAgentStartResult> {
            Some(kit_ext::BeforeAgentStartResult { system_injection: Some("injected context".to_string()) })
        }
    }

    struct SessionLifecycleExtension {
        starts: Arc<std::sync::atomic::AtomicUsize>,
        shutdowns: Arc<std::sync::atomic::AtomicUsize>,
    }
    impl kit_ext::Extension for SessionLifecycleExtension {
        fn name(&self) -> &str {
            "session_counter"
        }
        fn on_session_start(&self, _event: &kit_ext::SessionStartEvent) {
            self.starts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        fn on_session_shutdown(&self, _event: &kit_ext::SessionShutdownEvent) {
            self.shutdowns.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn extension_input_transform_bridges_into_the_persisted_prompt() {
        // Grounds spec scenario E6: `Kit.Prompt(ctx, "original")` with a
        // rewriting extension loaded persists the rewritten text, not the
        // original.
        let model = Arc::new(MockLanguageModel::always_text("ack"));
        let ext = ExtensionRuntime::new(vec![Arc::new(TransformInputExtension)]);
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).with_extensions(ext).build();

        kit.prompt("original").await.unwrap();

        let (messages, _, _) = kit.store().build_context();
        assert_eq!(messages[0].as_text(), Some("rewritten: original".to_string()));
    }

    #[tokio::test]
    async fn extension_input_handled_short_circuits_the_agent_loop() {
        let model = Arc::new(MockLanguageModel::always_text("should not run"));
        let ext = ExtensionRuntime::new(vec![Arc::new(HandledInputExtension("handled answer"))]);
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).with_extensions(ext).build();

        let response = kit.prompt("original").await.unwrap();
        assert_eq!(response, "handled answer");

        let (messages, _, _) = kit.store().build_context();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].as_text(), Some("original".to_string()));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].as_text(), Some("handled answer".to_string()));
    }

    #[tokio::test]
    async fn before_agent_start_injection_reaches_the_persisted_context_message() {
        let model = Arc::new(MockLanguageModel::always_text("ack"));
        let ext = ExtensionRuntime::new(vec![Arc::new(InjectingExtension)]);
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).with_extensions(ext).build();

        kit.prompt("hi").await.unwrap();

        let (messages, _, _) = kit.store().build_context();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].as_text(), Some("[Context: injected context]".to_string()));
        assert_eq!(messages[1].as_text(), Some("hi".to_string()));
    }

    #[tokio::test]
    async fn session_start_and_shutdown_are_dispatched_once_each() {
        let starts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let shutdowns = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ext = ExtensionRuntime::new(vec![Arc::new(SessionLifecycleExtension { starts: starts.clone(), shutdowns: shutdowns.clone() })]);
        let model = Arc::new(MockLanguageModel::always_text("hi"));
        let kit = KitBuilder::new(model).with_store(TreeStore::in_memory("/tmp/proj")).with_extensions(ext).build();

        assert_eq!(starts.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(shutdowns.load(std::sync::atomic::Ordering::SeqCst), 0);

        kit.close();
        assert_eq!(shutdowns.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
