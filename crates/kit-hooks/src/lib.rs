// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Four independent priority-ordered interception chains:
//! `BeforeTurn`, `BeforeToolCall`, `AfterToolResult`, `AfterTurn`.

mod registry;
mod types;

use std::sync::Arc;

pub use registry::{PriorityRegistry, PriorityRegistryHandle, Unregister};
pub use types::{
    AfterToolResultInput, AfterToolResultOutput, AfterTurnInput, BeforeToolCallInput, BeforeToolCallOutput,
    BeforeTurnInput, BeforeTurnOutput,
};

pub type BeforeTurnRegistry = PriorityRegistryHandle<BeforeTurnInput, BeforeTurnOutput>;
pub type BeforeToolCallRegistry = PriorityRegistryHandle<BeforeToolCallInput, BeforeToolCallOutput>;
pub type AfterToolResultRegistry = PriorityRegistryHandle<AfterToolResultInput, AfterToolResultOutput>;
pub type AfterTurnRegistry = PriorityRegistryHandle<AfterTurnInput, ()>;

/// The four typed hook chains, bundled for convenient composition into the
/// `Kit` façade.
#[derive(Clone)]
pub struct HookRegistry {
    pub before_turn: Arc<BeforeTurnRegistry>,
    pub before_tool_call: Arc<BeforeToolCallRegistry>,
    pub after_tool_result: Arc<AfterToolResultRegistry>,
    pub after_turn: Arc<AfterTurnRegistry>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self {
            before_turn: PriorityRegistry::new(),
            before_tool_call: PriorityRegistry::new(),
            after_tool_result: PriorityRegistry::new(),
            after_turn: PriorityRegistry::new(),
        }
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
