// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The composition root: the bounded step machine ([`AgentLoop`]) and the
//! [`Kit`] façade that wires it to the session store, hooks, extensions,
//! event bus, and compactor behind one shared `run_turn` contract.

mod agent_loop;
mod error;
mod kit;

pub use agent_loop::{AgentLoop, CancelSignal, TurnOutcome};
pub use error::KitError;
pub use kit::{CompactOptions, CompactionSummary, Kit, KitBuilder, PromptOutcome};
