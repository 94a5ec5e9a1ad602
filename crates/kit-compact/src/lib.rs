// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Token-budget-driven context compaction: when the estimated
//! conversation size exceeds the model's context window minus a reserve,
//! replace the oldest messages with an LLM-generated checkpoint summary
//! while never splitting a tool-call/tool-result pair.

mod cutpoint;
mod estimate;
mod summarize;
mod truncate;

pub use cutpoint::{find_cut_point, force_cut_point, resolve_cut_point};
pub use estimate::{estimate_tokens, should_compact};
pub use summarize::{compact_messages, CompactionError, CompactionOutcome};
pub use truncate::smart_truncate;

/// Default safety margin reserved for the model's reply.
pub const DEFAULT_RESERVE_TOKENS: usize = 16_384;

/// Default token budget kept verbatim from the conversation tail.
pub const DEFAULT_KEEP_RECENT_TOKENS: usize = 20_000;
