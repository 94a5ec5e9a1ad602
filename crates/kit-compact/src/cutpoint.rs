// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use kit_model::{Message, Role};

/// Token-budget walk.
///
/// Walks messages right-to-left accumulating token estimates. The raw cut is
/// the index where the accumulated total would first exceed
/// `keep_recent_tokens`; it is then adjusted forward so it never splits a
/// `{ToolCall, ToolResult}` pair (the message at the cut must have role ≠
/// `tool`).
///
/// Returns `0` when every message fits inside the budget — there is nothing
/// to cut.
pub fn find_cut_point(messages: &[Message], keep_recent_tokens: usize) -> usize {
    let mut accumulated = 0usize;
    let mut cut = 0usize;
    for i in (0..messages.len()).rev() {
        let tokens = messages[i].approx_tokens();
        if accumulated + tokens > keep_recent_tokens {
            cut = i + 1;
            return adjust_to_non_tool_boundary(messages, cut);
        }
        accumulated += tokens;
        cut = i;
    }
    let _ = cut;
    0
}

/// Advance `cut` forward until the message at that index has role ≠ `tool`,
/// so the cut never separates a tool call from its result. A cut that has walked off the end of the slice is
/// left as-is (`messages.len()`).
fn adjust_to_non_tool_boundary(messages: &[Message], mut cut: usize) -> usize {
    while cut < messages.len() && messages[cut].role == Role::Tool {
        cut += 1;
    }
    cut
}

/// Forced-compaction fallback: when every message fits
/// the budget but the caller forces compaction anyway, use the index of the
/// last non-tool message as the boundary.
pub fn force_cut_point(messages: &[Message]) -> usize {
    for i in (0..messages.len()).rev() {
        if messages[i].role != Role::Tool {
            return i;
        }
    }
    messages.len()
}

/// Full cut-point decision: resolves to `None`
/// ("nothing to compact") or `Some(cut)` where `messages[0.cut)` should be
/// summarised and `messages[cut..]` preserved verbatim.
pub fn resolve_cut_point(messages: &[Message], keep_recent_tokens: usize, forced: bool) -> Option<usize> {
    let raw = find_cut_point(messages, keep_recent_tokens);
    if raw == 0 {
        if !forced {
            return None;
        }
        let forced_cut = force_cut_point(messages);
        return if forced_cut < 2 { None } else { Some(forced_cut) };
    }
    if raw < 2 {
        return None;
    }
    Some(raw)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
