// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use kit_model::Message;

/// Character count divided by 4 — coarse but sufficient for the trigger
/// policy. The LLM's own accounting is used for actual billing
/// elsewhere; this estimate only decides *when* to compact.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(Message::approx_tokens).sum()
}

/// `contextWindow - reserveTokens > estimatedTokens` decides whether
/// compaction should fire automatically. A zero
/// window or zero reserve disables the trigger rather than comparing against
/// a meaningless budget.
pub fn should_compact(messages: &[Message], context_window: usize, reserve_tokens: usize) -> bool {
    if context_window == 0 || reserve_tokens == 0 {
        return false;
    }
    let budget = context_window.saturating_sub(reserve_tokens);
    estimate_tokens(messages) > budget
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use kit_model::Role;

    use super::*;

    #[test]
    fn estimate_tokens_of_empty_list_is_zero() {
        assert_eq!(estimate_tokens(&[]), 0);
    }

    #[test]
    fn estimate_tokens_sums_per_message_estimates() {
        let messages = vec![Message::user("12345678"), Message::assistant("abcd")];
        assert_eq!(estimate_tokens(&messages), 3);
    }

    #[test]
    fn should_compact_false_when_under_budget() {
        let messages = vec![Message::user("short")];
        assert!(!should_compact(&messages, 100_000, 16_384));
    }

    #[test]
    fn should_compact_true_when_over_budget() {
        let big_text = "x".repeat(400_000);
        let messages = vec![Message::user(big_text)];
        assert!(should_compact(&messages, 100_000, 16_384));
    }

    #[test]
    fn should_compact_false_when_window_is_zero() {
        let messages = vec![Message::user("x".repeat(1_000_000))];
        assert!(!should_compact(&messages, 0, 16_384));
    }

    #[test]
    fn should_compact_false_when_reserve_is_zero() {
        let messages = vec![Message::user("x".repeat(1_000_000))];
        assert!(!should_compact(&messages, 100_000, 0));
    }

    #[test]
    fn should_compact_respects_non_system_and_system_alike() {
        let messages = vec![Message { role: Role::System, parts: vec![] }];
        assert!(!should_compact(&messages, 1000, 10));
    }
}
