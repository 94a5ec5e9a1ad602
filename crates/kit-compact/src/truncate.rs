// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use kit_tools::OutputCategory;

/// Deterministic, content-aware tool-result truncation.
///
/// Returns `content` unchanged when it fits within `cap_tokens`. Otherwise
/// applies a category-specific extraction strategy that preserves the most
/// useful portion of the output. Dispatching on [`OutputCategory`] (not on
/// tool names) keeps this function independent of the tools crate's concrete
/// tool list; each tool declares its own category.
///
/// - [`OutputCategory::HeadTail`]: keep the first 60 + last 40 lines so both
/// the command preamble and the final result are visible.
/// - [`OutputCategory::MatchList`]: keep leading matches (highest relevance
/// first); the tail is not preserved because later matches are less
/// relevant.
/// - [`OutputCategory::FileContent`]: balanced head + tail with a separator,
/// preserving both the imports/declarations and the most recent changes.
/// - [`OutputCategory::Generic`]: hard-truncate at the nearest line boundary.
///
/// Every truncated result ends with an explicit notice so the model knows
/// that additional content exists and how to retrieve it.
pub fn smart_truncate(content: &str, category: OutputCategory, cap_tokens: usize) -> String {
    if cap_tokens == 0 {
        return content.to_string();
    }
    let cap_chars = cap_tokens * 4;
    if content.len() <= cap_chars {
        return content.to_string();
    }
    let omitted_bytes = content.len().saturating_sub(cap_chars);
    match category {
        OutputCategory::HeadTail => head_tail_lines(
            content,
            cap_chars,
            60,
            40,
            &format!("[.. {{lines}} lines / {omitted_bytes} bytes omitted..]"),
        ),
        OutputCategory::MatchList => head_lines(
            content,
            cap_chars,
            &format!(
                "[.. {{lines}} more matches omitted ({omitted_bytes} bytes); \
                use a more specific pattern to see them..]"
            ),
        ),
        OutputCategory::FileContent => head_tail_lines(
            content,
            cap_chars,
            usize::MAX,
            usize::MAX,
            &format!(
                "[.. {{lines}} lines omitted ({omitted_bytes} bytes); \
                use the file tool's offset/limit to see more..]"
            ),
        ),
        OutputCategory::Generic => {
            let cut = content[..cap_chars].rfind('\n').map(|p| p + 1).unwrap_or(cap_chars);
            format!(
                "{}\n[.. {omitted_bytes} bytes omitted; content truncated to fit context budget..]",
                &content[..cut]
            )
        }
    }
}

/// Keep only the leading lines that fit within `cap_chars`.
fn head_lines(content: &str, cap_chars: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = String::with_capacity(cap_chars);
    let mut kept_count = 0usize;
    for line in &lines {
        let needed = if kept.is_empty() { line.len() } else { line.len() + 1 };
        if kept.len() + needed > cap_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_count += 1;
    }
    let omitted = lines.len().saturating_sub(kept_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{kept}\n{notice}")
}

/// Keep `max_head` leading lines and `max_tail` trailing lines, inserting a
/// notice between them. Pass `usize::MAX` to split evenly by character budget.
fn head_tail_lines(content: &str, cap_chars: usize, max_head: usize, max_tail: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let half_cap = cap_chars / 2;

    let mut head = String::with_capacity(half_cap);
    let mut head_count = 0usize;
    for line in lines.iter().take(max_head) {
        let needed = if head.is_empty() { line.len() } else { line.len() + 1 };
        if head.len() + needed > half_cap {
            break;
        }
        if !head.is_empty() {
            head.push('\n');
        }
        head.push_str(line);
        head_count += 1;
    }

    let mut tail_lines: Vec<&str> = Vec::new();
    let mut tail_chars = 0usize;
    for line in lines.iter().rev().take(max_tail) {
        let needed = if tail_lines.is_empty() { line.len() } else { line.len() + 1 };
        if tail_chars + needed > half_cap {
            break;
        }
        tail_chars += needed;
        tail_lines.push(line);
    }
    tail_lines.reverse();
    let tail_count = tail_lines.len();
    let tail = tail_lines.join("\n");

    let omitted = lines.len().saturating_sub(head_count + tail_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{head}\n{notice}\n{tail}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_under_cap_is_unchanged() {
        let out = smart_truncate("short", OutputCategory::Generic, 1000);
        assert_eq!(out, "short");
    }

    #[test]
    fn zero_cap_disables_truncation() {
        let content = "x".repeat(10_000);
        assert_eq!(smart_truncate(&content, OutputCategory::Generic, 0), content);
    }

    #[test]
    fn generic_truncates_at_line_boundary_with_notice() {
        let content = (0..500).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let out = smart_truncate(&content, OutputCategory::Generic, 50);
        assert!(out.contains("bytes omitted"));
        assert!(out.len() < content.len());
    }

    #[test]
    fn head_tail_preserves_both_ends() {
        let content = (0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let out = smart_truncate(&content, OutputCategory::HeadTail, 50);
        assert!(out.contains("line 0"));
        assert!(out.contains("line 199"));
        assert!(out.contains("lines"));
    }

    #[test]
    fn match_list_keeps_leading_matches_only() {
        let content = (0..200).map(|i| format!("match {i}")).collect::<Vec<_>>().join("\n");
        let out = smart_truncate(&content, OutputCategory::MatchList, 50);
        assert!(out.contains("match 0"));
        assert!(!out.contains("match 199"));
    }

    #[test]
    fn file_content_splits_evenly_between_head_and_tail() {
        let content = (0..400).map(|i| format!("file line {i}")).collect::<Vec<_>>().join("\n");
        let out = smart_truncate(&content, OutputCategory::FileContent, 100);
        assert!(out.contains("file line 0"));
        assert!(out.contains("file line 399"));
    }
}
