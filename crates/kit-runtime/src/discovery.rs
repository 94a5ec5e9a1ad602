// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Per-directory config subdirectory names checked in ascending precedence
/// (later wins on collision at the same filesystem depth). `.kit` is this
/// project's own brand; the rest are kept for compatibility with the other
/// tool ecosystems skills/extensions are commonly shared across.
pub const CONFIG_DIR_NAMES: &[&str] = &[".agents", ".claude", ".codex", ".cursor", ".kit"];

/// Walk up from `start` to the filesystem root, returning every ancestor
/// directory in root-first order.
pub fn ancestor_chain(start: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut cur = start.to_path_buf();
    loop {
        dirs.push(cur.clone());
        match cur.parent() {
            Some(p) if p != cur => cur = p.to_path_buf(),
            _ => break,
        }
    }
    dirs.reverse();
    dirs
}

/// Merge the ancestor chains of `project_root` and the user's home
/// directory, de-duplicate, and sort shallowest-first, so directories closer
/// to the project root are scanned last and win on name collisions.
pub fn build_sorted_search_dirs(project_root: Option<&Path>) -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let base = project_root
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("/"));

    let mut all: HashSet<PathBuf> = HashSet::new();
    for dir in ancestor_chain(&base) {
        all.insert(dir);
    }
    if let Some(h) = &home {
        for dir in ancestor_chain(h) {
            all.insert(dir);
        }
    }

    let mut sorted: Vec<PathBuf> = all.into_iter().collect();
    sorted.sort_by(|a, b| a.components().count().cmp(&b.components().count()).then_with(|| a.cmp(b)));
    sorted
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
