// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Escape a cwd into a filesystem-safe directory component: path separators
/// become `--`, leading separators are stripped.
pub fn escape_cwd(cwd: &Path) -> String {
    let s = cwd.to_string_lossy();
    let trimmed = s.trim_start_matches(std::path::MAIN_SEPARATOR);
    trimmed.replace(std::path::MAIN_SEPARATOR, "--")
}

/// `<configHome>/sessions/<escaped-cwd>/`
pub fn sessions_dir(config_home: &Path, cwd: &Path) -> PathBuf {
    config_home.join("sessions").join(escape_cwd(cwd))
}

/// `<YYYY-MM-DDThh-mm-ss-SSSZ>_<sessionIDShort>.jsonl`
pub fn session_file_name(timestamp: DateTime<Utc>, session_id_short: &str) -> String {
    let ts = timestamp.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    format!("{ts}_{session_id_short}.jsonl")
}

/// Deterministic path for a brand-new session rooted at `cwd`.
pub fn new_session_path(config_home: &Path, cwd: &Path, timestamp: DateTime<Utc>, session_id_short: &str) -> PathBuf {
    sessions_dir(config_home, cwd).join(session_file_name(timestamp, session_id_short))
}

/// Resolve the platform config/data home used for session storage via the
/// `dirs` crate rather than a hand-rolled XDG implementation.
pub fn default_config_home() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
