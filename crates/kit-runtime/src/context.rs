// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Walk up from the current working directory until a `.git` directory is
/// found; falls back to the (canonicalised) starting directory when none is
/// found so callers always get a usable path.
pub fn find_project_root() -> std::io::Result<PathBuf> {
    let start = std::env::current_dir()?;
    let mut current = start.as_path();
    loop {
        if current.join(".git").exists() {
            return std::fs::canonicalize(current);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    std::fs::canonicalize(&start)
}

const GIT_OUTPUT_LIMIT: usize = 4 * 1024;
const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Git metadata collected at the project root, for inclusion in the system
/// prompt's ambient context (not part of the core spec, but ambient context
/// the agent loop's `BuildContext` step is free to fold in).
#[derive(Debug, Default, Clone)]
pub struct GitContext {
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub remote_url: Option<String>,
    pub dirty_count: usize,
}

pub fn collect_git_context(project_root: &Path) -> GitContext {
    let branch = run_git_timed(&["rev-parse", "--abbrev-ref", "HEAD"], project_root);
    let commit = run_git_timed(&["rev-parse", "--short", "HEAD"], project_root);
    let remote_url = run_git_timed(&["remote", "get-url", "origin"], project_root);
    let dirty_count = run_git_timed(&["status", "--porcelain"], project_root).map(|s| s.lines().count()).unwrap_or(0);
    GitContext { branch, commit, remote_url, dirty_count }
}

fn run_git_timed(args: &[&str], dir: &Path) -> Option<String> {
    use std::sync::mpsc;
    use std::thread;

    let dir = dir.to_path_buf();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
            let result = std::process::Command::new("git").args(&args).current_dir(&dir).output();
            let _ = tx.send(result);
    });

    let output = rx.recv_timeout(GIT_TIMEOUT).ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout[..output.stdout.len().min(GIT_OUTPUT_LIMIT)]);
    let s = raw.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl GitContext {
    pub fn is_empty(&self) -> bool {
        self.branch.is_none() && self.commit.is_none()
    }

    pub fn to_prompt_section(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut lines = vec!["## Git Context".to_string()];
        if let Some(branch) = &self.branch {
            lines.push(format!("Branch: {branch}"));
        }
        if let Some(commit) = &self.commit {
            lines.push(format!("Commit: {commit}"));
        }
        if let Some(remote) = &self.remote_url {
            lines.push(format!("Remote: {remote}"));
        }
        if self.dirty_count > 0 {
            lines.push(format!("Uncommitted changes: {} file(s)", self.dirty_count));
        } else if self.commit.is_some() {
            lines.push("Working tree: clean".to_string());
        }
        Some(lines.join("\n"))
    }
}

/// Snapshot of the CI environment, read from well-known environment
/// variables. Covers the two most common hosted providers plus a generic
/// `CI=true` fallback.
#[derive(Debug, Default, Clone)]
pub struct CiContext {
    pub provider: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub run_id: Option<String>,
}

pub fn detect_ci_context() -> CiContext {
    let mut ctx = CiContext::default();

    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        ctx.provider = Some("GitHub Actions".to_string());
        ctx.repo = std::env::var("GITHUB_REPOSITORY").ok();
        ctx.branch = std::env::var("GITHUB_REF_NAME").ok();
        ctx.commit = std::env::var("GITHUB_SHA").ok();
        ctx.run_id = std::env::var("GITHUB_RUN_ID").ok();
    } else if std::env::var("GITLAB_CI").as_deref() == Ok("true") {
        ctx.provider = Some("GitLab CI".to_string());
        ctx.repo = std::env::var("CI_PROJECT_PATH").ok();
        ctx.branch = std::env::var("CI_COMMIT_REF_NAME").ok();
        ctx.commit = std::env::var("CI_COMMIT_SHA").ok();
        ctx.run_id = std::env::var("CI_PIPELINE_ID").ok();
    } else if std::env::var("CI").as_deref() == Ok("true") {
        ctx.provider = Some("CI".to_string());
        ctx.branch = std::env::var("BRANCH_NAME").ok().or_else(|| std::env::var("GIT_BRANCH").ok());
        ctx.commit = std::env::var("GIT_COMMIT").ok();
    }

    ctx
}

impl CiContext {
    pub fn is_ci(&self) -> bool {
        self.provider.is_some()
    }

    pub fn to_prompt_section(&self) -> Option<String> {
        let provider = self.provider.as_deref()?;
        let mut lines = vec!["## CI Context".to_string(), format!("Provider: {provider}")];
        if let Some(repo) = &self.repo {
            lines.push(format!("Repository: {repo}"));
        }
        if let Some(branch) = &self.branch {
            lines.push(format!("Branch: {branch}"));
        }
        if let Some(commit) = &self.commit {
            lines.push(format!("Commit: {commit}"));
        }
        if let Some(run_id) = &self.run_id {
            lines.push(format!("Run: {run_id}"));
        }
        Some(lines.join("\n"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_git_context_yields_no_section() {
        let ctx = GitContext::default();
        assert!(ctx.to_prompt_section().is_none());
    }

    #[test]
    fn git_context_with_data_formats_a_section() {
        let ctx = GitContext { branch: Some("main".into()), commit: Some("abc1234".into()), remote_url: None, dirty_count: 0 };
        let section = ctx.to_prompt_section().unwrap();
        assert!(section.contains("Branch: main"));
        assert!(section.contains("clean"));
    }

    #[test]
    fn dirty_count_is_reported() {
        let ctx = GitContext { branch: None, commit: Some("abc".into()), remote_url: None, dirty_count: 3 };
        let section = ctx.to_prompt_section().unwrap();
        assert!(section.contains("3 file(s)"));
    }

    #[test]
    fn ci_context_without_provider_has_no_section() {
        let ctx = CiContext::default();
        assert!(!ctx.is_ci());
        assert!(ctx.to_prompt_section().is_none());
    }

    #[test]
    fn find_project_root_returns_a_directory() {
        let root = find_project_root().unwrap();
        assert!(root.is_dir());
    }
}
