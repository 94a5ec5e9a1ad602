// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::discovery::{build_sorted_search_dirs, CONFIG_DIR_NAMES};

const MAX_SKILL_FILE_BYTES: u64 = 256 * 1024;

/// A declarative skill: markdown content the agent is told to read on
/// demand, never executed directly.
#[derive(Debug, Clone)]
pub struct Skill {
    /// Derived from the file's stem (e.g. `code-review.md` → `code-review`).
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub when: Option<String>,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
struct Frontmatter {
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    when: Option<String>,
}

/// Parse a skill markdown file's optional YAML frontmatter. A file with no `---` fence is still a
/// valid skill; its description falls back to the first non-empty line.
fn parse_skill_file(raw: &str, default_name: &str) -> Skill {
    let trimmed = raw.trim_start_matches('\n');
    if let Some(after_open) = trimmed.strip_prefix("---") {
        if let Some(close) = after_open.find("\n---") {
            let yaml_block = &after_open[..close];
            if let Ok(fm) = serde_yaml::from_str::<Frontmatter>(yaml_block) {
                let name = fm.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| default_name.to_string());
                let description = if fm.description.trim().is_empty() {
                    first_nonempty_line(trimmed).unwrap_or_else(|| name.clone())
                } else {
                    fm.description
                };
                return Skill { name, description, tags: fm.tags, when: fm.when, path: PathBuf::new() };
            }
        }
    }

    let description = first_nonempty_line(trimmed).unwrap_or_else(|| default_name.to_string());
    Skill { name: default_name.to_string(), description, tags: Vec::new(), when: None, path: PathBuf::new() }
}

fn first_nonempty_line(text: &str) -> Option<String> {
    text.lines().map(str::trim).find(|l| !l.is_empty()).map(|l| l.trim_start_matches('#').trim().to_string())
}

fn try_load(path: &Path) -> Option<Skill> {
    let size = path.metadata().map(|m| m.len()).unwrap_or(0);
    if size > MAX_SKILL_FILE_BYTES {
        warn!(path = %path.display(), size, "skipping oversized skill file");
        return None;
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read skill file");
            return None;
        }
    };
    let default_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("skill").to_string();
    let mut skill = parse_skill_file(&raw, &default_name);
    skill.path = path.to_path_buf();
    Some(skill)
}

fn scan_skills_dir(dir: &Path, out: &mut HashMap<String, Skill>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_md = path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("md")).unwrap_or(false);
        if path.is_file() && is_md {
            if let Some(skill) = try_load(&path) {
                out.insert(skill.name.clone(), skill);
            }
        }
    }
}

/// Discover skills across the ancestor-walk precedence chain. Checks
/// `.agents/skills`, `.claude/skills`, `.codex/skills`, `.cursor/skills`,
/// and `.kit/skills` at every directory between the filesystem root and both
/// `project_root` and the user's home, directories closer to the project
/// root winning on name collision.
pub fn discover_skills(project_root: Option<&Path>) -> Vec<Skill> {
    let mut map: HashMap<String, Skill> = HashMap::new();
    for dir in build_sorted_search_dirs(project_root) {
        for config_dir in CONFIG_DIR_NAMES {
            scan_skills_dir(&dir.join(config_dir).join("skills"), &mut map);
        }
    }
    let mut skills: Vec<Skill> = map.into_values().collect();
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

/// Render the system-prompt section listing each skill's name, description,
/// and absolute `file://` location, instructing the model to read it on
/// demand via the filesystem tool.
pub fn render_system_prompt_section(skills: &[Skill]) -> Option<String> {
    if skills.is_empty() {
        return None;
    }
    let mut lines = vec![
        "## Available Skills".to_string(),
        "Read a skill's file on demand when its description matches the current task.".to_string(),
    ];
    for skill in skills {
        let location = format!("file://{}", skill.path.display());
        lines.push(format!("- **{}** — {} ({})", skill.name, skill.description, location));
    }
    Some(lines.join("\n"))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parse_skill_file_with_frontmatter() {
        let raw = "---\nname: reviewer\ndescription: Reviews code\ntags: [review]\nwhen: on PR\n---\nBody text\n";
        let skill = parse_skill_file(raw, "fallback");
        assert_eq!(skill.name, "reviewer");
        assert_eq!(skill.description, "Reviews code");
        assert_eq!(skill.tags, vec!["review".to_string()]);
        assert_eq!(skill.when.as_deref(), Some("on PR"));
    }

    #[test]
    fn parse_skill_file_without_frontmatter_uses_first_line() {
        let raw = "# My Skill\nDoes a thing.\n";
        let skill = parse_skill_file(raw, "my-skill");
        assert_eq!(skill.name, "my-skill");
        assert_eq!(skill.description, "My Skill");
    }

    #[test]
    fn discover_skills_finds_files_under_dot_kit() {
        let dir = tempdir().unwrap();
        let skills_dir = dir.path().join(".kit").join("skills");
        fs::create_dir_all(&skills_dir).unwrap();
        fs::write(skills_dir.join("deploy.md"), "---\ndescription: Deploys the app\n---\nSteps..\n").unwrap();

        let found = discover_skills(Some(dir.path()));
        assert!(found.iter().any(|s| s.name == "deploy" && s.description == "Deploys the app"));
    }

    #[test]
    fn project_level_skill_overrides_same_name_from_home() {
        // Only verifies the override mechanism (HashMap keyed by name) works
        // within a single scan; cross-directory precedence is exercised by
        // `discover_skills` driving `build_sorted_search_dirs` shallow-to-deep.
        let mut map = HashMap::new();
        map.insert("x".to_string(), Skill { name: "x".into(), description: "old".into(), tags: vec![], when: None, path: PathBuf::new() });
        map.insert("x".to_string(), Skill { name: "x".into(), description: "new".into(), tags: vec![], when: None, path: PathBuf::new() });
        assert_eq!(map.get("x").unwrap().description, "new");
    }

    #[test]
    fn render_system_prompt_section_is_none_when_empty() {
        assert!(render_system_prompt_section(&[]).is_none());
    }

    #[test]
    fn render_system_prompt_section_lists_file_uri() {
        let skill = Skill { name: "a".into(), description: "does a".into(), tags: vec![], when: None, path: PathBuf::from("/tmp/a.md") };
        let section = render_system_prompt_section(&[skill]).unwrap();
        assert!(section.contains("file:///tmp/a.md"));
    }
}
