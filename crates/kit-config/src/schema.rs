// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub extensions: ExtensionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: String,
    pub model_id: String,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub context_window: usize,
    pub max_output_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model_id: String::new(),
            api_key_env: None,
            base_url: None,
            context_window: 128_000,
            max_output_tokens: 8_192,
            temperature: None,
        }
    }
}

/// Agent-loop and compaction tuning. Only the token-budget
/// compaction variant is represented — see DESIGN.md's Open Question
/// decision; there is no percentage-threshold sibling here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub reserve_tokens: usize,
    pub keep_recent_tokens: usize,
    pub tool_result_token_cap: usize,
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 200,
            reserve_tokens: kit_compact_defaults::RESERVE_TOKENS,
            keep_recent_tokens: kit_compact_defaults::KEEP_RECENT_TOKENS,
            tool_result_token_cap: 4_000,
            system_prompt: None,
        }
    }
}

/// Mirrors `kit_compact`'s defaults without introducing a dependency edge
/// from `kit-config` to `kit-compact` purely for two constants.
mod kit_compact_defaults {
    pub const RESERVE_TOKENS: usize = 16_384;
    pub const KEEP_RECENT_TOKENS: usize = 20_000;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub builtin_enabled: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { timeout_secs: 60, builtin_enabled: true }
    }
}

/// Explicit, CLI-provided extension paths. Global and project discovery live in `kit-ext`; this is
/// only the caller-supplied override list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub paths: Vec<PathBuf>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_model_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.model.context_window, 128_000);
        assert_eq!(cfg.agent.max_steps, 200);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.model.context_window, cfg.model.context_window);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = "model:\n provider: anthropic\n model_id: claude\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.model.provider, "anthropic");
        assert_eq!(cfg.agent.max_steps, 200);
    }
}
