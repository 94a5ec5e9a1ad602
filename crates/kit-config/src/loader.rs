// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

use crate::env::{substitute, EnvSubstError};
use crate::schema::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_yaml::Error },
    #[error(transparent)]
    EnvSubst(#[from] EnvSubstError),
}

/// Ordered list of config layers, earliest first, later layers overriding
/// earlier ones.
fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/kit/config.yaml"));
        paths.push(home.join(".config/kit/config.yml"));
    }
    if let Some(cfg_dir) = dirs::config_dir() {
        paths.push(cfg_dir.join("kit/config.yaml"));
        paths.push(cfg_dir.join("kit/config.yml"));
    }
    paths.push(PathBuf::from(".kit/config.yaml"));
    paths.push(PathBuf::from(".kit/config.yml"));
    paths.push(PathBuf::from("kit.yaml"));
    paths.push(PathBuf::from("kit.yml"));
    paths
}

fn read_and_substitute(path: &Path) -> Result<Option<Value>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    let substituted = substitute(&raw)?;
    let value: Value = serde_yaml::from_str(&substituted).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    Ok(Some(value))
}

/// Deep-merge `src` into `dst`: mappings merge key-by-key recursively,
/// anything else (scalars, sequences) is overwritten by `src`.
fn merge_yaml(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Mapping(dst_map), Value::Mapping(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_value) => *dst_slot = src_value,
    }
}

/// Load configuration by merging every discovered layer (home, XDG,
/// project-local) plus an optional explicit path, in increasing precedence.
/// Falls back to `Config::default()` if nothing is found on disk — config
/// files are entirely optional.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut merged = Value::Mapping(Default::default());
    let mut found_any = false;

    for path in search_paths() {
        if let Some(layer) = read_and_substitute(&path)? {
            debug!(path = %path.display(), "merging config layer");
            merge_yaml(&mut merged, layer);
            found_any = true;
        }
    }
    if let Some(path) = explicit {
        if let Some(layer) = read_and_substitute(path)? {
            debug!(path = %path.display(), "merging explicit config layer");
            merge_yaml(&mut merged, layer);
            found_any = true;
        }
    }

    if !found_any {
        return Ok(Config::default());
    }

    serde_yaml::from_value(merged).map_err(|source| ConfigError::Parse { path: explicit.map(Path::to_path_buf).unwrap_or_default(), source })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn no_files_found_returns_default_config() {
        let cfg = load(Some(Path::new("/nonexistent/kit-test-config.yaml"))).unwrap();
        assert_eq!(cfg.agent.max_steps, 200);
    }

    #[test]
    fn explicit_path_is_loaded_and_parsed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "agent:\n max_steps: 42").unwrap();
        let cfg = load(Some(file.path())).unwrap();
        assert_eq!(cfg.agent.max_steps, 42);
    }

    #[test]
    fn merge_yaml_overwrites_scalars_and_merges_maps() {
        let mut dst: Value = serde_yaml::from_str("a: 1\nnested:\n x: 1\n y: 2").unwrap();
        let src: Value = serde_yaml::from_str("a: 2\nnested:\n x: 9").unwrap();
        merge_yaml(&mut dst, src);
        let merged: serde_yaml::Mapping = match dst {
            Value::Mapping(m) => m,
            _ => panic!("expected mapping"),
        };
        assert_eq!(merged.get("a").unwrap(), &Value::from(2));
    }

    #[test]
    fn missing_env_var_in_explicit_file_is_a_hard_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "model:\n api_key_env: \"${{env://KIT_TEST_MISSING_XYZ}}\"").unwrap();
        let result = load(Some(file.path()));
        assert!(result.is_err());
    }
}
