// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::builtin;
use crate::event::Extension;

pub const MANIFEST_FILE_NAME: &str = "extension.yaml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error("unknown extension kind {kind:?} in {path}")]
    UnknownKind { path: String, kind: String },
}

/// The declarative manifest every extension directory carries:
/// no scripting or WASM engine exists in this corpus, so an extension's
/// behaviour is selected from a small built-in-kind registry by name rather
/// than loaded as arbitrary executable code.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ManifestError::Read { path: path.display().to_string(), source: e })?;
    serde_yaml::from_str(&raw).map_err(|e| ManifestError::Parse { path: path.display().to_string(), source: e })
}

/// Construct the extension a manifest names, dispatching on `kind` against
/// the built-in registry. Returns `Ok(None)` for an unreadable
/// or absent manifest (not every directory that matches the search pattern
/// need carry one); returns `Err` only for a manifest that parses but names
/// an unrecognised kind, since that is almost certainly an authoring mistake
/// worth surfacing rather than silently skipping.
pub fn build_from_manifest_path(path: &Path) -> Result<Option<Arc<dyn Extension>>, ManifestError> {
    if !path.is_file() {
        return Ok(None);
    }
    let manifest = match load_manifest(path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable extension manifest");
            return Ok(None);
        }
    };
    builtin::construct(&manifest)
        .map(Some)
        .ok_or_else(|| ManifestError::UnknownKind { path: path.display().to_string(), kind: manifest.kind.clone() })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn build_from_manifest_path_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let result = build_from_manifest_path(&dir.path().join(MANIFEST_FILE_NAME)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn build_from_manifest_path_unknown_kind_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        fs::write(&path, "name: mystery\nkind: does_not_exist\n").unwrap();
        let result = build_from_manifest_path(&path);
        assert!(matches!(result, Err(ManifestError::UnknownKind { .. })));
    }

    #[test]
    fn build_from_manifest_path_known_kind_constructs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        fs::write(&path, "name: greeter\nkind: greet_tool\n").unwrap();
        let result = build_from_manifest_path(&path).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().name(), "greeter");
    }
}
