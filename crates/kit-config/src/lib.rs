// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Ambient configuration plumbing: a YAML config schema, a layered loader,
//! and the `${env://VAR}` / `${env://VAR:-default}` substitution
//! rule layered on top of plain YAML. Config-file *format* is kept minimal
//! on purpose; this crate exists to give the rest of the system a stable
//! substitution semantics to depend on.

mod env;
mod loader;
mod schema;

pub use env::{substitute as substitute_env, EnvSubstError};
pub use loader::{load, ConfigError};
pub use schema::{AgentConfig, Config, ExtensionsConfig, ModelConfig, ToolsConfig};
