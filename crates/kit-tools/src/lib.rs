// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool trait, flat registry, and the prefix-routing, schema-normalising,
//! hook-wrapping dispatcher.

mod builtin;
mod dispatcher;
mod registry;
mod schema;
mod tool;

pub use builtin::EchoTool;
pub use dispatcher::{ToolDispatcher, ToolLoadError, ToolProvider, TOOL_NAME_DELIMITER};
pub use registry::{ToolRegistry, ToolSchema};
pub use schema::normalize as normalize_schema;
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput};
