// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Extension runtime: directory discovery, the concrete-type sandbox, and
//! dispatch over the 13-kind lifecycle event taxonomy. Unlike
//! `kit-hooks`, extensions are not code the host process links in — they are
//! discovered on disk as `extension.yaml` manifests and constructed from a
//! small built-in-kind registry, since no scripting or WASM
//! engine exists anywhere in this corpus to load arbitrary extension code.

mod builtin;
mod event;
mod manifest;
mod runtime;

pub use event::{
    AgentEndEvent, AgentStartEvent, BeforeAgentStartEvent, BeforeAgentStartResult, Extension, InputAction, InputEvent,
    InputResult, MessageEndEvent, MessageStartEvent, MessageUpdateEvent, SessionShutdownEvent, SessionStartEvent,
    ToolCallEvent, ToolCallResult, ToolExecutionEndEvent, ToolExecutionStartEvent, ToolResultEvent, ToolResultResult,
};
pub use manifest::{Manifest, ManifestError, MANIFEST_FILE_NAME};
pub use runtime::{ExtensionRuntime, InputOutcome};
