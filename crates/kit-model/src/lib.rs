// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Message/Part data model and the [`LanguageModel`] seam.
//!
//! This crate owns the conversation data model and the trait
//! boundary to concrete LLM providers, which are explicitly out of scope
//!. No wire format lives here — only the shapes callers exchange
//! with `LanguageModel::generate`.

mod mock;
mod provider;
mod types;

pub use mock::MockLanguageModel;
pub use provider::{LanguageModel, ResponseStream};
pub use types::{CompletionRequest, Message, Part, ResponseEvent, Role, ToolSchema, Usage};
