// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// A concrete, pluggable wire format for an LLM, ("modelled as a
/// `LanguageModel` capable of `Generate(ctx, prompt) -> StreamOrResponse`").
///
/// This trait is the thin seam; no concrete provider wire format lives in
/// this crate. See [`crate::mock::MockLanguageModel`] for the test double.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable provider name, for diagnostics.
    fn provider_name(&self) -> &str;

    /// Model identifier as reported to callers.
    fn model_id(&self) -> &str;

    /// The model's context window, in tokens. Used by the compactor's
    /// trigger policy.
    fn context_window(&self) -> usize;

    async fn generate(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}
