// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KitError {
    #[error("session store error: {0}")]
    Store(#[from] kit_tree::TreeStoreError),
    #[error("compaction failed: {0}")]
    Compaction(#[from] kit_compact::CompactionError),
    #[error("model generation failed: {0}")]
    Generation(anyhow::Error),
}
