// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session file is missing its header line")]
    HeaderMissing,

    #[error("branch target {0} is not a known entry")]
    UnknownEntry(String),

    #[error("store is read-only: {0}")]
    ReadOnly(String),
}
