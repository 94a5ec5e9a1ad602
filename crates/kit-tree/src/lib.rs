// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tree-structured session journal: typed entries, append-only persistence,
//! and the movable leaf pointer that defines the conversation prefix sent to
//! the LLM.

mod entry;
mod error;
mod path;
mod store;

pub use entry::{new_entry_id, Entry, EntryKind, SessionHeader};
pub use error::TreeStoreError;
pub use path::{default_config_home, escape_cwd, new_session_path, session_file_name, sessions_dir};
pub use store::{TreeNode, TreeStore};
