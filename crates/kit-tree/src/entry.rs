// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use kit_model::{Part, Role};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// File preamble. Line 1 of every journal; not part of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHeader {
    pub version: u32,
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session: Option<String>,
}

impl SessionHeader {
    pub fn new(cwd: impl Into<String>) -> Self {
        Self { version: 1, cwd: cwd.into(), parent_session: None }
    }
}

/// The typed payload of one tree entry, entry-kind table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    Message {
        role: Role,
        parts: Vec<Part>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    ModelChange {
        provider: String,
        model_id: String,
    },
    BranchSummary {
        from_id: String,
        summary: String,
    },
    Label {
        target_id: String,
        label: String,
    },
    SessionInfo {
        name: String,
    },
}

/// One line of the journal after the header. Every non-header entry carries
/// `{id, parent_id, type, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub parent_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// Fresh 64-bit random identifier, rendered as lowercase hex.
/// Freshness at append time plus an append-only store makes cycles
/// structurally impossible: `parent_id` must already exist when an entry is
/// created, and entries are never rewritten afterwards.
pub fn new_entry_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Minimal hex encoding, kept local so this crate does not pull in a
/// dedicated `hex` dependency for eight bytes.
mod hex {
    pub fn encode(bytes: [u8; 8]) -> String {
        let mut s = String::with_capacity(16);
        for b in bytes {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_id_is_sixteen_hex_chars() {
        let id = new_entry_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn new_entry_id_is_fresh_each_call() {
        let a = new_entry_id();
        let b = new_entry_id();
        assert_ne!(a, b);
    }

    #[test]
    fn entry_round_trips_through_json() {
        let e = Entry {
            id: "abc123".into(),
            parent_id: "".into(),
            timestamp: Utc::now(),
            kind: EntryKind::Message {
                role: Role::User,
                parts: vec![Part::text("hi")],
                model: None,
                provider: None,
            },
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, e.id);
        assert!(matches!(back.kind, EntryKind::Message { .. }));
    }

    #[test]
    fn session_header_has_no_id_field() {
        let h = SessionHeader::new("/tmp/proj");
        let json = serde_json::to_value(&h).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("parent_id").is_none());
    }

    #[test]
    fn unknown_entry_type_is_rejected_by_strict_kind_but_not_whole_line() {
        // EntryKind itself rejects unknown tags; the store layer is
        // responsible for skipping such lines gracefully (see store.rs).
        let json = r#"{"type":"future_kind","foo":"bar"}"#;
        let result: Result<EntryKind, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
