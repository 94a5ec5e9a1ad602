// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use kit_model::{Message, Part, Role};
use serde::Serialize;
use tracing::warn;

use crate::entry::{new_entry_id, Entry, EntryKind, SessionHeader};
use crate::error::TreeStoreError;
use crate::path::{default_config_home, new_session_path, sessions_dir};

type Result<T> = std::result::Result<T, TreeStoreError>;

/// A single displayable node in [`TreeStore::tree`]'s output.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub entry: Entry,
    pub children: Vec<TreeNode>,
}

/// Either an open file handle appending to disk, or no persistence at all.
enum Sink {
    File(File),
    Memory,
}

struct Inner {
    header: SessionHeader,
    path: Option<PathBuf>,
    sink: Sink,
    by_id: HashMap<String, Entry>,
    /// Insertion order, used by `tree()` to walk deterministically.
    order: Vec<String>,
    children: HashMap<String, Vec<String>>,
    labels: HashMap<String, String>,
    session_name: Option<String>,
    leaf: String,
    /// Set when `Open` finds unreadable lines or a corrupt header is
    /// tolerated by the caller; disables further appends.
    read_only: bool,
}

/// Tree-structured, append-only session journal.
///
/// Cheaply cloneable: internally an `Arc<RwLock<Inner>>`, so handing a store
/// to multiple readers is free. A single mutex protects the whole store —
/// readers take a read lock, mutators take a write lock.
#[derive(Clone)]
pub struct TreeStore {
    inner: std::sync::Arc<RwLock<Inner>>,
}

impl TreeStore {
    /// Allocate storage under the deterministic path derived from `cwd`,
    /// write the header, and return an open store.
    pub fn create(cwd: impl AsRef<Path>) -> Result<Self> {
        let cwd = cwd.as_ref();
        let config_home = default_config_home();
        let dir = sessions_dir(&config_home, cwd);
        std::fs::create_dir_all(&dir)?;
        let session_id = new_entry_id();
        let now = Utc::now();
        let path = new_session_path(&config_home, cwd, now, &session_id[..8]);
        Self::create_at(&path, cwd)
    }

    /// Like [`Self::create`] but at an explicit path, for tests.
    pub fn create_at(path: impl AsRef<Path>, cwd: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let header = SessionHeader::new(cwd.as_ref().to_string_lossy().to_string());
        writeln!(file, "{}", serde_json::to_string(&header)?)?;
        Ok(Self {
                inner: std::sync::Arc::new(RwLock::new(Inner {
                            header,
                            path: Some(path.to_path_buf()),
                            sink: Sink::File(file),
                            by_id: HashMap::new(),
                            order: Vec::new(),
                            children: HashMap::new(),
                            labels: HashMap::new(),
                            session_name: None,
                            leaf: String::new(),
                            read_only: false,
                })),
        })
    }

    /// Scan the file, rebuild indices, set leaf = last entry.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines.next().ok_or(TreeStoreError::HeaderMissing)??;
        let header: SessionHeader =
        serde_json::from_str(&header_line).map_err(|_| TreeStoreError::HeaderMissing)?;

        let mut by_id = HashMap::new();
        let mut order = Vec::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut labels = HashMap::new();
        let mut session_name = None;
        let mut leaf = String::new();
        let mut read_only = false;

        for line in lines {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable session line");
                    read_only = true;
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let entry: Entry = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping entry of unknown or malformed type");
                    continue;
                }
            };
            match &entry.kind {
                EntryKind::Label { target_id, label } => {
                    labels.insert(target_id.clone(), label.clone());
                }
                EntryKind::SessionInfo { name } => {
                    session_name = Some(name.clone());
                }
                _ => {}
            }
            if !entry.parent_id.is_empty() {
                children.entry(entry.parent_id.clone()).or_default().push(entry.id.clone());
            }
            leaf = entry.id.clone();
            order.push(entry.id.clone());
            by_id.insert(entry.id.clone(), entry);
        }

        let open_file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
                inner: std::sync::Arc::new(RwLock::new(Inner {
                            header,
                            path: Some(path.to_path_buf()),
                            sink: Sink::File(open_file),
                            by_id,
                            order,
                            children,
                            labels,
                            session_name,
                            leaf,
                            read_only,
                })),
        })
    }

    /// Pick the newest store for `cwd` (by mtime), or `create` if none exists.
    pub fn continue_recent(cwd: impl AsRef<Path>) -> Result<Self> {
        let cwd = cwd.as_ref();
        let dir = sessions_dir(&default_config_home(), cwd);
        let newest = std::fs::read_dir(&dir).ok().and_then(|rd| {
            rd.filter_map(|e| e.ok())
                .filter(|e| e.path().extension().map(|ext| ext == "jsonl").unwrap_or(false))
                .max_by_key(|e| e.metadata().and_then(|m| m.modified()).ok())
                .map(|e| e.path())
        });
        match newest {
            Some(path) => Self::open(path),
            None => Self::create(cwd),
        }
    }

    /// Same semantics as [`Self::create`] without on-disk persistence.
    pub fn in_memory(cwd: impl AsRef<Path>) -> Self {
        let header = SessionHeader::new(cwd.as_ref().to_string_lossy().to_string());
        Self {
            inner: std::sync::Arc::new(RwLock::new(Inner {
                        header,
                        path: None,
                        sink: Sink::Memory,
                        by_id: HashMap::new(),
                        order: Vec::new(),
                        children: HashMap::new(),
                        labels: HashMap::new(),
                        session_name: None,
                        leaf: String::new(),
                        read_only: false,
            })),
        }
    }

    fn append_kind(&self, kind: EntryKind) -> Result<String> {
        let mut inner = self.inner.write().expect("tree store lock poisoned");
        if inner.read_only {
            return Err(TreeStoreError::ReadOnly("session opened in read-only mode".into()));
        }
        let entry = Entry {
            id: new_entry_id(),
            parent_id: inner.leaf.clone(),
            timestamp: Utc::now(),
            kind,
        };
        write_line(&mut inner.sink, &entry)?;
        if let EntryKind::Label { target_id, label } = &entry.kind {
            inner.labels.insert(target_id.clone(), label.clone());
        }
        if let EntryKind::SessionInfo { name } = &entry.kind {
            inner.session_name = Some(name.clone());
        }
        if !entry.parent_id.is_empty() {
            inner.children.entry(entry.parent_id.clone()).or_default().push(entry.id.clone());
        }
        inner.leaf = entry.id.clone();
        inner.order.push(entry.id.clone());
        inner.by_id.insert(entry.id.clone(), entry.clone());
        Ok(entry.id)
    }

    pub fn append_message(
        &self,
        role: Role,
        parts: Vec<Part>,
        model: Option<String>,
        provider: Option<String>,
    ) -> Result<String> {
        self.append_kind(EntryKind::Message { role, parts, model, provider })
    }

    pub fn append_model_change(&self, provider: impl Into<String>, model_id: impl Into<String>) -> Result<String> {
        self.append_kind(EntryKind::ModelChange { provider: provider.into(), model_id: model_id.into() })
    }

    pub fn append_branch_summary(&self, from_id: impl Into<String>, summary: impl Into<String>) -> Result<String> {
        self.append_kind(EntryKind::BranchSummary { from_id: from_id.into(), summary: summary.into() })
    }

    pub fn append_label(&self, target_id: impl Into<String>, label: impl Into<String>) -> Result<String> {
        self.append_kind(EntryKind::Label { target_id: target_id.into(), label: label.into() })
    }

    pub fn append_session_info(&self, name: impl Into<String>) -> Result<String> {
        self.append_kind(EntryKind::SessionInfo { name: name.into() })
    }

    /// Fails if `id` is unknown; otherwise sets `leaf = id`.
    pub fn branch(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().expect("tree store lock poisoned");
        if !inner.by_id.contains_key(id) {
            return Err(TreeStoreError::UnknownEntry(id.to_string()));
        }
        inner.leaf = id.to_string();
        Ok(())
    }

    /// Sets `leaf = ""`; the next `build_context` returns an empty list.
    pub fn reset_leaf(&self) {
        self.inner.write().expect("tree store lock poisoned").leaf.clear();
    }

    pub fn leaf(&self) -> String {
        self.inner.read().expect("tree store lock poisoned").leaf.clone()
    }

    pub fn get_entry(&self, id: &str) -> Option<Entry> {
        self.inner.read().expect("tree store lock poisoned").by_id.get(id).cloned()
    }

    pub fn session_name(&self) -> Option<String> {
        self.inner.read().expect("tree store lock poisoned").session_name.clone()
    }

    pub fn label_for(&self, target_id: &str) -> Option<String> {
        self.inner.read().expect("tree store lock poisoned").labels.get(target_id).cloned()
    }

    /// Walk from `leaf` root-ward following `parent_id`, reverse to
    /// root-first order, and produce the message list the LLM sees.
    pub fn build_context(&self) -> (Vec<Message>, Option<String>, Option<String>) {
        let inner = self.inner.read().expect("tree store lock poisoned");
        let mut chain = Vec::new();
        let mut cursor = inner.leaf.clone();
        while !cursor.is_empty() {
            match inner.by_id.get(&cursor) {
                Some(entry) => {
                    chain.push(entry.clone());
                    cursor = entry.parent_id.clone();
                }
                None => break,
            }
        }
        chain.reverse();

        let mut messages = Vec::new();
        let mut last_provider = None;
        let mut last_model = None;
        for entry in chain {
            match entry.kind {
                EntryKind::Message { role, parts, model, provider } => {
                    messages.push(Message { role, parts });
                    if model.is_some() {
                        last_model = model;
                    }
                    if provider.is_some() {
                        last_provider = provider;
                    }
                }
                EntryKind::BranchSummary { summary, .. } => {
                    messages.push(Message::user(format!("[Branch context: {summary}]")));
                }
                EntryKind::ModelChange { provider, model_id } => {
                    last_provider = Some(provider);
                    last_model = Some(model_id);
                }
                EntryKind::Label { .. } | EntryKind::SessionInfo { .. } => {}
            }
        }
        (messages, last_provider, last_model)
    }

    /// Full tree for display, rooted at every entry with an unknown/empty
    /// parent.
    pub fn tree(&self) -> Vec<TreeNode> {
        let inner = self.inner.read().expect("tree store lock poisoned");
        let roots: Vec<&String> = inner
            .order
            .iter()
            .filter(|id| {
                let e = &inner.by_id[*id];
                e.parent_id.is_empty() || !inner.by_id.contains_key(&e.parent_id)
            })
            .collect();
        roots.into_iter().map(|id| build_node(&inner, id)).collect()
    }

    /// Release the file handle. A no-op for in-memory stores.
    pub fn close(&self) {
        let mut inner = self.inner.write().expect("tree store lock poisoned");
        if let Sink::File(f) = &mut inner.sink {
            let _ = f.flush();
        }
        inner.sink = Sink::Memory;
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.read().expect("tree store lock poisoned").path.clone()
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read().expect("tree store lock poisoned").read_only
    }
}

fn build_node(inner: &Inner, id: &str) -> TreeNode {
    let entry = inner.by_id[id].clone();
    let children = inner
        .children
        .get(id)
        .map(|ids| ids.iter().map(|cid| build_node(inner, cid)).collect())
        .unwrap_or_default();
    TreeNode { entry, children }
}

fn write_line(sink: &mut Sink, entry: &Entry) -> Result<()> {
    match sink {
        Sink::File(f) => {
            writeln!(f, "{}", to_json(entry)?)?;
            f.flush()?;
        }
        Sink::Memory => {}
    }
    Ok(())
}

fn to_json<T: Serialize>(v: &T) -> Result<String> {
    Ok(serde_json::to_string(v)?)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
