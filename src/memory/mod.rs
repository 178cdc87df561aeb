//! Memory loader (C3): enumerate `.ai/memory` at a commit into memory items.

pub mod stale;
pub mod validate;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::MemoryError;
use crate::vcs::{CommitId, VcsBackend};

/// A loaded memory item and its parsed metadata.
///
/// `meta` holds the full parsed `meta.json` object; every other per-type
/// field (`evidence`, `watch_paths`, `pack`, `key`, `topic`, ...) is read
/// back out of it on demand rather than duplicated onto this struct, the
/// way the original tool keeps a single `dict` as the source of truth.
#[derive(Debug, Clone)]
pub struct MemoryItem {
    pub id: String,
    pub item_type: String,
    pub status: String,
    pub title: String,
    pub meta: Value,
    pub meta_path: String,
    pub body_path: Option<String>,
}

/// Directory each memory type is stored under, relative to `.ai/memory/`.
pub fn type_dir(item_type: &str) -> Option<&'static str> {
    match item_type {
        "task" => Some("tasks"),
        "adr" => Some("adr"),
        "constraint" => Some("constraints"),
        "runbook" => Some("runbooks"),
        "component_map" => Some("component_maps"),
        _ => None,
    }
}

/// The full set of recognized memory item types.
pub const ALLOWED_TYPES: [&str; 5] = ["task", "adr", "constraint", "runbook", "component_map"];

/// The evidence kinds recognized in `evidence[].kind`.
pub const EVIDENCE_KINDS: [&str; 6] = ["repo_path", "pr", "issue", "url", "run", "chat"];

/// The pack item kinds recognized in a pack document's `items[].kind`.
pub const PACK_ITEM_KINDS: [&str; 4] = ["memory_meta", "memory_body", "evidence", "repo_file"];

/// The `status` value that counts as "active" (or "accepted" for adrs) for each type.
pub fn active_status(item_type: &str) -> Option<&'static str> {
    match item_type {
        "task" => Some("active"),
        "adr" => Some("accepted"),
        "constraint" => Some("active"),
        "runbook" => Some("active"),
        "component_map" => Some("active"),
        _ => None,
    }
}

impl MemoryItem {
    /// Is this item's status the active/accepted designation for its type?
    pub fn is_active(&self) -> bool {
        active_status(&self.item_type) == Some(self.status.as_str())
    }
}

/// Memory root under which `meta.json`/`body.md` pairs live.
pub const MEMORY_ROOT: &str = ".ai/memory";

/// Result of loading the memory graph at a commit.
pub struct LoadedMemory {
    pub items: Vec<MemoryItem>,
    pub by_id: BTreeMap<String, MemoryItem>,
}

/// Enumerate every `meta.json` under `.ai/memory` at `commit`, in
/// lexicographic order by path.
///
/// Returns an empty result if `.ai/memory` does not exist. Fails with
/// [`MemoryError::InvalidMeta`] if any `meta.json` is not valid JSON or its
/// top-level value is not an object — the whole snapshot is considered
/// unreadable in that case, so this does not accumulate errors the way the
/// validator does.
pub fn load_memory(
    vcs: &dyn VcsBackend,
    commit: CommitId,
) -> Result<LoadedMemory, MemoryError> {
    if !vcs.exists(commit, MEMORY_ROOT)? {
        tracing::debug!("no {} at {}, loading empty memory graph", MEMORY_ROOT, commit);
        return Ok(LoadedMemory {
            items: Vec::new(),
            by_id: BTreeMap::new(),
        });
    }

    let mut meta_paths: Vec<String> = vcs
        .list_tree(commit, MEMORY_ROOT)?
        .into_iter()
        .filter(|p| p.ends_with("/meta.json"))
        .collect();
    meta_paths.sort();

    let mut items = Vec::with_capacity(meta_paths.len());
    let mut by_id = BTreeMap::new();

    for meta_path in meta_paths {
        let raw = vcs.read_blob(commit, &meta_path)?;
        let meta: Value = serde_json::from_slice(&raw)
            .map_err(|e| MemoryError::InvalidMeta(meta_path.clone(), e.to_string()))?;
        if !meta.is_object() {
            return Err(MemoryError::InvalidMeta(
                meta_path,
                "meta must be object".to_string(),
            ));
        }

        let item_dir = meta_path
            .strip_suffix("/meta.json")
            .expect("meta_path ends in /meta.json")
            .to_string();
        let body_candidate = format!("{item_dir}/body.md");
        let body_path = if vcs.exists(commit, &body_candidate)? {
            Some(body_candidate)
        } else {
            None
        };

        let id = meta_str(&meta, "id");
        let item_type = meta_str(&meta, "type");
        let status = meta_str(&meta, "status");
        let title = meta_str(&meta, "title");

        tracing::debug!("loaded {} ({} {}) from {}", id, item_type, status, meta_path);

        let item = MemoryItem {
            id: id.clone(),
            item_type,
            status,
            title,
            meta,
            meta_path,
            body_path,
        };

        if !id.is_empty() {
            by_id.entry(id).or_insert_with(|| item.clone());
        }
        items.push(item);
    }

    tracing::debug!(
        "loaded {} memory items ({} distinct ids) from {} at {}",
        items.len(),
        by_id.len(),
        MEMORY_ROOT,
        commit
    );
    Ok(LoadedMemory { items, by_id })
}

fn meta_str(meta: &Value, key: &str) -> String {
    meta.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string()
}
