//! Pack builder (C6): inclusion closure, deduplication, and deterministic
//! materialization into a self-identifying pack document.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rayon::prelude::*;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{compute_pack_id, manifest_string, PackDocument, PackInputs, PackItem};
use crate::errors::MemoryError;
use crate::memory::MemoryItem;
use crate::path;
use crate::vcs::{CommitId, ObjectKind, VcsBackend};

const MEMORY_TREE_PATH: &str = ".ai/memory";

/// Build the context pack for `task_id` at `commit`.
///
/// `items`/`by_id` must be the result of [`crate::memory::load_memory`] at
/// the same commit. Fails fast (no error accumulation) on the first
/// unresolved dependency, missing include path, or non-blob target — a
/// pack is either well-formed or not emitted at all.
pub fn build_pack(
    vcs: &dyn VcsBackend,
    commit: CommitId,
    task_id: &str,
    by_id: &BTreeMap<String, MemoryItem>,
) -> Result<PackDocument, MemoryError> {
    tracing::debug!("building pack for task {} at {}", task_id, commit);

    let task = by_id
        .get(task_id)
        .filter(|item| item.item_type == "task")
        .ok_or_else(|| MemoryError::TaskNotFound(task_id.to_string()))?;

    let (include_memory_ids, include_paths) = task_pack_inputs(task);

    let mut active_constraints: Vec<String> = by_id
        .values()
        .filter(|item| item.item_type == "constraint" && item.is_active() && !item.id.is_empty())
        .map(|item| item.id.clone())
        .collect();
    active_constraints.sort();

    let mut memory_ids = Vec::new();
    for mid in std::iter::once(task_id.to_string())
        .chain(active_constraints.iter().cloned())
        .chain(include_memory_ids.iter().cloned())
    {
        if !mid.is_empty() && !memory_ids.contains(&mid) {
            memory_ids.push(mid);
        }
    }

    let mut file_paths: Vec<(String, String)> = Vec::new();
    let mut add_file = |kind: &str, raw_path: &str| -> Result<(), MemoryError> {
        let normalized = path::normalize(raw_path)?;
        let key = (kind.to_string(), normalized);
        if !file_paths.contains(&key) {
            file_paths.push(key);
        }
        Ok(())
    };

    for mid in &memory_ids {
        let item = by_id
            .get(mid)
            .ok_or_else(|| MemoryError::PackDependencyMissing(mid.clone()))?;

        add_file("memory_meta", &item.meta_path)?;
        if let Some(body_path) = &item.body_path {
            add_file("memory_body", body_path)?;
        }

        if let Some(evidence) = item.meta.get("evidence").and_then(Value::as_array) {
            for ev in evidence {
                let Some(ev_obj) = ev.as_object() else {
                    continue;
                };
                if ev_obj.get("kind").and_then(Value::as_str) != Some("repo_path") {
                    continue;
                }
                let Some(ref_raw) = ev_obj
                    .get("ref")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                else {
                    continue;
                };
                let ref_path = path::normalize(ref_raw)?;
                match vcs.object_type(commit, &ref_path)? {
                    ObjectKind::Blob => add_file("evidence", &ref_path)?,
                    ObjectKind::Tree => {
                        for fp in vcs.list_tree(commit, &ref_path)? {
                            add_file("evidence", &fp)?;
                        }
                    }
                    ObjectKind::None => {}
                }
            }
        }
    }

    for raw in &include_paths {
        let normalized = path::normalize(raw)?;
        match vcs.object_type(commit, &normalized)? {
            ObjectKind::Blob => add_file("repo_file", &normalized)?,
            ObjectKind::Tree => {
                let listed = vcs.list_tree(commit, &normalized)?;
                if listed.is_empty() {
                    return Err(MemoryError::PackIncludeMissing(normalized));
                }
                for fp in listed {
                    add_file("repo_file", &fp)?;
                }
            }
            ObjectKind::None => return Err(MemoryError::PackIncludeMissing(normalized)),
        }
    }

    file_paths.sort_by(|a, b| a.cmp(b));

    // Serial: every call here goes through the version-control adapter.
    let mut fetched = Vec::with_capacity(file_paths.len());
    for (kind, path) in &file_paths {
        if vcs.object_type(commit, path)? != ObjectKind::Blob {
            return Err(MemoryError::NotABlob(path.clone()));
        }
        let data = vcs.read_blob(commit, path)?;
        let blob = vcs.blob_id(commit, path)?;
        fetched.push((kind.clone(), path.clone(), blob, data));
    }

    // Parallel: pure CPU work (hashing, base64), placed back by index so the
    // sorted order from above is preserved regardless of scheduling.
    let pack_items: Vec<PackItem> = fetched
        .into_par_iter()
        .map(|(kind, path, blob, data)| {
            let sha256 = hex::encode(Sha256::digest(&data));
            let size = data.len() as u64;
            let content_b64 = BASE64.encode(&data);
            PackItem {
                kind,
                path,
                git_blob: blob,
                sha256,
                size,
                content_b64,
            }
        })
        .collect();

    let manifest_entries: Vec<(String, String, String)> = pack_items
        .iter()
        .map(|item| (item.kind.clone(), item.path.clone(), item.git_blob.clone()))
        .collect();
    let manifest = manifest_string(&manifest_entries);

    let memory_tree = vcs.tree_id(commit, MEMORY_TREE_PATH)?;
    let pack_id = compute_pack_id(&commit.to_hex(), memory_tree.as_deref(), &manifest);

    tracing::debug!(
        "built pack {} for task {} with {} items",
        pack_id,
        task_id,
        pack_items.len()
    );

    Ok(PackDocument {
        pack_version: 1,
        pack_id,
        task_id: task_id.to_string(),
        repo_commit: commit.to_hex(),
        memory_tree,
        inputs: PackInputs {
            include_memory_ids,
            include_paths,
            auto_included_constraints: active_constraints,
        },
        items: pack_items,
    })
}

fn task_pack_inputs(task: &MemoryItem) -> (Vec<String>, Vec<String>) {
    let pack = task.meta.get("pack");
    let include_memory_ids = pack
        .and_then(|p| p.get("include_memory_ids"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let include_paths = pack
        .and_then(|p| p.get("include_paths"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    (include_memory_ids, include_paths)
}
