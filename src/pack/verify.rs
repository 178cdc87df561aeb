//! Pack verifier (C7): re-derive pack identity and check every item against
//! the live repository.
//!
//! Operates on a raw [`serde_json::Value`] rather than the typed
//! [`super::PackDocument`] — an untrusted pack on disk may have the wrong
//! shape entirely, and every such mismatch must become an accumulated
//! error rather than a parse failure that reports only the first one.

use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::manifest_string;
use crate::errors::MemoryError;
use crate::memory::PACK_ITEM_KINDS;
use crate::path;
use crate::vcs::{CommitId, ObjectKind, VcsBackend};

fn is_hex(s: &str, n: usize) -> bool {
    s.len() == n && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

fn is_hex_range(s: &str, min_n: usize, max_n: usize) -> bool {
    (min_n..=max_n).contains(&s.len())
        && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// Verify a pack document, returning every accumulated error; empty ⇔ valid.
pub fn verify_pack(
    vcs: &dyn VcsBackend,
    data: &Value,
    expect_task_id: Option<&str>,
) -> Result<Vec<String>, MemoryError> {
    let mut errors = Vec::new();

    let Some(obj) = data.as_object() else {
        tracing::warn!("pack document is not a JSON object");
        return Ok(vec!["pack must be a JSON object".to_string()]);
    };

    tracing::debug!(
        "verifying pack {:?} for task {:?}",
        obj.get("pack_id").and_then(Value::as_str).unwrap_or(""),
        expect_task_id.unwrap_or("<any>")
    );

    if obj.get("pack_version") != Some(&Value::from(1)) {
        errors.push("pack_version must be 1".to_string());
    }

    let pack_id = obj.get("pack_id").and_then(Value::as_str).unwrap_or("");
    if !is_hex(pack_id, 64) {
        errors.push("pack_id must be 64-hex sha256 string".to_string());
    }

    let task_id = obj.get("task_id").and_then(Value::as_str).unwrap_or("");
    if task_id.trim().is_empty() {
        errors.push("task_id must be non-empty string".to_string());
    }
    if let Some(expected) = expect_task_id {
        if !expected.is_empty() && task_id != expected {
            errors.push(format!(
                "task_id mismatch: expect {:?}, got {:?}",
                expected, task_id
            ));
        }
    }

    let repo_commit_raw = obj.get("repo_commit").and_then(Value::as_str).unwrap_or("");
    let repo_commit: Option<CommitId> = if repo_commit_raw.trim().is_empty() {
        errors.push("repo_commit must be non-empty string".to_string());
        None
    } else {
        match vcs.resolve(repo_commit_raw.trim()) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                errors.push(format!("repo_commit invalid: {e}"));
                None
            }
        }
    };

    let memory_tree_declared = obj.get("memory_tree");
    let memory_tree_declared_str = match memory_tree_declared {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => {
            if !is_hex_range(s, 7, 40) {
                errors.push("memory_tree must be 7-40 hex string, null, or empty string".to_string());
            }
            Some(s.clone())
        }
        Some(_) => {
            errors.push("memory_tree must be 7-40 hex string, null, or empty string".to_string());
            None
        }
    };

    let mut memory_tree_actual: Option<String> = None;
    let mut memory_tree_computed = false;
    if let Some(commit) = repo_commit {
        match vcs.tree_id(commit, ".ai/memory") {
            Ok(tree) => {
                memory_tree_actual = tree;
                memory_tree_computed = true;
            }
            Err(e) => errors.push(format!("cannot compute memory_tree at {commit}: {e}")),
        }
        if memory_tree_actual != memory_tree_declared_str {
            errors.push(format!(
                "memory_tree mismatch: expect {:?}, got {:?}",
                memory_tree_actual, memory_tree_declared_str
            ));
        }
    }

    let Some(items) = obj.get("items").and_then(Value::as_array) else {
        errors.push("items must be list".to_string());
        return Ok(errors);
    };

    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut last_key: Option<(String, String)> = None;
    let mut manifest_entries: Vec<(String, String, String)> = Vec::new();
    let mut manifest_ok = true;

    for (idx, it) in items.iter().enumerate() {
        let Some(item) = it.as_object() else {
            errors.push(format!("items[{idx}] must be object"));
            continue;
        };

        let kind = item.get("kind").and_then(Value::as_str).unwrap_or("");
        let path_raw = item.get("path").and_then(Value::as_str).unwrap_or("");
        let blob = item.get("git_blob").and_then(Value::as_str).unwrap_or("");
        let sha = item.get("sha256").and_then(Value::as_str).unwrap_or("");
        let size = item.get("size");
        let content_b64 = item.get("content_b64").and_then(Value::as_str).unwrap_or("");

        if kind.trim().is_empty() {
            errors.push(format!("items[{idx}].kind must be non-empty string"));
            manifest_ok = false;
            continue;
        }
        if !PACK_ITEM_KINDS.contains(&kind) {
            let mut sorted_kinds = PACK_ITEM_KINDS;
            sorted_kinds.sort_unstable();
            errors.push(format!(
                "items[{idx}].kind must be one of {sorted_kinds:?}"
            ));
            manifest_ok = false;
        }
        if path_raw.trim().is_empty() {
            errors.push(format!("items[{idx}].path must be non-empty string"));
            manifest_ok = false;
            continue;
        }

        let path_norm = match path::normalize(path_raw) {
            Ok(p) => p,
            Err(_) => {
                errors.push(format!("items[{idx}].path invalid: invalid repo-relative path: {path_raw:?}"));
                manifest_ok = false;
                continue;
            }
        };
        if path_norm != path_raw {
            errors.push(format!(
                "items[{idx}].path must be canonical (got {:?}, normalized {:?})",
                path_raw, path_norm
            ));
            manifest_ok = false;
        }

        let key = (kind.to_string(), path_norm.clone());
        if let Some(last) = &last_key {
            if key < *last {
                errors.push("items must be sorted by (kind, path) for canonical pack output".to_string());
            }
        }
        last_key = Some(key.clone());

        if seen.contains(&key) {
            errors.push(format!("duplicate item (kind,path) at items[{idx}]: {key:?}"));
        } else {
            seen.insert(key);
        }

        if !is_hex(blob, 40) {
            errors.push(format!("items[{idx}].git_blob must be 40-hex string"));
            manifest_ok = false;
        }
        if !is_hex(sha, 64) {
            errors.push(format!("items[{idx}].sha256 must be 64-hex string"));
            manifest_ok = false;
        }
        let size_ok = size.and_then(Value::as_i64).map(|n| n >= 0).unwrap_or(false);
        if !size_ok {
            errors.push(format!("items[{idx}].size must be non-negative integer"));
            manifest_ok = false;
        }
        if content_b64.is_empty() {
            errors.push(format!("items[{idx}].content_b64 must be non-empty string"));
            manifest_ok = false;
        }

        let decoded: Option<Vec<u8>> = if !content_b64.is_empty() {
            match BASE64.decode(content_b64) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    errors.push(format!("items[{idx}].content_b64 invalid base64: {e}"));
                    manifest_ok = false;
                    None
                }
            }
        } else {
            None
        };

        if let Some(decoded) = &decoded {
            if let Some(declared_size) = size.and_then(Value::as_i64) {
                if declared_size != decoded.len() as i64 {
                    errors.push(format!(
                        "items[{idx}].size mismatch: expect {}, got {}",
                        decoded.len(),
                        declared_size
                    ));
                }
            }
            if is_hex(sha, 64) {
                let actual = hex::encode(Sha256::digest(decoded));
                if actual != sha {
                    errors.push(format!(
                        "items[{idx}].sha256 mismatch: expect {actual}, got {sha}"
                    ));
                }
            }
        }

        if let (Some(commit), true) = (repo_commit, is_hex(blob, 40)) {
            match vcs.object_type(commit, &path_norm) {
                Ok(ObjectKind::Blob) => match vcs.blob_id(commit, &path_norm) {
                    Ok(actual_blob) => {
                        if actual_blob != blob {
                            errors.push(format!(
                                "items[{idx}].git_blob mismatch: expect {actual_blob}, got {blob}"
                            ));
                        }
                        if let Some(decoded) = &decoded {
                            match vcs.read_blob(commit, &path_norm) {
                                Ok(actual_data) => {
                                    if &actual_data != decoded {
                                        errors.push(format!(
                                            "items[{idx}].content mismatch vs git at {commit}: {path_norm}"
                                        ));
                                    }
                                }
                                Err(e) => errors.push(format!("items[{idx}] cannot verify against git: {e}")),
                            }
                        }
                    }
                    Err(e) => errors.push(format!("items[{idx}] cannot verify against git: {e}")),
                },
                Ok(other) => errors.push(format!(
                    "items[{idx}].path is not a file/blob at {commit}: {path_norm} (got {other:?})"
                )),
                Err(e) => errors.push(format!("items[{idx}] cannot verify against git: {e}")),
            }
        }

        if is_hex(blob, 40) {
            manifest_entries.push((kind.to_string(), path_norm, blob.to_string()));
        }
    }

    if repo_commit.is_some() && memory_tree_computed && !manifest_entries.is_empty() && manifest_ok {
        let mut sorted = manifest_entries.clone();
        sorted.sort();
        let manifest = manifest_string(&sorted);
        let commit_hex = repo_commit.unwrap().to_hex();
        let pack_id_actual = super::compute_pack_id(&commit_hex, memory_tree_actual.as_deref(), &manifest);
        if is_hex(pack_id, 64) && pack_id_actual != pack_id {
            errors.push(format!("pack_id mismatch: expect {pack_id_actual}, got {pack_id}"));
        }
    }

    if errors.is_empty() {
        tracing::debug!("pack is valid");
    } else {
        tracing::warn!("pack verification found {} errors", errors.len());
    }
    Ok(errors)
}
