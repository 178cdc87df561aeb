//! Memory validator (C4): schema and cross-item invariants.
//!
//! Every check accumulates into a flat `Vec<String>` instead of aborting on
//! the first problem, so a single run surfaces every issue in the snapshot.
//! Message wording matches the field and condition being checked, not a
//! generic template, to keep errors actionable when read off a CI log.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{active_status, type_dir, MemoryItem, ALLOWED_TYPES, EVIDENCE_KINDS};
use crate::errors::MemoryError;
use crate::path;
use crate::vcs::{CommitId, ObjectKind, VcsBackend};

/// Run every storage-invariant and schema check from the design over `items`.
///
/// `by_id` must be the index produced alongside `items` by
/// [`super::load_memory`] — cross-reference checks (`supersedes`,
/// `pack.include_memory_ids`) resolve against it.
pub fn validate_memory(
    vcs: &dyn VcsBackend,
    commit: CommitId,
    items: &[MemoryItem],
    by_id: &BTreeMap<String, MemoryItem>,
) -> Result<Vec<String>, MemoryError> {
    tracing::debug!("validating {} memory items at {}", items.len(), commit);

    let mut errors = Vec::new();
    let mut seen_ids: BTreeMap<String, String> = BTreeMap::new();
    let mut constraint_by_key: BTreeMap<String, String> = BTreeMap::new();
    let mut adr_by_topic: BTreeMap<String, String> = BTreeMap::new();

    for item in items {
        let meta = &item.meta;

        if meta.get("schema_version") != Some(&Value::from(1)) {
            errors.push(format!("{}: schema_version must be 1", item.meta_path));
        }
        if item.id.is_empty() {
            errors.push(format!("{}: missing id", item.meta_path));
        }
        if item.item_type.is_empty() {
            errors.push(format!("{}: missing type", item.meta_path));
        }
        if !item.item_type.is_empty() && !ALLOWED_TYPES.contains(&item.item_type.as_str()) {
            errors.push(format!(
                "{}: invalid type={:?}",
                item.meta_path, item.item_type
            ));
        }
        if item.status.is_empty() {
            errors.push(format!("{}: missing status", item.meta_path));
        }
        if item.title.is_empty() {
            errors.push(format!("{}: missing title", item.meta_path));
        }

        let parts: Vec<&str> = item.meta_path.split('/').collect();
        if parts.len() >= 5 && parts[0] == ".ai" && parts[1] == "memory" {
            let type_dir_found = parts[2];
            let entry_dir = parts[3];
            if let Some(expected_dir) = type_dir(&item.item_type) {
                if type_dir_found != expected_dir {
                    errors.push(format!(
                        "{}: type={:?} must live under .ai/memory/{}/ (found {}/)",
                        item.meta_path, item.item_type, expected_dir, type_dir_found
                    ));
                }
                if !item.id.is_empty() && !entry_dir.starts_with(&item.id) {
                    errors.push(format!(
                        "{}: entry dir must start with id ({}); found {}",
                        item.meta_path, item.id, entry_dir
                    ));
                }
            }
        }

        if !item.id.is_empty() {
            match seen_ids.get(&item.id) {
                Some(first_path) if first_path != &item.meta_path => {
                    errors.push(format!(
                        "duplicate id {}: {} and {}",
                        item.id, first_path, item.meta_path
                    ));
                }
                Some(_) => {}
                None => {
                    seen_ids.insert(item.id.clone(), item.meta_path.clone());
                }
            }
        }

        if let Some(scope) = meta.get("scope") {
            if !scope.is_null() && !scope.is_object() {
                errors.push(format!("{}: scope must be object", item.meta_path));
            } else if let Some(scope_obj) = scope.as_object() {
                for key in ["paths", "components"] {
                    if let Some(v) = scope_obj.get(key) {
                        if !v.is_array() {
                            errors.push(format!("{}: scope.{} must be list", item.meta_path, key));
                        }
                    }
                }
            }
        }

        if let Some(watch_paths) = meta.get("watch_paths") {
            if !watch_paths.is_null() && !watch_paths.is_array() {
                errors.push(format!("{}: watch_paths must be list", item.meta_path));
            }
        }

        let evidence = meta.get("evidence");
        let is_active = item.is_active();
        let evidence_list = evidence.and_then(Value::as_array);
        if is_active {
            if evidence_list.map(|l| l.is_empty()).unwrap_or(true) {
                errors.push(format!(
                    "{}: active/accepted items must have non-empty evidence[]",
                    item.meta_path
                ));
            }
        }

        if let Some(list) = evidence_list {
            for (i, ev) in list.iter().enumerate() {
                let Some(ev_obj) = ev.as_object() else {
                    errors.push(format!("{}: evidence[{}] must be object", item.meta_path, i));
                    continue;
                };
                let kind = ev_obj.get("kind").and_then(Value::as_str).unwrap_or("");
                let ref_val = ev_obj.get("ref");
                let ref_str = ref_val.and_then(Value::as_str);

                if !EVIDENCE_KINDS.contains(&kind) {
                    errors.push(format!(
                        "{}: evidence[{}].kind invalid: {:?}",
                        item.meta_path, i, kind
                    ));
                }
                let ref_ok = ref_str.map(|s| !s.trim().is_empty()).unwrap_or(false);
                if !ref_ok {
                    errors.push(format!(
                        "{}: evidence[{}].ref must be non-empty string",
                        item.meta_path, i
                    ));
                }
                if kind == "repo_path" {
                    if let Some(raw_ref) = ref_str.filter(|s| !s.trim().is_empty()) {
                        match path::normalize(raw_ref) {
                            Err(_) => {
                                errors.push(format!(
                                    "{}: evidence[{}].ref invalid repo_path: invalid repo-relative path: {:?}",
                                    item.meta_path, i, raw_ref
                                ));
                            }
                            Ok(ref_path) => {
                                let kind_at = vcs.object_type(commit, &ref_path)?;
                                if !matches!(kind_at, ObjectKind::Blob | ObjectKind::Tree) {
                                    errors.push(format!(
                                        "{}: evidence[{}].ref repo_path not found as file/dir at {}: {}",
                                        item.meta_path, i, commit, ref_path
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Some(supersedes) = meta.get("supersedes") {
            if !supersedes.is_null() && !supersedes.is_array() {
                errors.push(format!("{}: supersedes must be list", item.meta_path));
            } else if let Some(list) = supersedes.as_array() {
                for sid in list {
                    match sid.as_str().filter(|s| !s.trim().is_empty()) {
                        None => errors.push(format!(
                            "{}: supersedes contains non-string/empty id",
                            item.meta_path
                        )),
                        Some(sid) if !by_id.contains_key(sid) => errors.push(format!(
                            "{}: supersedes references missing id: {}",
                            item.meta_path, sid
                        )),
                        Some(_) => {}
                    }
                }
            }
        }

        if item.item_type == "constraint" && is_active {
            let key = meta.get("key").and_then(Value::as_str).filter(|s| !s.trim().is_empty());
            match key {
                None => errors.push(format!(
                    "{}: constraint must have non-empty key",
                    item.meta_path
                )),
                Some(key) => {
                    if let Some(first_path) = constraint_by_key.get(key) {
                        errors.push(format!(
                            "constraint.key conflict: {:?} in {} and {}",
                            key, first_path, item.meta_path
                        ));
                    }
                    constraint_by_key
                        .entry(key.to_string())
                        .or_insert_with(|| item.meta_path.clone());
                }
            }
        }

        if item.item_type == "adr" && is_active {
            let topic = meta.get("topic").and_then(Value::as_str).filter(|s| !s.trim().is_empty());
            match topic {
                None => errors.push(format!("{}: adr must have non-empty topic", item.meta_path)),
                Some(topic) => {
                    if let Some(first_path) = adr_by_topic.get(topic) {
                        errors.push(format!(
                            "adr.topic conflict: {:?} in {} and {}",
                            topic, first_path, item.meta_path
                        ));
                    }
                    adr_by_topic
                        .entry(topic.to_string())
                        .or_insert_with(|| item.meta_path.clone());
                }
            }
        }

        if item.item_type == "task" {
            if let Some(pack) = meta.get("pack") {
                if !pack.is_null() && !pack.is_object() {
                    errors.push(format!("{}: pack must be object", item.meta_path));
                } else if let Some(pack_obj) = pack.as_object() {
                    let include_memory_ids = pack_obj.get("include_memory_ids");
                    if let Some(v) = include_memory_ids {
                        if !v.is_null() && !v.is_array() {
                            errors.push(format!(
                                "{}: pack.include_memory_ids must be list",
                                item.meta_path
                            ));
                        }
                    }
                    let include_paths = pack_obj.get("include_paths");
                    if let Some(v) = include_paths {
                        if !v.is_null() && !v.is_array() {
                            errors.push(format!(
                                "{}: pack.include_paths must be list",
                                item.meta_path
                            ));
                        }
                    }

                    if let Some(list) = include_memory_ids.and_then(Value::as_array) {
                        for (j, mid) in list.iter().enumerate() {
                            match mid.as_str().filter(|s| !s.trim().is_empty()) {
                                None => errors.push(format!(
                                    "{}: pack.include_memory_ids[{}] must be non-empty string",
                                    item.meta_path, j
                                )),
                                Some(mid) if !by_id.contains_key(mid) => errors.push(format!(
                                    "{}: pack.include_memory_ids[{}] references missing id: {}",
                                    item.meta_path, j, mid
                                )),
                                Some(_) => {}
                            }
                        }
                    }

                    if let Some(list) = include_paths.and_then(Value::as_array) {
                        for (j, p) in list.iter().enumerate() {
                            let Some(p_str) = p.as_str().filter(|s| !s.trim().is_empty()) else {
                                errors.push(format!(
                                    "{}: pack.include_paths[{}] must be non-empty string",
                                    item.meta_path, j
                                ));
                                continue;
                            };
                            let Ok(p_norm) = path::normalize(p_str) else {
                                errors.push(format!(
                                    "{}: pack.include_paths[{}] invalid path: invalid repo-relative path: {:?}",
                                    item.meta_path, j, p_str
                                ));
                                continue;
                            };
                            let kind_at = vcs.object_type(commit, &p_norm)?;
                            if !matches!(kind_at, ObjectKind::Blob | ObjectKind::Tree) {
                                errors.push(format!(
                                    "{}: pack.include_paths[{}] not found as file/dir at {}: {}",
                                    item.meta_path, j, commit, p_norm
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        tracing::debug!("memory graph at {} is valid", commit);
    } else {
        tracing::warn!("memory graph at {} has {} validation errors", commit, errors.len());
    }
    Ok(errors)
}
