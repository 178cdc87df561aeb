//! Staleness checker (C5): compare watched paths against the verified commit.

use serde_json::Value;

use super::MemoryItem;
use crate::errors::MemoryError;
use crate::path;
use crate::vcs::{CommitId, VcsBackend};

/// Errors and warnings from checking every item's `watch_paths` at `commit`.
///
/// An item is skipped entirely when `watch_paths` is absent or empty. A
/// stale item with a non-empty `stale_exemption.reason` downgrades to a
/// warning instead of an error; see the module-level invariant in the
/// design notes on staleness monotonicity.
pub fn check_stale(
    vcs: &dyn VcsBackend,
    commit: CommitId,
    items: &[MemoryItem],
) -> Result<(Vec<String>, Vec<String>), MemoryError> {
    tracing::debug!("checking staleness for {} memory items at {}", items.len(), commit);

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for item in items {
        let watch_paths = item
            .meta
            .get("watch_paths")
            .and_then(Value::as_array)
            .filter(|l| !l.is_empty());
        let Some(watch_paths) = watch_paths else {
            continue;
        };

        let verified_commit = match item
            .meta
            .get("verified_commit")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(verified) => match vcs.resolve(verified) {
                Ok(resolved) => resolved,
                Err(e) => {
                    errors.push(format!("{}: verified_commit invalid: {e}", item.meta_path));
                    continue;
                }
            },
            None => match vcs.last_touch(commit, &item.meta_path)? {
                Some(found) => found,
                None => {
                    errors.push(format!(
                        "{}: cannot determine last-touch commit for stale check",
                        item.meta_path
                    ));
                    continue;
                }
            },
        };

        if !vcs.is_ancestor(verified_commit, commit)? {
            errors.push(format!(
                "{}: verified_commit {} is not an ancestor of {}",
                item.meta_path, verified_commit, commit
            ));
            continue;
        }

        let mut norm_paths = Vec::with_capacity(watch_paths.len());
        let mut invalid = false;
        for p in watch_paths {
            if let Some(raw) = p.as_str().filter(|s| !s.trim().is_empty()) {
                match path::normalize(raw) {
                    Ok(normalized) => norm_paths.push(normalized),
                    Err(_) => {
                        invalid = true;
                        break;
                    }
                }
            }
        }
        if invalid {
            errors.push(format!("{}: invalid watch_paths", item.meta_path));
            continue;
        }
        if norm_paths.is_empty() {
            continue;
        }

        let diff = vcs.diff_names(verified_commit, commit, &norm_paths)?;
        if diff.is_empty() {
            continue;
        }
        let diff_text = diff.join("\n");

        let reason = item
            .meta
            .get("stale_exemption")
            .and_then(Value::as_object)
            .and_then(|obj| obj.get("reason"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match reason {
            Some(reason) => {
                tracing::warn!("{} is stale but exempted ({})", item.meta_path, reason);
                warnings.push(format!(
                    "{}: STALE but exempted (reason={:?}). Changed:\n{}",
                    item.meta_path, reason, diff_text
                ));
            }
            None => {
                tracing::warn!("{} is stale since {}", item.meta_path, verified_commit);
                errors.push(format!(
                    "{}: STALE. Changed since {}:\n{}",
                    item.meta_path, verified_commit, diff_text
                ));
            }
        }
    }

    tracing::debug!(
        "staleness check at {} done: {} errors, {} warnings",
        commit,
        errors.len(),
        warnings.len()
    );
    Ok((errors, warnings))
}
