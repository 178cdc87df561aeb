//! `gix`-backed implementation of [`VcsBackend`].

use std::collections::BTreeSet;
use std::path::Path;

use super::{CommitId, ObjectKind, VcsBackend};
use crate::errors::MemoryError;

/// A [`VcsBackend`] backed by a pure-Rust [`gix::Repository`].
pub struct GixVcsBackend {
    repo: gix::Repository,
}

impl GixVcsBackend {
    /// Open the repository at or above `path` (walks up to find `.git`).
    pub fn open(path: &Path) -> Result<Self, MemoryError> {
        let repo = gix::open(path).map_err(|e| MemoryError::Vcs(e.to_string()))?;
        Ok(Self { repo })
    }
}

fn to_gix_oid(commit: CommitId) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(commit.as_bytes())
}

fn from_gix_oid(oid: gix::ObjectId) -> CommitId {
    let bytes: [u8; 20] = oid
        .as_bytes()
        .try_into()
        .expect("sha1 object id is 20 bytes");
    CommitId::from_bytes(bytes)
}

/// What `path` resolves to inside `commit`'s tree, and its object id.
fn entry_at(
    repo: &gix::Repository,
    commit: CommitId,
    path: &str,
) -> Result<Option<(ObjectKind, gix::ObjectId)>, MemoryError> {
    let commit_obj = repo
        .find_commit(to_gix_oid(commit))
        .map_err(|e| MemoryError::Vcs(format!("commit {commit}: {e}")))?;
    let tree = commit_obj
        .tree()
        .map_err(|e| MemoryError::Vcs(format!("tree of commit {commit}: {e}")))?;

    if path.is_empty() {
        return Ok(Some((ObjectKind::Tree, tree.id().detach())));
    }

    let found = tree
        .peel_to_entry_by_path(path)
        .map_err(|e| MemoryError::Vcs(format!("looking up `{path}` at {commit}: {e}")))?;

    Ok(found.map(|entry| {
        let kind = if entry.mode().is_tree() {
            ObjectKind::Tree
        } else {
            ObjectKind::Blob
        };
        (kind, entry.oid().into())
    }))
}

fn collect_files(
    repo: &gix::Repository,
    tree_id: gix::ObjectId,
    prefix: &str,
    out: &mut Vec<String>,
) -> Result<(), MemoryError> {
    let tree = repo
        .find_tree(tree_id)
        .map_err(|e| MemoryError::Vcs(format!("tree {tree_id}: {e}")))?;
    for entry in tree.iter() {
        let entry = entry.map_err(|e| MemoryError::Vcs(format!("decoding tree entry: {e}")))?;
        let name = entry.inner.filename.to_string();
        let child_path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if entry.inner.mode.is_tree() {
            collect_files(repo, entry.inner.oid, &child_path, out)?;
        } else {
            out.push(child_path);
        }
    }
    Ok(())
}

impl VcsBackend for GixVcsBackend {
    fn resolve(&self, commitish: &str) -> Result<CommitId, MemoryError> {
        let id = self
            .repo
            .rev_parse_single(commitish)
            .map_err(|e| MemoryError::Vcs(format!("resolving `{commitish}`: {e}")))?;
        let commit = id
            .object()
            .map_err(|e| MemoryError::Vcs(format!("resolving `{commitish}`: {e}")))?
            .peel_to_kind(gix::object::Kind::Commit)
            .map_err(|e| MemoryError::Vcs(format!("`{commitish}` is not a commit: {e}")))?;
        Ok(from_gix_oid(commit.id))
    }

    fn exists(&self, commit: CommitId, path: &str) -> Result<bool, MemoryError> {
        Ok(entry_at(&self.repo, commit, path)?.is_some())
    }

    fn object_type(&self, commit: CommitId, path: &str) -> Result<ObjectKind, MemoryError> {
        Ok(entry_at(&self.repo, commit, path)?
            .map(|(kind, _)| kind)
            .unwrap_or(ObjectKind::None))
    }

    fn read_blob(&self, commit: CommitId, path: &str) -> Result<Vec<u8>, MemoryError> {
        match entry_at(&self.repo, commit, path)? {
            Some((ObjectKind::Blob, oid)) => {
                let mut blob = self
                    .repo
                    .find_blob(oid)
                    .map_err(|e| MemoryError::Vcs(format!("blob `{path}` at {commit}: {e}")))?;
                Ok(blob.take_data())
            }
            _ => Err(MemoryError::NotABlob(path.to_string())),
        }
    }

    fn blob_id(&self, commit: CommitId, path: &str) -> Result<String, MemoryError> {
        match entry_at(&self.repo, commit, path)? {
            Some((ObjectKind::Blob, oid)) => Ok(oid.to_hex().to_string()),
            _ => Err(MemoryError::NotABlob(path.to_string())),
        }
    }

    fn tree_id(&self, commit: CommitId, dirpath: &str) -> Result<Option<String>, MemoryError> {
        match entry_at(&self.repo, commit, dirpath)? {
            Some((ObjectKind::Tree, oid)) => Ok(Some(oid.to_hex().to_string())),
            _ => Ok(None),
        }
    }

    fn list_tree(&self, commit: CommitId, path: &str) -> Result<Vec<String>, MemoryError> {
        let entry = entry_at(&self.repo, commit, path)?;
        let mut out = Vec::new();
        let tree_oid = match entry {
            Some((ObjectKind::Tree, oid)) => oid,
            _ => return Ok(out),
        };
        collect_files(&self.repo, tree_oid, path, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn last_touch(&self, commit: CommitId, path: &str) -> Result<Option<CommitId>, MemoryError> {
        let walk = self
            .repo
            .rev_walk([to_gix_oid(commit)])
            .all()
            .map_err(|e| MemoryError::Vcs(format!("walking history from {commit}: {e}")))?;

        for info in walk {
            let info = info.map_err(|e| MemoryError::Vcs(format!("walking history: {e}")))?;
            let current = from_gix_oid(info.id);
            let here = entry_at(&self.repo, current, path)?.map(|(_, oid)| oid);

            let parents = info
                .parent_ids()
                .map(|parent| from_gix_oid(parent.detach()))
                .collect::<Vec<_>>();

            let unchanged = if parents.is_empty() {
                here.is_none()
            } else {
                parents.iter().all(|parent| {
                    entry_at(&self.repo, *parent, path)
                        .map(|found| found.map(|(_, oid)| oid) == here)
                        .unwrap_or(false)
                })
            };

            if !unchanged {
                return Ok(Some(current));
            }
        }
        Ok(None)
    }

    fn is_ancestor(&self, ancestor: CommitId, descendant: CommitId) -> Result<bool, MemoryError> {
        if ancestor == descendant {
            return Ok(true);
        }
        let walk = self
            .repo
            .rev_walk([to_gix_oid(descendant)])
            .all()
            .map_err(|e| MemoryError::Vcs(format!("walking history from {descendant}: {e}")))?;
        for info in walk {
            let info = info.map_err(|e| MemoryError::Vcs(format!("walking history: {e}")))?;
            if from_gix_oid(info.id) == ancestor {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn diff_names(
        &self,
        a: CommitId,
        b: CommitId,
        pathspec: &[String],
    ) -> Result<Vec<String>, MemoryError> {
        let mut candidates: BTreeSet<String> = BTreeSet::new();

        for raw in pathspec {
            let mut found_any = false;
            for commit in [a, b] {
                if let Some((ObjectKind::Tree, oid)) = entry_at(&self.repo, commit, raw)? {
                    let mut files = Vec::new();
                    collect_files(&self.repo, oid, raw, &mut files)?;
                    candidates.extend(files);
                    found_any = true;
                } else if let Some((ObjectKind::Blob, _)) = entry_at(&self.repo, commit, raw)? {
                    candidates.insert(raw.clone());
                    found_any = true;
                }
            }
            if !found_any {
                candidates.insert(raw.clone());
            }
        }

        let mut changed = Vec::new();
        for path in candidates {
            let at_a = entry_at(&self.repo, a, &path)?.map(|(_, oid)| oid);
            let at_b = entry_at(&self.repo, b, &path)?.map(|(_, oid)| oid);
            if at_a != at_b {
                changed.push(path);
            }
        }
        changed.sort();
        Ok(changed)
    }
}
