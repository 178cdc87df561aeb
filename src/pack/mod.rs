//! Context pack assembly (C6) and verification (C7).
//!
//! A pack is a transient, self-identifying JSON document: it is never
//! stored in the repository, only written to wherever the caller points
//! `build-pack --out`, and re-checked later by [`verify::verify_pack`]
//! against a live repository.

pub mod builder;
pub mod verify;

use serde::{Deserialize, Serialize};

pub use builder::build_pack;
pub use verify::verify_pack;

/// One materialized file inside a pack (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackItem {
    pub kind: String,
    pub path: String,
    pub git_blob: String,
    pub sha256: String,
    pub size: u64,
    pub content_b64: String,
}

/// The `inputs` block recording what a task asked for, distinct from what
/// closure expansion actually pulled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackInputs {
    pub include_memory_ids: Vec<String>,
    pub include_paths: Vec<String>,
    pub auto_included_constraints: Vec<String>,
}

/// The full context pack document (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackDocument {
    pub pack_version: u32,
    pub pack_id: String,
    pub task_id: String,
    pub repo_commit: String,
    pub memory_tree: Option<String>,
    pub inputs: PackInputs,
    pub items: Vec<PackItem>,
}

/// Build the manifest string hashed into `pack_id`: `"{path}\n{git_blob}\n"`
/// for each `(kind, path, git_blob)` triple, in the order given.
///
/// Callers must have already sorted `entries` by `(kind, path)` — this
/// function only concatenates, it does not sort, so the builder and the
/// verifier can reuse it over their own differently-shaped intermediate
/// item lists.
pub fn manifest_string(entries: &[(String, String, String)]) -> String {
    let mut manifest = String::new();
    for (_kind, path, git_blob) in entries {
        manifest.push_str(path);
        manifest.push('\n');
        manifest.push_str(git_blob);
        manifest.push('\n');
    }
    manifest
}

/// `pack_id = sha256(utf8(commit ++ "\n" ++ (tree ?? "") ++ "\n" ++ manifest))`.
pub fn compute_pack_id(commit: &str, memory_tree: Option<&str>, manifest: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(commit.as_bytes());
    hasher.update(b"\n");
    hasher.update(memory_tree.unwrap_or("").as_bytes());
    hasher.update(b"\n");
    hasher.update(manifest.as_bytes());
    hex::encode(hasher.finalize())
}
