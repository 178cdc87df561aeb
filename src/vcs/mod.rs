//! The [`VcsBackend`] trait — the single abstraction boundary between the
//! engine and a version-control store.
//!
//! Every other component (the memory loader, validator, staleness checker,
//! pack builder, pack verifier) is a deterministic function of this trait's
//! outputs; this is the only place system-call-heavy I/O lives. The trait is
//! object-safe so callers can hold `&dyn VcsBackend` / `Box<dyn VcsBackend>`.

pub mod gix_backend;
pub mod types;

pub use gix_backend::GixVcsBackend;
pub use types::{CommitId, ObjectKind, OidParseError};

use crate::errors::MemoryError;

/// Read-only access to commit snapshots of a repository.
///
/// Implementations may be backed by `gix` (the only backend shipped here),
/// a CLI shim, or a test double; production code never shells out to a
/// `git` binary directly.
pub trait VcsBackend {
    /// Normalize a commit-ish (branch, tag, short hash, `HEAD`) to a full commit id.
    fn resolve(&self, commitish: &str) -> Result<CommitId, MemoryError>;

    /// Does `path` exist (as a blob or tree) at `commit`?
    fn exists(&self, commit: CommitId, path: &str) -> Result<bool, MemoryError>;

    /// Classify what `path` resolves to at `commit`.
    fn object_type(&self, commit: CommitId, path: &str) -> Result<ObjectKind, MemoryError>;

    /// Read the raw bytes of the blob at `path` at `commit`.
    fn read_blob(&self, commit: CommitId, path: &str) -> Result<Vec<u8>, MemoryError>;

    /// The 40-hex git object id of the blob at `path` at `commit`.
    fn blob_id(&self, commit: CommitId, path: &str) -> Result<String, MemoryError>;

    /// The 40-hex git object id of the tree at `dirpath` at `commit`, or
    /// `None` if `dirpath` does not exist or is not a tree.
    fn tree_id(&self, commit: CommitId, dirpath: &str) -> Result<Option<String>, MemoryError>;

    /// Every file path (recursive) under `path` at `commit`; empty if `path`
    /// is missing or is a blob.
    fn list_tree(&self, commit: CommitId, path: &str) -> Result<Vec<String>, MemoryError>;

    /// The most recent commit at or before `commit` that changed `path`,
    /// or `None` if `path` never existed up to `commit`.
    fn last_touch(&self, commit: CommitId, path: &str) -> Result<Option<CommitId>, MemoryError>;

    /// Is `ancestor` a (non-strict) ancestor of `descendant`?
    fn is_ancestor(&self, ancestor: CommitId, descendant: CommitId) -> Result<bool, MemoryError>;

    /// Files under `pathspec` whose blob contents differ between `a` and `b`.
    fn diff_names(
        &self,
        a: CommitId,
        b: CommitId,
        pathspec: &[String],
    ) -> Result<Vec<String>, MemoryError>;
}
