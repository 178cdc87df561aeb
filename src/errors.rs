//! Error types for the memory and context-pack engine.
//!
//! This module defines a unified error enumeration used across path
//! normalization, the version-control adapter, memory loading, and pack
//! assembly. Validators and verifiers (the memory validator, the pack
//! verifier, the report verifier, and the staleness checker) deliberately do
//! *not* use this type for their findings: per the accumulation contract
//! they return `Vec<String>` diagnostics instead, so a single bad item never
//! aborts a whole run. `MemoryError` is reserved for conditions that make
//! the rest of the operation meaningless to continue.

use thiserror::Error;

/// Unified error enumeration for the memory/context-pack engine.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// A repository-relative path failed normalization (§4.1 of the design).
    #[error("invalid path `{0}`")]
    InvalidPath(String),

    /// A `meta.json` file did not parse as a JSON object.
    #[error("invalid meta.json at `{0}`: {1}")]
    InvalidMeta(String, String),

    /// The version-control adapter failed to resolve, read, or diff.
    #[error("vcs error: {0}")]
    Vcs(String),

    /// `build-pack` was asked for a task id that does not resolve to a task.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A memory id referenced during pack assembly does not exist in the snapshot.
    #[error("pack dependency missing: {0}")]
    PackDependencyMissing(String),

    /// A `pack.include_paths` entry does not resolve to a file or directory.
    #[error("pack include path missing: {0}")]
    PackIncludeMissing(String),

    /// A path expected to be a git blob resolved to something else (or nothing).
    #[error("not a blob at `{0}`")]
    NotABlob(String),

    /// Underlying I/O failure (reading/writing the pack document, report, etc).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON where a well-formed document was required.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate for fallible core operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
