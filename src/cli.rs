//! Command surface (thin adapter, not core) — five operations over a commit
//! snapshot, each exiting `0` on success or `1` with errors on stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Validate and assemble context packs from curated repository memory.
#[derive(Parser)]
#[command(name = "memctl")]
#[command(version, about)]
pub struct Cli {
    /// Path to the repository (defaults to the current directory).
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate curated memory (meta.json) at a commit.
    Validate {
        #[arg(long, default_value = "HEAD")]
        commit: String,
    },

    /// Check stale memory items via watch_paths.
    CheckStale {
        #[arg(long, default_value = "HEAD")]
        commit: String,
    },

    /// Build a deterministic context pack for a task.
    BuildPack {
        #[arg(long, default_value = "HEAD")]
        commit: String,
        #[arg(long = "task-id")]
        task_id: String,
        /// Output path, or `-`/omitted to write to standard output.
        #[arg(long, default_value = "-")]
        out: String,
    },

    /// Validate an agent report's basic shape.
    ValidateReport {
        #[arg(long)]
        report: PathBuf,
        #[arg(long = "task-id")]
        task_id: Option<String>,
    },

    /// Validate a context pack's integrity against the live repository.
    ValidatePack {
        #[arg(long)]
        pack: PathBuf,
        #[arg(long = "task-id")]
        task_id: Option<String>,
    },
}
