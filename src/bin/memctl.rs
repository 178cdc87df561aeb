//! `memctl` — the thin command-line adapter over the memory/context-pack core.

use std::fs;
use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ai_memory_pack::cli::{Cli, Command};
use ai_memory_pack::errors::MemoryError;
use ai_memory_pack::memory::{load_memory, stale::check_stale, validate::validate_memory};
use ai_memory_pack::pack::{build_pack, verify_pack};
use ai_memory_pack::report::validate_agent_report;
use ai_memory_pack::vcs::{GixVcsBackend, VcsBackend};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("memctl aborted: {e}");
            eprintln!("ERROR: {e}");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32, MemoryError> {
    let vcs = GixVcsBackend::open(&cli.repo)?;

    match cli.command {
        Command::Validate { commit } => {
            let resolved = vcs.resolve(&commit)?;
            let loaded = load_memory(&vcs, resolved)?;
            let errors = validate_memory(&vcs, resolved, &loaded.items, &loaded.by_id)?;
            if !errors.is_empty() {
                for e in &errors {
                    eprintln!("ERROR: {e}");
                }
                return Ok(1);
            }
            println!("OK: validated {} memory items at {resolved}", loaded.items.len());
            Ok(0)
        }

        Command::CheckStale { commit } => {
            let resolved = vcs.resolve(&commit)?;
            let loaded = load_memory(&vcs, resolved)?;
            let (errors, warnings) = check_stale(&vcs, resolved, &loaded.items)?;
            for w in &warnings {
                eprintln!("WARN: {w}");
            }
            if !errors.is_empty() {
                for e in &errors {
                    eprintln!("ERROR: {e}");
                }
                return Ok(1);
            }
            println!(
                "OK: stale check passed for {} memory items at {resolved}",
                loaded.items.len()
            );
            Ok(0)
        }

        Command::BuildPack { commit, task_id, out } => {
            let resolved = vcs.resolve(&commit)?;
            let loaded = load_memory(&vcs, resolved)?;
            let pack = build_pack(&vcs, resolved, &task_id, &loaded.by_id)?;
            let bytes = ai_memory_pack::canonical_json::to_canonical_bytes(&pack)?;
            write_output(&out, &bytes)?;
            Ok(0)
        }

        Command::ValidateReport { report, task_id } => {
            let raw = fs::read(&report)?;
            let data: serde_json::Value = serde_json::from_slice(&raw)?;
            let errors = validate_agent_report(&data, task_id.as_deref());
            if !errors.is_empty() {
                for e in &errors {
                    eprintln!("ERROR: {}: {e}", report.display());
                }
                return Ok(1);
            }
            println!("OK: agent report valid: {}", report.display());
            Ok(0)
        }

        Command::ValidatePack { pack, task_id } => {
            let raw = fs::read(&pack)?;
            let data: serde_json::Value = serde_json::from_slice(&raw)?;
            let errors = verify_pack(&vcs, &data, task_id.as_deref())?;
            if !errors.is_empty() {
                for e in &errors {
                    eprintln!("ERROR: {}: {e}", pack.display());
                }
                return Ok(1);
            }
            println!("OK: context pack valid: {}", pack.display());
            Ok(0)
        }
    }
}

fn write_output(out: &str, bytes: &[u8]) -> Result<(), MemoryError> {
    if out == "-" || out.trim().is_empty() {
        std::io::stdout().write_all(bytes)?;
        return Ok(());
    }
    let out_path = std::path::Path::new(out);
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(out_path, bytes)?;
    Ok(())
}
