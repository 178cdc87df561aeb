//! Integration tests covering the concrete scenarios from the design's
//! testable-properties section: validation, staleness, and pack assembly
//! and verification driven against a real git repository created per test.

use std::fs;
use std::path::Path;
use std::process::Command;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;

use ai_memory_pack::memory::stale::check_stale;
use ai_memory_pack::memory::validate::validate_memory;
use ai_memory_pack::memory::load_memory;
use ai_memory_pack::pack::{build_pack, verify_pack};
use ai_memory_pack::vcs::{GixVcsBackend, VcsBackend};

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git must be on PATH for integration tests");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "--quiet"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "user.name", "Test"]);
    dir
}

fn write_text(dir: &Path, rel_path: &str, content: &str) {
    let path = dir.join(rel_path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn write_json(dir: &Path, rel_path: &str, value: &Value) {
    write_text(dir, rel_path, &serde_json::to_string_pretty(value).unwrap());
}

fn commit_all(dir: &Path, message: &str) -> String {
    git(dir.path(), &["add", "-A"]);
    git(dir.path(), &["commit", "--no-gpg-sign", "-m", message]);
    git(dir.path(), &["rev-parse", "HEAD"])
}

fn task_meta(id: &str, evidence_ref: &str, pack: Value) -> Value {
    json!({
        "schema_version": 1,
        "id": id,
        "type": "task",
        "status": "active",
        "title": "Test Task",
        "evidence": [{"kind": "repo_path", "ref": evidence_ref}],
        "pack": pack,
    })
}

fn constraint_meta(id: &str, key: &str, evidence_ref: &str) -> Value {
    json!({
        "schema_version": 1,
        "id": id,
        "type": "constraint",
        "status": "active",
        "title": "Test Constraint",
        "key": key,
        "evidence": [{"kind": "repo_path", "ref": evidence_ref}],
    })
}

#[test]
fn minimal_valid_snapshot_has_no_errors() {
    let dir = init_repo();
    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    write_json(
        dir.path(),
        ".ai/memory/constraints/CONSTRAINT-0001/meta.json",
        &constraint_meta("CONSTRAINT-0001", "K1", ".ai/evidence/conversations/test.md"),
    );
    write_text(dir.path(), "src/a.txt", "A\n");
    write_json(
        dir.path(),
        ".ai/memory/tasks/TASK-0001/meta.json",
        &task_meta(
            "TASK-0001",
            ".ai/evidence/conversations/test.md",
            json!({"include_paths": ["src"], "include_memory_ids": []}),
        ),
    );
    commit_all(dir.path(), "baseline");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let errors = validate_memory(&vcs, head, &loaded.items, &loaded.by_id).unwrap();
    assert_eq!(errors, Vec::<String>::new());
}

#[test]
fn duplicate_id_is_reported() {
    let dir = init_repo();
    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    let meta = task_meta(
        "TASK-0001",
        ".ai/evidence/conversations/test.md",
        json!({"include_paths": [], "include_memory_ids": []}),
    );
    write_json(dir.path(), ".ai/memory/tasks/TASK-0001-a/meta.json", &meta);
    write_json(dir.path(), ".ai/memory/tasks/TASK-0001-b/meta.json", &meta);
    commit_all(dir.path(), "dup");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let errors = validate_memory(&vcs, head, &loaded.items, &loaded.by_id).unwrap();
    assert!(errors.iter().any(|e| e.contains("duplicate id")));
}

#[test]
fn constraint_key_conflict_is_reported() {
    let dir = init_repo();
    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    write_json(
        dir.path(),
        ".ai/memory/constraints/CONSTRAINT-0001/meta.json",
        &constraint_meta("CONSTRAINT-0001", "K1", ".ai/evidence/conversations/test.md"),
    );
    write_json(
        dir.path(),
        ".ai/memory/constraints/CONSTRAINT-0002/meta.json",
        &constraint_meta("CONSTRAINT-0002", "K1", ".ai/evidence/conversations/test.md"),
    );
    commit_all(dir.path(), "conflict");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let errors = validate_memory(&vcs, head, &loaded.items, &loaded.by_id).unwrap();
    assert!(errors.iter().any(|e| e.contains("constraint.key conflict")));
}

#[test]
fn stale_watch_path_is_an_error() {
    let dir = init_repo();
    write_text(dir.path(), "src/a.txt", "A1\n");
    let base = commit_all(dir.path(), "base");

    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    let mut meta = task_meta(
        "TASK-0001",
        ".ai/evidence/conversations/test.md",
        json!({"include_paths": [], "include_memory_ids": []}),
    );
    meta["watch_paths"] = json!(["src/a.txt"]);
    meta["verified_commit"] = json!(base);
    write_json(dir.path(), ".ai/memory/tasks/TASK-0001/meta.json", &meta);
    commit_all(dir.path(), "add task");

    write_text(dir.path(), "src/a.txt", "A2\n");
    commit_all(dir.path(), "change watched file");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let (errors, warnings) = check_stale(&vcs, head, &loaded.items).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("STALE"));
}

#[test]
fn stale_exemption_downgrades_to_warning() {
    let dir = init_repo();
    write_text(dir.path(), "src/a.txt", "A1\n");
    let base = commit_all(dir.path(), "base");

    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    let mut meta = task_meta(
        "TASK-0001",
        ".ai/evidence/conversations/test.md",
        json!({"include_paths": [], "include_memory_ids": []}),
    );
    meta["watch_paths"] = json!(["src/a.txt"]);
    meta["verified_commit"] = json!(base);
    meta["stale_exemption"] = json!({"reason": "deliberate"});
    write_json(dir.path(), ".ai/memory/tasks/TASK-0001/meta.json", &meta);
    commit_all(dir.path(), "add task");

    write_text(dir.path(), "src/a.txt", "A2\n");
    commit_all(dir.path(), "change watched file");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let (errors, warnings) = check_stale(&vcs, head, &loaded.items).unwrap();
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("STALE but exempted"));
}

#[test]
fn pack_tamper_is_detected() {
    let dir = init_repo();
    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    write_json(
        dir.path(),
        ".ai/memory/tasks/TASK-0001/meta.json",
        &task_meta(
            "TASK-0001",
            ".ai/evidence/conversations/test.md",
            json!({"include_paths": [], "include_memory_ids": []}),
        ),
    );
    commit_all(dir.path(), "baseline");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let mut pack = serde_json::to_value(build_pack(&vcs, head, "TASK-0001", &loaded.by_id).unwrap()).unwrap();

    let items = pack["items"].as_array_mut().unwrap();
    let evidence_item = items
        .iter_mut()
        .find(|it| it["kind"] == "evidence")
        .expect("evidence item present");
    evidence_item["content_b64"] = json!(BASE64.encode(b"tampered\n"));

    let errors = verify_pack(&vcs, &pack, Some("TASK-0001")).unwrap();
    assert!(errors
        .iter()
        .any(|e| e.contains("content mismatch") || e.contains("sha256 mismatch")));
}

#[test]
fn pack_build_is_byte_deterministic() {
    let dir = init_repo();
    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    write_json(
        dir.path(),
        ".ai/memory/tasks/TASK-0001/meta.json",
        &task_meta(
            "TASK-0001",
            ".ai/evidence/conversations/test.md",
            json!({"include_paths": [], "include_memory_ids": []}),
        ),
    );
    commit_all(dir.path(), "baseline");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();

    let first = build_pack(&vcs, head, "TASK-0001", &loaded.by_id).unwrap();
    let second = build_pack(&vcs, head, "TASK-0001", &loaded.by_id).unwrap();

    let first_bytes = ai_memory_pack::canonical_json::to_canonical_bytes(&first).unwrap();
    let second_bytes = ai_memory_pack::canonical_json::to_canonical_bytes(&second).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn unsorted_items_are_rejected() {
    let dir = init_repo();
    write_text(dir.path(), ".ai/evidence/conversations/test.md", "hi\n");
    write_json(
        dir.path(),
        ".ai/memory/tasks/TASK-0001/meta.json",
        &task_meta(
            "TASK-0001",
            ".ai/evidence/conversations/test.md",
            json!({"include_paths": [], "include_memory_ids": []}),
        ),
    );
    commit_all(dir.path(), "baseline");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let mut pack = serde_json::to_value(build_pack(&vcs, head, "TASK-0001", &loaded.by_id).unwrap()).unwrap();
    pack["items"].as_array_mut().unwrap().reverse();

    let errors = verify_pack(&vcs, &pack, Some("TASK-0001")).unwrap();
    assert!(errors
        .iter()
        .any(|e| e.contains("items must be sorted")));
}

#[test]
fn evidence_directory_expands_to_its_files() {
    let dir = init_repo();
    write_text(dir.path(), ".ai/evidence/d/a.txt", "a\n");
    write_text(dir.path(), ".ai/evidence/d/b.txt", "b\n");
    write_json(
        dir.path(),
        ".ai/memory/tasks/TASK-0001/meta.json",
        &task_meta(
            "TASK-0001",
            ".ai/evidence/d",
            json!({"include_paths": [], "include_memory_ids": []}),
        ),
    );
    commit_all(dir.path(), "baseline");

    let vcs = GixVcsBackend::open(dir.path()).unwrap();
    let head = vcs.resolve("HEAD").unwrap();
    let loaded = load_memory(&vcs, head).unwrap();
    let pack = build_pack(&vcs, head, "TASK-0001", &loaded.by_id).unwrap();

    let evidence_paths: Vec<&str> = pack
        .items
        .iter()
        .filter(|it| it.kind == "evidence")
        .map(|it| it.path.as_str())
        .collect();
    assert!(evidence_paths.contains(&".ai/evidence/d/a.txt"));
    assert!(evidence_paths.contains(&".ai/evidence/d/b.txt"));
}
