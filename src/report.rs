//! Report verifier (C8): syntactic checks on an agent's post-run report.
//!
//! Purely structural — it never touches the repository or the version
//! control adapter, unlike every other validator/verifier in this crate.

use serde_json::Value;

use crate::path;

fn is_hex(s: &str, n: usize) -> bool {
    s.len() == n && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

fn is_hex_range(s: &str, min_n: usize, max_n: usize) -> bool {
    (min_n..=max_n).contains(&s.len())
        && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// Validate an agent report document, accumulating every error.
pub fn validate_agent_report(data: &Value, expect_task_id: Option<&str>) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(obj) = data.as_object() else {
        tracing::warn!("agent report is not a JSON object");
        return vec!["report must be a JSON object".to_string()];
    };

    tracing::debug!(
        "validating agent report run={:?} task={:?}",
        obj.get("run_id").and_then(Value::as_str).unwrap_or(""),
        obj.get("task_id").and_then(Value::as_str).unwrap_or("")
    );

    if obj.get("schema_version") != Some(&Value::from(1)) {
        errors.push("schema_version must be 1".to_string());
    }

    for key in ["run_id", "agent_id", "task_id"] {
        let v = obj.get(key).and_then(Value::as_str).unwrap_or("");
        if v.trim().is_empty() {
            errors.push(format!("{key} must be non-empty string"));
        }
    }

    if let Some(expected) = expect_task_id.filter(|e| !e.is_empty()) {
        let actual = obj.get("task_id").and_then(Value::as_str).unwrap_or("");
        if actual != expected {
            errors.push(format!(
                "task_id mismatch: expect {expected:?}, got {actual:?}"
            ));
        }
    }

    let Some(ctx) = obj.get("context").and_then(Value::as_object) else {
        errors.push("context must be object".to_string());
        return errors;
    };

    let pack_id = ctx.get("pack_id").and_then(Value::as_str).unwrap_or("");
    if !is_hex(pack_id, 64) {
        errors.push("context.pack_id must be 64-hex sha256 string".to_string());
    }
    let repo_commit = ctx.get("repo_commit").and_then(Value::as_str).unwrap_or("");
    if !is_hex_range(repo_commit, 7, 40) {
        errors.push("context.repo_commit must be 7-40 hex git sha string".to_string());
    }
    match ctx.get("memory_tree") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.is_empty() => {}
        Some(Value::String(s)) if is_hex_range(s, 7, 40) => {}
        _ => errors.push(
            "context.memory_tree must be 7-40 hex git sha string, null, or empty string".to_string(),
        ),
    }

    match obj.get("changes").and_then(Value::as_array) {
        None => errors.push("changes must be list".to_string()),
        Some(changes) => {
            for (i, change) in changes.iter().enumerate() {
                let Some(change_obj) = change.as_object() else {
                    errors.push(format!("changes[{i}] must be object"));
                    continue;
                };
                let change_path = change_obj.get("path").and_then(Value::as_str).unwrap_or("");
                let action = change_obj.get("action").and_then(Value::as_str).unwrap_or("");
                if change_path.trim().is_empty() {
                    errors.push(format!("changes[{i}].path must be non-empty string"));
                } else if path::normalize(change_path).is_err() {
                    errors.push(format!(
                        "changes[{i}].path invalid: invalid repo-relative path: {change_path:?}"
                    ));
                }
                if !matches!(action, "add" | "modify" | "delete" | "rename") {
                    errors.push(format!(
                        "changes[{i}].action must be one of add/modify/delete/rename"
                    ));
                }
            }
        }
    }

    match obj.get("validation").and_then(Value::as_array) {
        None => errors.push("validation must be list".to_string()),
        Some(validation) => {
            for (i, v) in validation.iter().enumerate() {
                let Some(v_obj) = v.as_object() else {
                    errors.push(format!("validation[{i}] must be object"));
                    continue;
                };
                let name = v_obj.get("name").and_then(Value::as_str).unwrap_or("");
                let status = v_obj.get("status").and_then(Value::as_str).unwrap_or("");
                if name.trim().is_empty() {
                    errors.push(format!("validation[{i}].name must be non-empty string"));
                }
                if !matches!(status, "pass" | "fail" | "skipped") {
                    errors.push(format!(
                        "validation[{i}].status must be one of pass/fail/skipped"
                    ));
                }
                if let Some(exit_code) = v_obj.get("exit_code") {
                    if !exit_code.is_null() && !exit_code.is_i64() && !exit_code.is_u64() {
                        errors.push(format!(
                            "validation[{i}].exit_code must be integer when present"
                        ));
                    }
                }
            }
        }
    }

    if let Some(memory_updates) = obj.get("memory_updates") {
        if !memory_updates.is_null() {
            match memory_updates.as_array() {
                None => errors.push("memory_updates must be list when present".to_string()),
                Some(list) => {
                    for (i, mu) in list.iter().enumerate() {
                        let Some(mu_obj) = mu.as_object() else {
                            errors.push(format!("memory_updates[{i}] must be object"));
                            continue;
                        };
                        let id = mu_obj.get("id").and_then(Value::as_str).unwrap_or("");
                        let action = mu_obj.get("action").and_then(Value::as_str).unwrap_or("");
                        if id.trim().is_empty() {
                            errors.push(format!("memory_updates[{i}].id must be non-empty string"));
                        }
                        if !matches!(action, "add" | "modify" | "none") {
                            errors.push(format!(
                                "memory_updates[{i}].action must be one of add/modify/none"
                            ));
                        }
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        tracing::debug!("agent report is valid");
    } else {
        tracing::warn!("agent report has {} validation errors", errors.len());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_report() -> Value {
        json!({
            "schema_version": 1,
            "run_id": "r1",
            "agent_id": "a1",
            "task_id": "TASK-0001",
            "context": {
                "pack_id": "a".repeat(64),
                "repo_commit": "a".repeat(40),
                "memory_tree": null,
            },
            "changes": [{"path": "src/a.txt", "action": "modify"}],
            "validation": [{"name": "tests", "status": "pass"}],
        })
    }

    #[test]
    fn accepts_minimal_valid_report() {
        assert!(validate_agent_report(&minimal_report(), None).is_empty());
    }

    #[test]
    fn rejects_task_id_mismatch() {
        let errs = validate_agent_report(&minimal_report(), Some("TASK-0002"));
        assert!(errs.iter().any(|e| e.contains("task_id mismatch")));
    }

    #[test]
    fn rejects_bad_action() {
        let mut report = minimal_report();
        report["changes"][0]["action"] = json!("oops");
        let errs = validate_agent_report(&report, None);
        assert!(errs.iter().any(|e| e.contains("action must be one of")));
    }
}
