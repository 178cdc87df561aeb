//! Repository-relative path normalization and safety checks (C1).
//!
//! Every externally supplied path — evidence refs, watch paths, include
//! paths, and pack-item paths read back from an untrusted pack document —
//! passes through [`normalize`] before it is ever concatenated with a
//! repository root or used as a lookup key. This is the sole gate that
//! keeps the engine from becoming a path-traversal vector.

use crate::errors::MemoryError;

/// Canonicalize a candidate repository-relative path string.
///
/// Rules, applied in order:
/// 1. Reject NUL or any byte below `0x20`.
/// 2. Replace `\` with `/`.
/// 3. Reject `:` (guards against drive letters).
/// 4. Strip all leading `/`.
/// 5. Split on `/`, drop empty and `.` segments, reject any `..` segment,
///    and reject the empty result.
///
/// The output equals the input iff the input was already canonical —
/// pack verification depends on this idempotence (`normalize(normalize(p))
/// == normalize(p)`).
pub fn normalize(path: &str) -> Result<String, MemoryError> {
    if path.bytes().any(|b| b == 0 || b < 0x20) {
        return Err(MemoryError::InvalidPath(path.to_string()));
    }

    let slashed = path.replace('\\', "/");

    if slashed.contains(':') {
        return Err(MemoryError::InvalidPath(path.to_string()));
    }

    let stripped = slashed.trim_start_matches('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in stripped.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(MemoryError::InvalidPath(path.to_string()));
        }
        parts.push(segment);
    }

    if parts.is_empty() {
        return Err(MemoryError::InvalidPath(path.to_string()));
    }

    Ok(parts.join("/"))
}

/// Returns `true` if `path` normalizes to exactly itself.
///
/// Used by the pack verifier (§4.7) to reject pack documents whose item
/// paths are not already in canonical form.
pub fn is_canonical(path: &str) -> bool {
    matches!(normalize(path), Ok(normalized) if normalized == path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_relative_path() {
        assert_eq!(normalize("src/a.txt").unwrap(), "src/a.txt");
    }

    #[test]
    fn strips_leading_slashes() {
        assert_eq!(normalize("///src/a.txt").unwrap(), "src/a.txt");
    }

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(normalize("./src/./a.txt").unwrap(), "src/a.txt");
    }

    #[test]
    fn normalizes_backslashes() {
        assert_eq!(normalize("src\\a.txt").unwrap(), "src/a.txt");
    }

    #[test]
    fn rejects_parent_segment() {
        assert!(normalize("src/../etc/passwd").is_err());
    }

    #[test]
    fn rejects_drive_letter() {
        assert!(normalize("C:/windows").is_err());
    }

    #[test]
    fn rejects_nul_byte() {
        assert!(normalize("src/a\0.txt").is_err());
    }

    #[test]
    fn rejects_control_byte() {
        assert!(normalize("src/a\u{0007}.txt").is_err());
    }

    #[test]
    fn rejects_empty_after_normalization() {
        assert!(normalize("///").is_err());
        assert!(normalize(".").is_err());
        assert!(normalize("").is_err());
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("./a//b/../../a/b").unwrap_err();
        let _ = once;
        let clean = normalize("a/b/c").unwrap();
        let twice = normalize(&clean).unwrap();
        assert_eq!(clean, twice);
    }

    #[test]
    fn is_canonical_rejects_non_canonical_form() {
        assert!(is_canonical("a/b"));
        assert!(!is_canonical("/a/b"));
        assert!(!is_canonical("a//b"));
        assert!(!is_canonical("a/./b"));
    }

    quickcheck::quickcheck! {
        fn normalize_is_idempotent(raw: String) -> bool {
            match normalize(&raw) {
                Ok(first) => matches!(normalize(&first), Ok(second) if second == first),
                Err(_) => true,
            }
        }
    }
}
