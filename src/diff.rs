//! Unified diff rendering for dry-run previews.
//!
//! Produces human-reviewable diffs between two structured documents: flat
//! key/value projections (stack parameters, tags) and raw template bodies.

use std::collections::BTreeMap;

use similar::TextDiff;

/// Number of context lines around each hunk.
const CONTEXT_RADIUS: usize = 3;

/// Computes a unified diff between two text documents.
///
/// The labels stand in for file names in the diff header. Identical inputs
/// produce an empty string.
#[must_use]
pub fn unified_text_diff(old: &str, new: &str, from_label: &str, to_label: &str) -> String {
    if old == new {
        return String::new();
    }
    let diff = TextDiff::from_lines(old, new);
    diff.unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(from_label, to_label)
        .to_string()
}

/// Computes a unified diff between two flat key/value maps.
///
/// Each map is projected onto sorted `key = value` lines first, so the diff
/// reads the same regardless of the order the control plane returned the
/// entries in.
#[must_use]
pub fn unified_kv_diff(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
    from_label: &str,
    to_label: &str,
) -> String {
    unified_text_diff(&render_kv(old), &render_kv(new), from_label, to_label)
}

fn render_kv(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_identical_maps_produce_empty_diff() {
        let a = map(&[("Env", "dev"), ("Size", "small")]);
        assert_eq!(unified_kv_diff(&a, &a.clone(), "current", "proposed"), "");
    }

    #[test]
    fn test_changed_value_appears_as_remove_and_add() {
        let old = map(&[("Env", "dev"), ("Size", "small")]);
        let new = map(&[("Env", "dev"), ("Size", "large")]);

        let diff = unified_kv_diff(&old, &new, "app-dev", "app-dev-dry-run");
        assert!(diff.contains("--- app-dev"));
        assert!(diff.contains("+++ app-dev-dry-run"));
        assert!(diff.contains("-Size = small"));
        assert!(diff.contains("+Size = large"));
        assert!(!diff.contains("-Env"));
    }

    #[test]
    fn test_added_key_appears_only_as_add() {
        let old = map(&[("Env", "dev")]);
        let new = map(&[("Env", "dev"), ("Replicas", "3")]);

        let diff = unified_kv_diff(&old, &new, "a", "b");
        assert!(diff.contains("+Replicas = 3"));
        assert!(!diff.contains("-Replicas"));
    }

    #[test]
    fn test_template_body_diff() {
        let old = "Resources:\n  Bucket:\n    Type: Storage\n";
        let new = "Resources:\n  Bucket:\n    Type: Storage\n  Queue:\n    Type: Queue\n";

        let diff = unified_text_diff(old, new, "app-dev", "app-dev-dry-run");
        assert!(diff.contains("+  Queue:"));
    }
}
