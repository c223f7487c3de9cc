//! Dry-run unified diff support for `hubsync patch --dry-run`.

use std::path::Path;

use similar::TextDiff;

/// Unified diff of `before` → `after` with `a/`/`b/` headers relative to
/// `root` when possible. Empty when the texts are identical.
pub fn unified_diff(path: &Path, root: &Path, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    let old_header = format!("a/{}", relative.display());
    let new_header = format!("b/{}", relative.display());
    TextDiff::from_lines(before, after)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_have_no_diff() {
        assert!(unified_diff(Path::new("/r/1.lua"), Path::new("/r"), "a\n", "a\n").is_empty());
    }

    #[test]
    fn diff_marks_changed_line() {
        let diff = unified_diff(
            Path::new("/r/1.lua"),
            Path::new("/r"),
            "addappid(1)\nsetManifestid(10,\"AAA\")\n",
            "addappid(1)\nsetManifestid(10,\"BBB\")\n",
        );
        assert!(diff.contains("--- a/1.lua"));
        assert!(diff.contains("+++ b/1.lua"));
        assert!(diff.contains("-setManifestid(10,\"AAA\")"));
        assert!(diff.contains("+setManifestid(10,\"BBB\")"));
    }
}
