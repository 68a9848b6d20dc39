//! Render a [`PatchSpec`] as a single-hunk git-style unified diff.

use std::fmt::Write;

use crate::core::types::PatchSpec;

/// Post-image hash placeholder; the serializer never computes it.
pub const UNKNOWN_POSTIMAGE: &str = "0000000";
/// Regular, non-executable file.
pub const REGULAR_FILE_MODE: &str = "100644";

/// Produce the patch document for `patch`.
///
/// Header counts are emitted as given; inconsistent hunks are left for
/// `git apply` to reject.
pub fn render_patch(patch: &PatchSpec) -> String {
    let name = &patch.file_name;
    let mut doc = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(doc, "diff --git a/{name} b/{name}");
    let _ = writeln!(
        doc,
        "index {}..{UNKNOWN_POSTIMAGE} {REGULAR_FILE_MODE}",
        patch.blob_hash
    );
    let _ = writeln!(doc, "--- a/{name}");
    let _ = writeln!(doc, "+++ b/{name}");
    let _ = writeln!(doc, "@@ {} @@", patch.diff_range);
    for line in &patch.changes {
        let _ = writeln!(doc, "{line}");
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PatchLine;

    fn spec(range: &str, changes: Vec<PatchLine>) -> PatchSpec {
        PatchSpec {
            file_name: "src/file.txt".to_string(),
            blob_hash: "1234567".to_string(),
            diff_range: range.parse().expect("range"),
            changes,
        }
    }

    #[test]
    fn renders_exact_document() {
        let patch = spec(
            "-1,3 +1,4",
            vec![
                PatchLine::removed("line 1"),
                PatchLine::added("modified line 1"),
                PatchLine::context("line 2"),
                PatchLine::removed("line 3"),
                PatchLine::added("new line 3"),
                PatchLine::added("added line 4"),
            ],
        );
        let expected = "\
diff --git a/src/file.txt b/src/file.txt
index 1234567..0000000 100644
--- a/src/file.txt
+++ b/src/file.txt
@@ -1,3 +1,4 @@
-line 1
+modified line 1
 line 2
-line 3
+new line 3
+added line 4
";
        assert_eq!(render_patch(&patch), expected);
    }

    #[test]
    fn keeps_inconsistent_header_verbatim() {
        let patch = spec("-0,0 +1,5", vec![PatchLine::added("only one")]);
        let doc = render_patch(&patch);
        assert!(doc.contains("@@ -0,0 +1,5 @@\n+only one\n"));
        assert!(patch.range_mismatch().is_some());
    }

    #[test]
    fn empty_context_line_renders_as_single_space() {
        let patch = spec("-1 +1", vec![PatchLine::context("")]);
        assert!(render_patch(&patch).ends_with("@@ -1 +1 @@\n \n"));
    }
}
