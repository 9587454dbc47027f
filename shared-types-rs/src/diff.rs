// shared-types-rs/src/diff.rs
// Unified-diff rendering and replay.
//
// Patches always carry a unified diff for display and audit. Replay is only
// needed when a strategy hands back a diff without the full replacement
// text; it rebuilds the new text from the original plus the hunks.

use similar::TextDiff;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error("diff contains no hunks")]
    NoHunks,

    #[error("malformed hunk header: {0}")]
    MalformedHunk(String),

    #[error("diff reconstruction produced no content")]
    EmptyReconstruction,
}

/// Render a line-level unified diff between two texts.
///
/// Identical inputs produce an empty string.
pub fn unified_diff(original: &str, modified: &str) -> String {
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .header("original", "modified")
        .to_string()
}

/// Old-side start line (1-based) of a `@@ -a,b +c,d @@` header.
fn parse_hunk_start(header: &str) -> Result<usize, DiffError> {
    let malformed = || DiffError::MalformedHunk(header.to_string());

    let old_range = header
        .trim_start_matches('@')
        .split_whitespace()
        .find(|part| part.starts_with('-'))
        .ok_or_else(malformed)?;

    old_range[1..]
        .split(',')
        .next()
        .and_then(|start| start.parse::<usize>().ok())
        .ok_or_else(malformed)
}

/// Rebuild the modified text from `original` and a unified diff of it.
///
/// Context and added lines are replayed, removed lines are dropped, and
/// original lines outside every hunk are carried over unchanged.
pub fn reconstruct_from_diff(original: &str, diff: &str) -> Result<String, DiffError> {
    let old_lines: Vec<&str> = original.lines().collect();
    let mut out: Vec<String> = Vec::new();
    let mut cursor = 0usize;
    let mut saw_hunk = false;
    let mut trailing_newline = original.ends_with('\n') || original.is_empty();
    let mut last_marker_target: Option<char> = None;

    for line in diff.lines() {
        if line.starts_with("@@") {
            let start = parse_hunk_start(line)?;
            // A zero start means the hunk inserts before the first line.
            let hunk_index = start.saturating_sub(1);
            while cursor < hunk_index && cursor < old_lines.len() {
                out.push(old_lines[cursor].to_string());
                cursor += 1;
            }
            saw_hunk = true;
            last_marker_target = None;
            continue;
        }

        // File headers precede the first hunk.
        if !saw_hunk {
            continue;
        }

        if line.starts_with('\\') {
            match last_marker_target {
                Some('+') | Some(' ') => trailing_newline = false,
                Some('-') => trailing_newline = true,
                _ => {}
            }
            continue;
        }

        match line.chars().next() {
            Some('+') => {
                out.push(line[1..].to_string());
                last_marker_target = Some('+');
            }
            Some('-') => {
                cursor += 1;
                last_marker_target = Some('-');
            }
            Some(' ') => {
                out.push(line[1..].to_string());
                cursor += 1;
                last_marker_target = Some(' ');
            }
            // Some producers strip the leading space from blank context lines.
            None => {
                out.push(String::new());
                cursor += 1;
                last_marker_target = Some(' ');
            }
            Some(_) => {}
        }
    }

    if !saw_hunk {
        return Err(DiffError::NoHunks);
    }

    while cursor < old_lines.len() {
        out.push(old_lines[cursor].to_string());
        cursor += 1;
    }

    if out.iter().all(|line| line.trim().is_empty()) {
        return Err(DiffError::EmptyReconstruction);
    }

    let mut text = out.join("\n");
    if trailing_newline {
        text.push('\n');
    }
    Ok(text)
}

/// Replay `diff` onto `original`, falling back to the unchanged original
/// when the diff cannot be replayed.
pub fn apply_or_original(original: &str, diff: &str) -> String {
    match reconstruct_from_diff(original, diff) {
        Ok(text) => text,
        Err(_) => original.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_texts_have_empty_diff() {
        assert_eq!(unified_diff("a\nb\n", "a\nb\n"), "");
    }

    #[test]
    fn diff_has_headers_and_changes() {
        let diff = unified_diff("if x > 0\n    print(x)\n", "if x > 0:\n    print(x)\n");
        assert!(diff.starts_with("--- original\n+++ modified\n"));
        assert!(diff.contains("-if x > 0\n"));
        assert!(diff.contains("+if x > 0:\n"));
        assert!(diff.contains("     print(x)\n"));
    }

    #[test]
    fn replay_restores_lines_outside_hunks() {
        let original: String = (1..=20).map(|n| format!("line_{n} = {n}\n")).collect();
        let modified = original
            .replace("line_3 = 3\n", "line_3 = 30\n")
            .replace("line_17 = 17\n", "line_17 = 17\nextra = True\n");

        let diff = unified_diff(&original, &modified);
        assert_eq!(reconstruct_from_diff(&original, &diff).unwrap(), modified);
    }

    #[test]
    fn replay_respects_missing_trailing_newline() {
        let original = "a = 1\nb = 2";
        let modified = "a = 1\nb = 3";

        let diff = unified_diff(original, modified);
        assert_eq!(reconstruct_from_diff(original, &diff).unwrap(), modified);
    }

    #[test]
    fn unusable_diff_falls_back_to_original() {
        let original = "print('hi')\n";
        assert_eq!(reconstruct_from_diff(original, ""), Err(DiffError::NoHunks));
        assert_eq!(apply_or_original(original, "not a diff"), original);

        let wipe = unified_diff(original, "");
        assert_eq!(
            reconstruct_from_diff(original, &wipe),
            Err(DiffError::EmptyReconstruction)
        );
        assert_eq!(apply_or_original(original, &wipe), original);
    }
}
