// repair-pipeline-rs/src/extract.rs
// Pull source code and verdicts out of free-form completion text.

use once_cell::sync::Lazy;
use regex::Regex;

static PYTHON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:python|py)[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("python fence pattern must compile")
});

static BARE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("bare fence pattern must compile")
});

/// Lines starting like this are prose, not code.
const PROSE_PREFIXES: &[&str] = &["Here", "The", "This", "I ", "Fixed"];

const NO_FIX_VERDICT: &str = "NONE - Code is correct";

/// Extract code from a completion: a fenced block if there is one,
/// otherwise the text minus leading prose lines, otherwise `fallback`.
pub fn extract_code(response: &str, fallback: &str) -> String {
    for fence in [&*PYTHON_FENCE, &*BARE_FENCE] {
        if let Some(body) = fence.captures(response).and_then(|caps| caps.get(1)) {
            let code = body.as_str().trim();
            if !code.is_empty() {
                return code.to_string();
            }
        }
    }

    let lines: Vec<&str> = response
        .trim()
        .lines()
        .filter(|line| !PROSE_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .skip_while(|line| line.trim().is_empty())
        .collect();

    if lines.is_empty() {
        fallback.to_string()
    } else {
        lines.join("\n")
    }
}

/// Whether an analysis concluded there is nothing to fix.
pub fn is_no_fix_verdict(analysis: &str) -> bool {
    let trimmed = analysis.trim();
    trimmed.starts_with(NO_FIX_VERDICT)
        || trimmed
            .lines()
            .any(|line| line.trim().eq_ignore_ascii_case(NO_FIX_VERDICT))
}

/// Compare two code texts ignoring trailing whitespace differences.
pub fn same_code(a: &str, b: &str) -> bool {
    let normalize = |code: &str| -> Vec<String> {
        code.trim_end()
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect()
    };
    normalize(a) == normalize(b)
}

/// Truncate to at most `max_chars` characters, marking the cut.
pub fn bounded(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
