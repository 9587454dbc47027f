// rule-engine-rs/src/rules/types.rs
// Rules for operand-type mismatches.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{join_lines, line_numbers, Edit};
use crate::source::Source;

/// A string literal (masked) followed by `+ operand`.
static LITERAL_PLUS_OPERAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(["'])[^"'\n]*["']\s*\+\s*([A-Za-z_][A-Za-z0-9_]*|\d+(?:\.\d+)?)"#)
        .expect("concatenation pattern must compile")
});

/// `operand +` followed by a string literal.
static OPERAND_PLUS_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[^\w.)\]"'])([A-Za-z_][A-Za-z0-9_]*|\d+(?:\.\d+)?)\s*\+\s*["']"#)
        .expect("reverse concatenation pattern must compile")
});

static FLOAT_REPEAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\w)\]"']\s*\*\s*(\d+\.\d+)"#).expect("sequence repeat pattern must compile")
});

static APPEND_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.append\(").expect("append pattern must compile")
});

/// Replacement spans collected on one line, applied right to left.
fn apply_spans(line: &str, mut spans: Vec<(usize, usize, String)>) -> String {
    spans.sort_by(|a, b| b.0.cmp(&a.0));
    let mut out = line.to_string();
    for (start, end, replacement) in spans {
        out.replace_range(start..end, &replacement);
    }
    out
}

fn is_wrappable(masked: &str, end: usize) -> bool {
    // `name(` and `name.attr` / `name[i]` are left alone.
    !matches!(masked.as_bytes().get(end), Some(b'(') | Some(b'.') | Some(b'['))
}

/// Wrap the non-string operand of a `str + value` concatenation in `str()`.
pub(crate) fn string_concat(error: &str, src: &Source<'_>) -> Option<Edit> {
    let reverse = error.contains("unsupported operand type(s) for +") && error.contains("'str'");

    let mut out: Vec<String> = Vec::with_capacity(src.len());
    let mut changed = Vec::new();

    for i in 0..src.len() {
        let line = src.lines[i];
        let masked = &src.masked[i];
        let mut spans = Vec::new();

        for caps in LITERAL_PLUS_OPERAND.captures_iter(masked) {
            let Some(operand) = caps.get(2) else { continue };
            if operand.as_str() == "str" || !is_wrappable(masked, operand.end()) {
                continue;
            }
            spans.push((
                operand.start(),
                operand.end(),
                format!("str({})", &line[operand.start()..operand.end()]),
            ));
        }

        if reverse {
            for caps in OPERAND_PLUS_LITERAL.captures_iter(masked) {
                let Some(operand) = caps.get(2) else { continue };
                if spans.iter().any(|(start, _, _)| *start == operand.start()) {
                    continue;
                }
                spans.push((
                    operand.start(),
                    operand.end(),
                    format!("str({})", &line[operand.start()..operand.end()]),
                ));
            }
        }

        if spans.is_empty() {
            out.push(line.to_string());
        } else {
            out.push(apply_spans(line, spans));
            changed.push(i);
        }
    }

    if changed.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(out),
        format!(
            "Wrapped non-string operand in str() for string concatenation on {}",
            line_numbers(&changed)
        ),
    ))
}

/// `seq * 2.0` becomes `seq * int(2.0)`.
pub(crate) fn sequence_repeat(_error: &str, src: &Source<'_>) -> Option<Edit> {
    let mut out: Vec<String> = Vec::with_capacity(src.len());
    let mut changed = Vec::new();

    for i in 0..src.len() {
        let line = src.lines[i];
        let spans: Vec<(usize, usize, String)> = FLOAT_REPEAT
            .captures_iter(&src.masked[i])
            .filter_map(|caps| caps.get(1))
            .map(|factor| {
                (
                    factor.start(),
                    factor.end(),
                    format!("int({})", factor.as_str()),
                )
            })
            .collect();

        if spans.is_empty() {
            out.push(line.to_string());
        } else {
            out.push(apply_spans(line, spans));
            changed.push(i);
        }
    }

    if changed.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(out),
        format!(
            "Converted float repeat count to int for sequence multiplication on {}",
            line_numbers(&changed)
        ),
    ))
}

/// Turn the tuple assigned to a variable that is later appended to into a
/// list. Only variables with an `.append(` call are touched.
pub(crate) fn tuple_append(_error: &str, src: &Source<'_>) -> Option<Edit> {
    let appended: Vec<String> = src
        .masked
        .iter()
        .flat_map(|masked| {
            APPEND_CALL
                .captures_iter(masked)
                .filter_map(|caps| caps.get(1).map(|name| name.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .collect();
    if appended.is_empty() {
        return None;
    }

    let mut out: Vec<String> = Vec::with_capacity(src.len());
    let mut converted = Vec::new();

    for i in 0..src.len() {
        let line = src.lines[i];
        match tuple_to_list(src, i, &appended) {
            Some((rewritten, name)) => {
                out.push(rewritten);
                if !converted.contains(&name) {
                    converted.push(name);
                }
            }
            None => out.push(line.to_string()),
        }
    }

    if converted.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(out),
        format!(
            "Converted tuple to list so append() works for {}",
            converted.join(", ")
        ),
    ))
}

fn tuple_to_list(src: &Source<'_>, i: usize, appended: &[String]) -> Option<(String, String)> {
    if !src.is_simple_statement(i) {
        return None;
    }
    let code = src.code(i);
    let (target, value) = code.split_once('=')?;
    let target = target.trim();
    if !appended.iter().any(|name| name == target) || value.starts_with('=') {
        return None;
    }

    let line = src.lines[i];
    let value_start = src.indent(i).len() + code.len() - value.len();
    let value_trimmed = value.trim();
    let open = value_start + (value.len() - value.trim_start().len());
    let close = src.code_end(i) - 1;

    let list_text = if value_trimmed == "tuple()" {
        "[]".to_string()
    } else if value_trimmed.starts_with('(') && value_trimmed.ends_with(')') && encloses_whole(value_trimmed) {
        format!("[{}]", &line[open + 1..close])
    } else {
        return None;
    };

    Some((
        format!("{}{}{}", &line[..open], list_text, &line[close + 1..]),
        target.to_string(),
    ))
}

/// Whether the opening parenthesis of `value` closes at its final byte,
/// as in `(1, 2)` but not `(a) + (b)`.
fn encloses_whole(value: &str) -> bool {
    let mut depth = 0i32;
    for (i, b) in value.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i == value.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}
