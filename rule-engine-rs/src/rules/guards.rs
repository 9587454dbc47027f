// rule-engine-rs/src/rules/guards.rs
// Defensive guards inserted around statements that crash at runtime.
//
// Each rule leaves a recognisable guard behind and skips statements that
// already carry one, so a second application is a no-op.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{join_lines, line_numbers, Edit};
use crate::source::{indent_unit, is_identifier_byte, Source, ValueKind};

const DIVISION_GUARD_RAISE: &str = "raise ValueError(\"Cannot divide by zero\")";

static DIVISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w)\]]\s*(?://?|%)\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)")
        .expect("division pattern must compile")
});

static DIVISION_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^if ([A-Za-z_][A-Za-z0-9_.]*) == 0:$").expect("division guard pattern must compile")
});

static INDEXED_ACCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\[\s*([A-Za-z_][A-Za-z0-9_]*|\d+)\s*\]")
        .expect("indexed-access pattern must compile")
});

static BOUNDS_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^if 0 <= .+ < len\(.+\)(?: and 0 <= .+ < len\(.+\))*:$")
        .expect("bounds guard pattern must compile")
});

static ASSIGNMENT_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*)\s*(?::[^=]+)?=[^=]").expect("assignment pattern must compile")
});

static KEY_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"KeyError:\s*(?:'([^']*)'|"([^"]*)"|(-?\d+))"#).expect("key-error pattern must compile")
});

static FUNCTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*(?:->.*)?:$")
        .expect("function header pattern must compile")
});

/// Guard each unguarded division by a named divisor with a zero check.
pub(crate) fn zero_division(_error: &str, src: &Source<'_>) -> Option<Edit> {
    let mut out: Vec<String> = Vec::with_capacity(src.len());
    let mut guarded = Vec::new();

    for i in 0..src.len() {
        let line = src.lines[i];
        let code = src.code(i);
        let guardable = (src.is_simple_statement(i) || opens_guardable_block(src, i))
            && !binds_own_names(code);
        if !guardable {
            out.push(line.to_string());
            continue;
        }

        let already_guarded = existing_division_guards(src, i);
        let mut divisors: Vec<&str> = Vec::new();
        for caps in DIVISION.captures_iter(code) {
            let Some(divisor) = caps.get(1) else { continue };
            let next = code.as_bytes().get(divisor.end()).copied();
            // Calls and subscripts are not plain values we can compare.
            if matches!(next, Some(b'(') | Some(b'[')) {
                continue;
            }
            let name = divisor.as_str();
            if !already_guarded.contains(name) && !divisors.contains(&name) {
                divisors.push(name);
            }
        }

        if divisors.is_empty() {
            out.push(line.to_string());
            continue;
        }

        let indent = src.indent(i);
        let unit = indent_unit(indent);
        for divisor in divisors {
            out.push(format!("{}if {} == 0:", indent, divisor));
            out.push(format!("{}{}{}", indent, unit, DIVISION_GUARD_RAISE));
        }
        out.push(line.to_string());
        guarded.push(i);
    }

    if guarded.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(out),
        format!("Added zero-division check before division on {}", line_numbers(&guarded)),
    ))
}

/// `if`/`while`/`for`/`return`-style lines can be preceded by a guard,
/// continuation clauses (`elif`, `else`, ...) cannot.
fn opens_guardable_block(src: &Source<'_>, i: usize) -> bool {
    let code = src.code(i);
    !src.is_continuation(i)
        && ["if ", "while ", "for "].iter().any(|kw| code.starts_with(kw))
        && code.ends_with(':')
}

/// Lambdas and comprehensions bind names that do not exist outside the
/// expression, so a guard placed before the statement cannot see them.
fn binds_own_names(code: &str) -> bool {
    code.contains("lambda") || (code.contains(" for ") && !code.starts_with("for "))
}

/// Divisors already guarded by the guard blocks directly above line `i`.
fn existing_division_guards(src: &Source<'_>, i: usize) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut j = i;
    while j >= 2 && src.lines[j - 1].trim() == DIVISION_GUARD_RAISE {
        let Some(caps) = DIVISION_GUARD.captures(src.code(j - 2)) else {
            break;
        };
        if let Some(name) = caps.get(1) {
            names.insert(name.as_str().to_string());
        }
        j -= 2;
    }
    names
}

/// Wrap indexed reads in a bounds check with an `else` branch that
/// reports the bad index instead of crashing.
pub(crate) fn index_bounds(_error: &str, src: &Source<'_>) -> Option<Edit> {
    let mut out: Vec<String> = Vec::with_capacity(src.len());
    let mut wrapped = Vec::new();

    for i in 0..src.len() {
        let line = src.lines[i];
        let code = src.code(i);
        if !src.is_simple_statement(i) || binds_own_names(code) || is_inside_bounds_guard(src, i) {
            out.push(line.to_string());
            continue;
        }

        let mut checks: Vec<(String, String)> = Vec::new();
        for caps in INDEXED_ACCESS.captures_iter(code) {
            let (Some(seq), Some(index)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            // `List[int]` and friends are type subscripts, not lookups.
            if seq.as_str().starts_with(|c: char| c.is_ascii_uppercase()) {
                continue;
            }
            // Mapping lookups are keyed, not bounded.
            if src.value_kind(seq.as_str(), i) == Some(ValueKind::Mapping) {
                continue;
            }
            let pair = (seq.as_str().to_string(), index.as_str().to_string());
            if !checks.contains(&pair) {
                checks.push(pair);
            }
        }

        if checks.is_empty() {
            out.push(line.to_string());
            continue;
        }

        let indent = src.indent(i);
        let unit = indent_unit(indent);
        let condition = checks
            .iter()
            .map(|(seq, index)| format!("0 <= {} < len({})", index, seq))
            .collect::<Vec<_>>()
            .join(" and ");
        let reported = checks
            .iter()
            .map(|(_, index)| index.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        out.push(format!("{}if {}:", indent, condition));
        out.push(format!("{}{}{}", indent, unit, line.trim_start()));
        out.push(format!("{}else:", indent));
        out.push(format!("{}{}print(\"Index out of range:\", {})", indent, unit, reported));
        if let Some(target) = assignment_target(code) {
            out.push(format!("{}{}{} = None", indent, unit, target));
        }
        wrapped.push(i);
    }

    if wrapped.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(out),
        format!("Added bounds check before indexed access on {}", line_numbers(&wrapped)),
    ))
}

fn is_inside_bounds_guard(src: &Source<'_>, i: usize) -> bool {
    src.previous_code_line(i)
        .map(|prev| {
            src.indent(prev).len() < src.indent(i).len() && BOUNDS_GUARD.is_match(src.code(prev))
        })
        .unwrap_or(false)
}

/// Wrap the failing kind of numeric conversion in `try`/`except ValueError`.
pub(crate) fn numeric_conversion(error: &str, src: &Source<'_>) -> Option<Edit> {
    let function = if error.contains("could not convert string to float") {
        "float("
    } else {
        "int("
    };

    let mut out: Vec<String> = Vec::with_capacity(src.len());
    let mut wrapped = Vec::new();

    for i in 0..src.len() {
        let line = src.lines[i];
        let code = src.code(i);
        if !src.is_simple_statement(i) || !calls_builtin(code, function) || is_inside_try(src, i) {
            out.push(line.to_string());
            continue;
        }

        let indent = src.indent(i);
        let unit = indent_unit(indent);
        out.push(format!("{}try:", indent));
        out.push(format!("{}{}{}", indent, unit, line.trim_start()));
        out.push(format!("{}except ValueError:", indent));
        out.push(format!(
            "{}{}print(\"Invalid value: cannot convert to {}\")",
            indent,
            unit,
            function.trim_end_matches('(')
        ));
        if let Some(target) = assignment_target(code) {
            out.push(format!("{}{}{} = None", indent, unit, target));
        }
        wrapped.push(i);
    }

    if wrapped.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(out),
        format!(
            "Wrapped {}) conversion in try/except ValueError on {}",
            function,
            line_numbers(&wrapped)
        ),
    ))
}

/// The plain name a statement assigns to, if it is an assignment.
fn assignment_target(code: &str) -> Option<&str> {
    ASSIGNMENT_TARGET
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|target| target.as_str())
}

/// Whether masked `code` calls the builtin `function` (e.g. `int(`), not a
/// method or a longer name ending in it.
fn calls_builtin(code: &str, function: &str) -> bool {
    let bytes = code.as_bytes();
    code.match_indices(function).any(|(start, _)| {
        start == 0 || (!is_identifier_byte(bytes[start - 1]) && bytes[start - 1] != b'.')
    })
}

fn is_inside_try(src: &Source<'_>, i: usize) -> bool {
    src.previous_code_line(i)
        .map(|prev| src.code(prev) == "try:" && src.indent(prev).len() < src.indent(i).len())
        .unwrap_or(false)
}

/// Replace subscript reads of the missing key with `.get(...)`.
pub(crate) fn mapping_lookup(error: &str, src: &Source<'_>) -> Option<Edit> {
    let missing_key = KEY_ERROR.captures(error).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|key| key.as_str().to_string())
    });

    let mut out: Vec<String> = Vec::with_capacity(src.len());
    let mut changed = Vec::new();

    for i in 0..src.len() {
        let line = src.lines[i];
        match rewrite_lookups(src, i, missing_key.as_deref()) {
            Some(rewritten) => {
                out.push(rewritten);
                changed.push(i);
            }
            None => out.push(line.to_string()),
        }
    }

    if changed.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(out),
        format!(
            "Replaced dict[key] with dict.get(key) for safe lookup on {}",
            line_numbers(&changed)
        ),
    ))
}

/// Rewrite `name[<literal>]` reads on line `i`. Assignment targets, `del`
/// statements and augmented assignments keep their subscripts.
///
/// Sequences never get `.get`. A numeric key, or an error that names no
/// key, only rewrites subscripts of names known to hold a mapping.
fn rewrite_lookups(src: &Source<'_>, i: usize, missing_key: Option<&str>) -> Option<String> {
    let line = src.lines[i];
    let masked = src.masked[i].as_str();
    if masked.trim_start().starts_with("del ") {
        return None;
    }

    let bytes = masked.as_bytes();
    let mut out = String::with_capacity(line.len() + 8);
    let mut last = 0;
    let mut changed = false;
    let mut at = 0;

    while at < bytes.len() {
        let subscripts_value =
            at > 0 && (is_identifier_byte(bytes[at - 1]) || bytes[at - 1] == b']' || bytes[at - 1] == b')');
        if bytes[at] != b'[' || !subscripts_value {
            at += 1;
            continue;
        }

        let Some(close) = masked[at..].find(']').map(|offset| at + offset) else {
            break;
        };
        let literal = line[at + 1..close].trim();
        let key_text = literal.trim_matches(|c: char| c == '"' || c == '\'');
        let is_string = literal.len() >= 2
            && (literal.starts_with('"') || literal.starts_with('\''))
            && literal.ends_with(&literal[..1]);
        let is_number = !literal.is_empty() && literal.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit());

        let key_matches = missing_key.map(|key| key == key_text).unwrap_or(true);
        let kind = subscript_base(masked, at).and_then(|base| src.value_kind(base, i));
        let kind_allows = match kind {
            Some(ValueKind::Sequence) => false,
            Some(ValueKind::Mapping) => true,
            None => is_string && missing_key.is_some(),
        };
        let after = masked[close + 1..].trim_start();
        let is_target = (after.starts_with('=') && !after.starts_with("=="))
            || ["+=", "-=", "*=", "/=", "%=", "|=", "&="].iter().any(|op| after.starts_with(op));

        if (is_string || is_number) && key_matches && kind_allows && !is_target {
            out.push_str(&line[last..at]);
            out.push_str(".get(");
            out.push_str(literal);
            out.push(')');
            last = close + 1;
            changed = true;
        }
        at = close + 1;
    }

    if !changed {
        return None;
    }
    out.push_str(&line[last..]);
    Some(out)
}

/// Dotted name being subscripted by the `[` at `open`, if it is a plain name.
fn subscript_base(masked: &str, open: usize) -> Option<&str> {
    let bytes = masked.as_bytes();
    let mut start = open;
    while start > 0 && (is_identifier_byte(bytes[start - 1]) || bytes[start - 1] == b'.') {
        start -= 1;
    }
    let base = &masked[start..open];
    (!base.is_empty() && !base.starts_with(|c: char| c.is_ascii_digit() || c == '.')).then_some(base)
}

/// Give recursive functions without a leading `if` a base case on their
/// first parameter.
pub(crate) fn recursion_base_case(_error: &str, src: &Source<'_>) -> Option<Edit> {
    let mut insertions: Vec<(usize, String, String, &'static str)> = Vec::new();
    let mut functions = Vec::new();

    for i in 0..src.len() {
        let Some(caps) = FUNCTION_HEADER.captures(src.code(i)) else {
            continue;
        };
        let (Some(name), Some(params)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let name = name.as_str();

        let def_indent = src.indent(i).len();
        let body: Vec<usize> = (i + 1..src.len())
            .take_while(|&j| src.is_blank(j) || src.indent(j).len() > def_indent)
            .filter(|&j| !src.is_blank(j))
            .collect();
        let Some(&first) = body.first() else {
            continue;
        };

        let recursive = body.iter().any(|&j| recurses(src.code(j), name));
        if !recursive || src.code(first).starts_with("if ") {
            continue;
        }

        let Some(param) = first_parameter(params.as_str()) else {
            continue;
        };

        let value = base_case_value(src, &body, name);
        insertions.push((first, src.indent(first).to_string(), param, value));
        functions.push(name.to_string());
    }

    if insertions.is_empty() {
        return None;
    }

    let mut out: Vec<String> = Vec::with_capacity(src.len() + insertions.len() * 2);
    let mut pending = insertions.into_iter().peekable();
    for (i, line) in src.lines.iter().enumerate() {
        if let Some((_, indent, param, value)) = pending.next_if(|(at, _, _, _)| *at == i) {
            let unit = indent_unit(&indent);
            out.push(format!("{}if {} is None or {} <= 0:", indent, param, param));
            out.push(format!("{}{}return {}", indent, unit, value));
        }
        out.push(line.to_string());
    }

    Some(Edit::new(
        join_lines(out),
        format!(
            "Added missing base case to recursive function {}",
            functions.join(", ")
        ),
    ))
}

/// Whether `code` calls function `name` directly or as a method on `self`.
fn recurses(code: &str, name: &str) -> bool {
    calls_builtin(code, &format!("{}(", name)) || code.contains(&format!("self.{}(", name))
}

/// Identity of the operator the recursive result is combined with:
/// `1` for products, `0` for sums and differences, otherwise `None`.
fn base_case_value(src: &Source<'_>, body: &[usize], name: &str) -> &'static str {
    let combined: Vec<&str> = body
        .iter()
        .map(|&j| src.code(j))
        .filter(|code| recurses(code, name))
        .collect();

    if combined.iter().any(|code| code.contains('*')) {
        "1"
    } else if combined.iter().any(|code| code.contains(" + ") || code.contains(" - ")) {
        "0"
    } else {
        "None"
    }
}

/// First positional parameter name, skipping `self`/`cls`.
fn first_parameter(params: &str) -> Option<String> {
    params
        .split(',')
        .map(|param| {
            param
                .split([':', '='])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .find(|param| {
            !param.is_empty()
                && param != "self"
                && param != "cls"
                && !param.starts_with('*')
                && param != "/"
        })
}
