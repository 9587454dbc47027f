// rule-engine-rs/src/rules/syntax.rs
// Rules that repair code the interpreter refuses to compile or that
// references names which cannot resolve.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{join_lines, line_numbers, Edit};
use crate::source::{
    bracket_delta, has_top_level_colon, header_keyword, indent_unit, replace_word_in_code, Source,
};

static UNDEFINED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"name '([A-Za-z_][A-Za-z0-9_]*)' is not defined")
        .expect("undefined-name pattern must compile")
});

static MISSING_MODULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"No module named '([A-Za-z_][A-Za-z0-9_.]*)'").expect("missing-module pattern must compile")
});

/// Misspelled builtin constants and functions.
const NAME_TYPOS: &[(&str, &str)] = &[
    ("ture", "True"),
    ("Ture", "True"),
    ("true", "True"),
    ("fasle", "False"),
    ("flase", "False"),
    ("Flase", "False"),
    ("false", "False"),
    ("none", "None"),
    ("null", "None"),
    ("lenght", "len"),
];

/// Misspelled keywords and the print builtin.
const KEYWORD_TYPOS: &[(&str, &str)] = &[
    ("pirnt", "print"),
    ("prnit", "print"),
    ("retrun", "return"),
    ("improt", "import"),
    ("whiel", "while"),
];

/// Module names that are really aliases or misspellings.
const MODULE_CORRECTIONS: &[(&str, &str)] = &[
    ("np", "numpy"),
    ("pd", "pandas"),
    ("plt", "matplotlib.pyplot"),
    ("sns", "seaborn"),
    ("tf", "tensorflow"),
    ("panda", "pandas"),
    ("Numpy", "numpy"),
    ("maths", "math"),
];

/// `print x` becomes `print(x)`.
pub(crate) fn print_statement(_error: &str, src: &Source<'_>) -> Option<Edit> {
    let mut lines: Vec<String> = src.lines.iter().map(|line| line.to_string()).collect();
    let mut changed = Vec::new();

    for i in 0..src.len() {
        if src.is_continuation(i) {
            continue;
        }
        let code = src.code(i);
        let Some(rest) = code.strip_prefix("print") else {
            continue;
        };

        let line = src.lines[i];
        let indent_len = src.indent(i).len();
        let code_end = src.code_end(i);

        // A bare `print` is a valid expression statement; only `print <expr>` is broken.
        if !rest.starts_with([' ', '\t']) {
            continue;
        }
        let args = rest.trim_start();
        if args.is_empty() || args.starts_with(['(', '=', '.', ',', '[', ')', '>']) {
            continue;
        }
        let args_start = indent_len + "print".len() + (rest.len() - args.len());
        let replacement = format!(
            "{}print({}){}",
            &line[..indent_len],
            &line[args_start..code_end],
            &line[code_end..]
        );

        lines[i] = replacement;
        changed.push(i);
    }

    if changed.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(lines),
        format!(
            "Converted Python 2 print statement to a print() call on {}",
            line_numbers(&changed)
        ),
    ))
}

/// Append the colon a block header is missing.
pub(crate) fn missing_colon(_error: &str, src: &Source<'_>) -> Option<Edit> {
    let mut lines: Vec<String> = src.lines.iter().map(|line| line.to_string()).collect();
    let mut changed = Vec::new();

    for i in 0..src.len() {
        if src.is_continuation(i) {
            continue;
        }
        let code = src.code(i);
        let Some(keyword) = header_keyword(code) else {
            continue;
        };
        if code.ends_with(':')
            || code.ends_with('\\')
            || has_top_level_colon(code)
            || bracket_delta(&src.masked[i]) != 0
        {
            continue;
        }

        let well_formed = match keyword {
            "else" | "try" | "finally" => code == keyword,
            "except" => true,
            "def" => code.ends_with(')') || code.contains("->"),
            _ => code.len() > keyword.len(),
        };
        if !well_formed {
            continue;
        }

        let line = src.lines[i];
        let code_end = src.code_end(i);
        lines[i] = format!("{}:{}", &line[..code_end], &line[code_end..]);
        changed.push(i);
    }

    if changed.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(lines),
        format!(
            "Added missing colon after control-flow header on {}",
            line_numbers(&changed)
        ),
    ))
}

/// Indent the first statement of an empty block, or pull an unexpectedly
/// indented run of lines back to the enclosing level.
pub(crate) fn indentation(error: &str, src: &Source<'_>) -> Option<Edit> {
    if error.contains("unexpected indent") {
        return dedent_unexpected(src);
    }

    let mut lines: Vec<String> = src.lines.iter().map(|line| line.to_string()).collect();
    let mut changed = Vec::new();
    let mut appended_pass = false;

    for i in 0..src.len() {
        if src.is_continuation(i) || !src.code(i).ends_with(':') || header_keyword(src.code(i)).is_none() {
            continue;
        }
        let opener_indent = src.indent(i);
        let body_indent = format!("{}{}", opener_indent, indent_unit(opener_indent));

        match src.next_code_line(i) {
            Some(j) if src.indent(j).len() <= opener_indent.len() => {
                let line = src.lines[j];
                lines[j] = format!("{}{}", body_indent, line.trim_start());
                changed.push(j);
            }
            Some(_) => {}
            None => {
                // Block opener on the last line: give it an empty body.
                let pass_line = format!("{}pass", body_indent);
                match lines.last() {
                    Some(last) if last.trim().is_empty() => {
                        let at = lines.len() - 1;
                        lines.insert(at, pass_line);
                    }
                    _ => lines.push(pass_line),
                }
                appended_pass = true;
                changed.push(i);
            }
        }
    }

    if changed.is_empty() {
        return None;
    }
    let rationale = if appended_pass {
        "Added an indented body to an empty block".to_string()
    } else {
        format!(
            "Indented the first statement of the block on {}",
            line_numbers(&changed)
        )
    };
    Some(Edit::new(join_lines(lines), rationale))
}

fn dedent_unexpected(src: &Source<'_>) -> Option<Edit> {
    let offending = (0..src.len()).find(|&i| {
        if src.is_blank(i) || src.is_continuation(i) {
            return false;
        }
        match src.previous_code_line(i) {
            Some(prev) => {
                !src.code(prev).ends_with(':')
                    && !src.code(prev).ends_with('\\')
                    && src.indent(i).len() > src.indent(prev).len()
            }
            None => !src.indent(i).is_empty(),
        }
    })?;

    let target = src
        .previous_code_line(offending)
        .map(|prev| src.indent(prev))
        .unwrap_or("");
    let bad = src.indent(offending);

    let mut lines: Vec<String> = src.lines.iter().map(|line| line.to_string()).collect();
    let mut j = offending;
    while j < src.len() && (src.is_blank(j) || src.lines[j].starts_with(bad)) {
        if !src.is_blank(j) {
            lines[j] = format!("{}{}", target, &src.lines[j][bad.len()..]);
        }
        j += 1;
    }

    Some(Edit::new(
        join_lines(lines),
        format!("Removed unexpected indentation starting on line {}", offending + 1),
    ))
}

/// Replace the undefined name from the error when it is a known typo.
pub(crate) fn name_typo(error: &str, src: &Source<'_>) -> Option<Edit> {
    let name = UNDEFINED_NAME.captures(error)?.get(1)?.as_str();
    let (typo, correction) = NAME_TYPOS.iter().find(|(typo, _)| *typo == name)?;

    let code = join_lines(src.lines.iter().map(|line| line.to_string()).collect());
    Some(Edit::new(
        replace_word_in_code(&code, typo, correction),
        format!("Fixed typo: changed '{}' to '{}'", typo, correction),
    ))
}

/// Correct misspelled keywords. A NameError narrows the fix to the
/// reported name; a SyntaxError fixes every known misspelling.
pub(crate) fn keyword_typo(error: &str, src: &Source<'_>) -> Option<Edit> {
    let reported = UNDEFINED_NAME
        .captures(error)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str());

    let mut code = join_lines(src.lines.iter().map(|line| line.to_string()).collect());
    let mut changes = Vec::new();

    for (typo, correction) in KEYWORD_TYPOS {
        if reported.is_some_and(|name| name != *typo) {
            continue;
        }
        let fixed = replace_word_in_code(&code, typo, correction);
        if fixed != code {
            changes.push(format!("'{}' -> '{}'", typo, correction));
            code = fixed;
        }
    }

    if changes.is_empty() {
        return None;
    }
    Some(Edit::new(code, format!("Fixed typos: {}", changes.join(", "))))
}

/// Rewrite imports of a module alias or misspelling to the real module,
/// keeping the name the rest of the code uses.
pub(crate) fn import_alias(error: &str, src: &Source<'_>) -> Option<Edit> {
    let module = MISSING_MODULE.captures(error)?.get(1)?.as_str();
    let (wrong, right) = MODULE_CORRECTIONS.iter().find(|(wrong, _)| *wrong == module)?;

    let mut lines: Vec<String> = src.lines.iter().map(|line| line.to_string()).collect();
    let mut changed = Vec::new();

    for i in 0..src.len() {
        if src.is_continuation(i) {
            continue;
        }
        let code = src.code(i);
        let tokens: Vec<&str> = code.split_whitespace().collect();
        let keyword = match tokens.as_slice() {
            ["import", m] if m == wrong => "import",
            ["import", m, "as", _] if m == wrong => "import",
            ["from", m, "import", ..] if m == wrong => "from",
            _ => continue,
        };

        let line = src.lines[i];
        let after_keyword = &code[keyword.len()..];
        let module_start =
            src.indent(i).len() + keyword.len() + (after_keyword.len() - after_keyword.trim_start().len());
        let module_end = module_start + wrong.len();

        let alias = if tokens.len() == 2 {
            format!(" as {}", wrong)
        } else {
            String::new()
        };
        lines[i] = format!(
            "{}{}{}{}",
            &line[..module_start],
            right,
            alias,
            &line[module_end..]
        );
        changed.push(i);
    }

    if changed.is_empty() {
        return None;
    }
    Some(Edit::new(
        join_lines(lines),
        format!("Fixed import: '{}' is provided by module '{}'", wrong, right),
    ))
}
