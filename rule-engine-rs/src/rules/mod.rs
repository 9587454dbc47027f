// rule-engine-rs/src/rules/mod.rs
// The ordered rule table and the helpers rules share.

mod guards;
mod syntax;
mod types;

use crate::source::Source;

/// Rewritten source plus a human-readable account of the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub code: String,
    pub rationale: String,
}

impl Edit {
    pub fn new(code: String, rationale: String) -> Self {
        Self { code, rationale }
    }
}

pub(crate) fn join_lines(lines: Vec<String>) -> String {
    lines.join("\n")
}

/// "line 3" or "lines 2, 5" for zero-based indices.
pub(crate) fn line_numbers(indices: &[usize]) -> String {
    let numbers: Vec<String> = indices.iter().map(|i| (i + 1).to_string()).collect();
    if numbers.len() == 1 {
        format!("line {}", numbers[0])
    } else {
        format!("lines {}", numbers.join(", "))
    }
}

type RuleFn = fn(&str, &Source<'_>) -> Option<Edit>;

/// A repair triggered when the error text contains any of its signatures.
pub(crate) struct Rule {
    pub name: &'static str,
    pub signatures: &'static [&'static str],
    pub apply: RuleFn,
}

impl Rule {
    pub fn matches(&self, error: &str) -> bool {
        self.signatures.iter().any(|signature| error.contains(signature))
    }
}

/// Rules in priority order. The first rule that changes the code wins.
pub(crate) const RULES: &[Rule] = &[
    Rule {
        name: "print_statement",
        signatures: &["SyntaxError", "Missing parentheses in call to 'print'"],
        apply: syntax::print_statement,
    },
    Rule {
        name: "missing_colon",
        signatures: &["expected ':'", "invalid syntax"],
        apply: syntax::missing_colon,
    },
    Rule {
        name: "indentation",
        signatures: &["IndentationError", "expected an indented block", "unexpected indent"],
        apply: syntax::indentation,
    },
    Rule {
        name: "name_typo",
        signatures: &["is not defined"],
        apply: syntax::name_typo,
    },
    Rule {
        name: "keyword_typo",
        signatures: &["SyntaxError", "is not defined"],
        apply: syntax::keyword_typo,
    },
    Rule {
        name: "import_alias",
        signatures: &["No module named"],
        apply: syntax::import_alias,
    },
    Rule {
        name: "zero_division",
        signatures: &["ZeroDivisionError"],
        apply: guards::zero_division,
    },
    Rule {
        name: "index_bounds",
        signatures: &["IndexError"],
        apply: guards::index_bounds,
    },
    Rule {
        name: "numeric_conversion",
        signatures: &["invalid literal for int()", "could not convert string to float"],
        apply: guards::numeric_conversion,
    },
    Rule {
        name: "mapping_lookup",
        signatures: &["KeyError"],
        apply: guards::mapping_lookup,
    },
    Rule {
        name: "recursion_base_case",
        signatures: &["RecursionError", "maximum recursion depth"],
        apply: guards::recursion_base_case,
    },
    Rule {
        name: "string_concat",
        signatures: &["can only concatenate str", "unsupported operand type(s) for +"],
        apply: types::string_concat,
    },
    Rule {
        name: "sequence_repeat",
        signatures: &["can't multiply sequence by non-int of type 'float'"],
        apply: types::sequence_repeat,
    },
    Rule {
        name: "tuple_append",
        signatures: &["'tuple' object has no attribute 'append'"],
        apply: types::tuple_append,
    },
];
