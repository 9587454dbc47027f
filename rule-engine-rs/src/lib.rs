//! Rule Engine Library
//! Deterministic, pattern-driven repairs for common Python failures.
//!
//! Rules are plain data (a name, the error signatures that trigger it and a
//! transform) tried in a fixed order. The first rule whose transform changes
//! the code wins; "no match" is an ordinary `None`, never an error.

mod rules;
mod source;
mod syntax_check;

pub use syntax_check::{validate_syntax, SyntaxCheck};

use shared_types::{unified_diff, Patch, PatchSource};

use crate::rules::RULES;
use crate::source::Source;

/// Characters of the error message quoted in a patch's error analysis.
const ANALYSIS_PREVIEW_CHARS: usize = 200;

/// A successful rule application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFix {
    pub rule: &'static str,
    pub code: String,
    pub rationale: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Names of the rules in the order they are tried.
    pub fn rule_names(&self) -> Vec<&'static str> {
        RULES.iter().map(|rule| rule.name).collect()
    }

    /// Cheap pre-filter: whether any rule is triggered by this error.
    pub fn can_fix(&self, error_message: &str) -> bool {
        RULES.iter().any(|rule| rule.matches(error_message))
    }

    /// Apply the first rule that matches the error and changes the code.
    pub fn try_fix(&self, error_message: &str, code: &str) -> Option<RuleFix> {
        let source = Source::new(code);

        for rule in RULES.iter().filter(|rule| rule.matches(error_message)) {
            let Some(edit) = (rule.apply)(error_message, &source) else {
                tracing::debug!(rule = rule.name, "rule matched the error but found nothing to change");
                continue;
            };
            if edit.code == code {
                continue;
            }

            metrics::increment_counter!("rule_engine_matches_total", "rule" => rule.name);
            tracing::debug!(rule = rule.name, rationale = %edit.rationale, "rule produced a fix");
            return Some(RuleFix {
                rule: rule.name,
                code: edit.code,
                rationale: edit.rationale,
            });
        }

        None
    }

    /// Try the rules and package a hit as a rule-based patch from `version`.
    pub fn generate_patch(
        &self,
        error_message: &str,
        code: &str,
        version: u32,
    ) -> Option<(Patch, String)> {
        let fix = self.try_fix(error_message, code)?;
        let preview: String = error_message.chars().take(ANALYSIS_PREVIEW_CHARS).collect();

        let patch = Patch::new(
            version,
            PatchSource::RuleBased,
            fix.rationale.clone(),
            unified_diff(code, &fix.code),
        )
        .with_error_analysis(format!("Rule-based analysis: {}", preview))
        .with_fix_strategy(fix.rationale)
        .with_error_category(error_category(error_message));

        Some((patch, fix.code))
    }

    pub fn validate_syntax(&self, code: &str) -> SyntaxCheck {
        validate_syntax(code)
    }
}

/// Coarse category of an error message, used to tag rule patches.
pub fn error_category(error_message: &str) -> &'static str {
    const CATEGORIES: &[(&[&str], &str)] = &[
        (&["SyntaxError", "IndentationError", "TabError"], "syntax"),
        (&["ModuleNotFoundError", "ImportError", "No module named"], "import"),
        (&["NameError", "is not defined"], "name"),
        (&["TypeError"], "type"),
        (&["IndexError"], "index"),
        (&["ValueError", "invalid literal"], "value"),
        (&["RecursionError", "maximum recursion depth"], "recursion"),
        (&["ZeroDivisionError", "AttributeError", "KeyError"], "runtime"),
    ];

    CATEGORIES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| error_message.contains(needle)))
        .map(|(_, category)| *category)
        .unwrap_or("unknown")
}
