// rule-engine-rs/src/syntax_check.rs
// Fast syntax-validity pre-check backed by a tree-sitter Python grammar.

use std::cell::RefCell;

use tree_sitter::{Node, Parser};

thread_local! {
    static PYTHON_PARSER: RefCell<Result<Parser, String>> = RefCell::new(python_parser());
}

/// A grammar the linked tree-sitter cannot load makes every check fail.
fn python_parser() -> Result<Parser, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|err| {
            tracing::warn!(error = %err, "tree-sitter rejected the python grammar");
            format!("python grammar unavailable: {}", err)
        })?;
    Ok(parser)
}

/// Result of parsing a piece of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxCheck {
    pub valid: bool,
    pub diagnostic: Option<String>,
}

impl SyntaxCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            diagnostic: None,
        }
    }

    fn invalid(diagnostic: impl Into<String>) -> Self {
        Self {
            valid: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Parse `code` and report whether it is syntactically valid Python.
///
/// The diagnostic names the first error or missing token with a 1-based
/// line and column.
pub fn validate_syntax(code: &str) -> SyntaxCheck {
    PYTHON_PARSER.with(|parser| match parser.borrow_mut().as_mut() {
        Ok(parser) => check_with(parser, code),
        Err(reason) => SyntaxCheck::invalid(reason.clone()),
    })
}

fn check_with(parser: &mut Parser, code: &str) -> SyntaxCheck {
    let Some(tree) = parser.parse(code, None) else {
        return SyntaxCheck::invalid("parser could not process the source");
    };

    let root = tree.root_node();
    if !root.has_error() {
        return SyntaxCheck::ok();
    }

    match first_problem(root) {
        Some(node) => {
            let position = node.start_position();
            let what = if node.is_missing() {
                format!("missing '{}'", node.kind())
            } else {
                "invalid syntax".to_string()
            };
            SyntaxCheck::invalid(format!(
                "{} at line {}, column {}",
                what,
                position.row + 1,
                position.column + 1
            ))
        }
        None => SyntaxCheck::invalid("invalid syntax"),
    }
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_problem(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_problem)
}
