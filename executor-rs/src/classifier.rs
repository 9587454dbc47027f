// executor-rs/src/classifier.rs
// Maps interpreter stderr onto the fixed error taxonomy.

use shared_types::ErrorType;

const ERROR_CLASSES: &[(&[&str], ErrorType)] = &[
    (&["SyntaxError", "IndentationError", "TabError"], ErrorType::Syntax),
    (&["ModuleNotFoundError", "ImportError"], ErrorType::Import),
    (&["NameError"], ErrorType::Name),
    (&["TypeError"], ErrorType::Type),
    (&["AttributeError"], ErrorType::Attribute),
    (&["IndexError"], ErrorType::Index),
    (&["KeyError"], ErrorType::Key),
    (&["ValueError"], ErrorType::Value),
];

/// Classify a failure from its stderr.
///
/// The last non-empty line names the exception and becomes the error
/// message. Blank stderr yields `ErrorType::Unknown` with an empty message;
/// an unrecognised exception is `ErrorType::Runtime`.
pub fn classify_stderr(stderr: &str) -> (ErrorType, String) {
    let Some(error_line) = stderr.lines().rev().map(str::trim).find(|line| !line.is_empty()) else {
        return (ErrorType::Unknown, String::new());
    };

    let error_type = ERROR_CLASSES
        .iter()
        .find(|(names, _)| names.iter().any(|name| error_line.contains(name)))
        .map(|(_, error_type)| *error_type)
        .unwrap_or(ErrorType::Runtime);

    (error_type, error_line.to_string())
}
