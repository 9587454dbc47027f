// rule-engine-rs/src/source.rs
// Line-oriented view of Python source with string literals and comments
// masked out, so rules can pattern-match code without tripping over text
// inside literals.
//
// Masking preserves byte offsets: a position found in a masked line is the
// same position in the original line.

/// Keywords that open a block and need a trailing colon.
pub(crate) const HEADER_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "def", "class", "with", "try", "except", "finally",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum MaskState {
    Code,
    Comment,
    Str { quote: u8, triple: bool },
}

/// Replace string-literal contents and comments with spaces.
///
/// Quote characters and newlines are kept so literals stay recognisable
/// and line structure is unchanged.
pub(crate) fn mask_source(code: &str) -> String {
    let bytes = code.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = MaskState::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            MaskState::Code => {
                if b == b'#' {
                    state = MaskState::Comment;
                    out.push(b' ');
                } else if b == b'\'' || b == b'"' {
                    let triple = bytes.get(i + 1) == Some(&b) && bytes.get(i + 2) == Some(&b);
                    let width = if triple { 3 } else { 1 };
                    out.extend(std::iter::repeat(b).take(width));
                    i += width;
                    state = MaskState::Str { quote: b, triple };
                    continue;
                } else {
                    out.push(b);
                }
            }
            MaskState::Comment => {
                if b == b'\n' {
                    state = MaskState::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
            }
            MaskState::Str { quote, triple } => {
                if b == b'\\' {
                    out.push(b' ');
                    if let Some(&next) = bytes.get(i + 1) {
                        out.push(if next == b'\n' { b'\n' } else { b' ' });
                    }
                    i += 2;
                    continue;
                }
                if b == quote {
                    let closes = !triple
                        || (bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote));
                    if closes {
                        let width = if triple { 3 } else { 1 };
                        out.extend(std::iter::repeat(quote).take(width));
                        i += width;
                        state = MaskState::Code;
                        continue;
                    }
                    out.push(b' ');
                } else if b == b'\n' {
                    // Unterminated single-quoted literal ends at the line break.
                    if !triple {
                        state = MaskState::Code;
                    }
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
            }
        }
        i += 1;
    }

    // Every byte inside a literal or comment became ASCII, everything else
    // was copied verbatim, so the result is valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

pub(crate) fn bracket_delta(masked: &str) -> i32 {
    masked.bytes().fold(0, |depth, b| match b {
        b'(' | b'[' | b'{' => depth + 1,
        b')' | b']' | b'}' => depth - 1,
        _ => depth,
    })
}

/// Source split into lines, each paired with its masked counterpart.
pub(crate) struct Source<'a> {
    pub lines: Vec<&'a str>,
    pub masked: Vec<String>,
    depth_before: Vec<i32>,
}

impl<'a> Source<'a> {
    pub fn new(code: &'a str) -> Self {
        let lines: Vec<&str> = code.split('\n').collect();
        let masked: Vec<String> = mask_source(code).split('\n').map(str::to_string).collect();

        let mut depth_before = Vec::with_capacity(masked.len());
        let mut depth = 0;
        for line in &masked {
            depth_before.push(depth);
            depth = (depth + bracket_delta(line)).max(0);
        }

        Self {
            lines,
            masked,
            depth_before,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Leading whitespace of line `i`.
    pub fn indent(&self, i: usize) -> &'a str {
        let line = self.lines[i];
        &line[..line.len() - line.trim_start().len()]
    }

    /// Masked code of line `i` without indentation or trailing comment.
    pub fn code(&self, i: usize) -> &str {
        self.masked[i].trim()
    }

    /// Byte offset where the code of line `i` ends and any trailing
    /// whitespace or comment begins.
    pub fn code_end(&self, i: usize) -> usize {
        self.masked[i].trim_end().len()
    }

    pub fn is_blank(&self, i: usize) -> bool {
        self.code(i).is_empty()
    }

    /// Whether line `i` continues a bracketed or backslash-joined line.
    pub fn is_continuation(&self, i: usize) -> bool {
        self.depth_before[i] > 0 || (i > 0 && self.masked[i - 1].trim_end().ends_with('\\'))
    }

    /// Whether line `i` is a complete single-line statement.
    pub fn is_simple_statement(&self, i: usize) -> bool {
        !self.is_blank(i)
            && !self.is_continuation(i)
            && bracket_delta(&self.masked[i]) == 0
            && !self.code(i).ends_with('\\')
            && header_keyword(self.code(i)).is_none()
            && !self.code(i).starts_with('@')
    }

    /// Index of the nearest non-blank line before `i`.
    pub fn previous_code_line(&self, i: usize) -> Option<usize> {
        (0..i).rev().find(|&j| !self.is_blank(j))
    }

    /// Index of the nearest non-blank line after `i`.
    pub fn next_code_line(&self, i: usize) -> Option<usize> {
        (i + 1..self.len()).find(|&j| !self.is_blank(j))
    }

    /// Kind of value `name` holds at line `before`, judged from its most
    /// recent assignment above that line. `None` when that assignment (or
    /// its absence) does not make the kind evident.
    pub fn value_kind(&self, name: &str, before: usize) -> Option<ValueKind> {
        for j in (0..before.min(self.len())).rev() {
            let Some(rest) = self.code(j).strip_prefix(name) else {
                continue;
            };
            if rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                continue;
            }
            let rest = rest.trim_start();

            if let Some(annotated) = rest.strip_prefix(':') {
                let (annotation, value) = match annotated.split_once('=') {
                    Some((annotation, value)) => (annotation, Some(value)),
                    None => (annotated, None),
                };
                return value
                    .and_then(|value| classify_value(value.trim()))
                    .or_else(|| classify_annotation(annotation.trim()));
            }
            if let Some(value) = rest.strip_prefix('=') {
                if value.starts_with('=') {
                    continue;
                }
                return classify_value(value.trim());
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
    Mapping,
    Sequence,
}

const MAPPING_CONSTRUCTORS: &[&str] = &["dict(", "defaultdict(", "OrderedDict(", "Counter(", "collections."];
const SEQUENCE_CONSTRUCTORS: &[&str] = &["list(", "tuple(", "range(", "sorted(", "str("];

/// Kind of a masked right-hand side, when its syntax gives it away.
fn classify_value(value: &str) -> Option<ValueKind> {
    let unprefixed = value.trim_start_matches(['r', 'b', 'f', 'u', 'R', 'B', 'F', 'U']);
    if value.starts_with('{') {
        // `{1, 2}` is a set; only `{}` and `{k: v}` are mappings.
        let mapping = value == "{}" || value.contains(':');
        return mapping.then_some(ValueKind::Mapping);
    }
    if MAPPING_CONSTRUCTORS.iter().any(|ctor| value.starts_with(ctor)) {
        return Some(ValueKind::Mapping);
    }
    if value.starts_with(['[', '('])
        || unprefixed.starts_with(['\'', '"'])
        || SEQUENCE_CONSTRUCTORS.iter().any(|ctor| value.starts_with(ctor))
        || value.contains(".split(")
    {
        return Some(ValueKind::Sequence);
    }
    None
}

fn classify_annotation(annotation: &str) -> Option<ValueKind> {
    let head = annotation.split('[').next().unwrap_or_default().trim();
    match head {
        "dict" | "Dict" | "Mapping" | "MutableMapping" | "DefaultDict" => Some(ValueKind::Mapping),
        "list" | "List" | "tuple" | "Tuple" | "str" | "Sequence" => Some(ValueKind::Sequence),
        _ => None,
    }
}

/// The block keyword a masked, stripped line starts with, if any.
pub(crate) fn header_keyword(code: &str) -> Option<&'static str> {
    let code = code.strip_prefix("async ").map(str::trim_start).unwrap_or(code);
    HEADER_KEYWORDS.iter().copied().find(|keyword| {
        code.strip_prefix(keyword)
            .map(|rest| rest.is_empty() || rest.starts_with([' ', '\t', '(', ':']))
            .unwrap_or(false)
    })
}

/// Whether a masked line contains a colon outside any brackets.
pub(crate) fn has_top_level_colon(code: &str) -> bool {
    let bytes = code.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) != Some(&b'=') => return true,
            _ => {}
        }
    }
    false
}

/// One extra indentation level matching the style of `indent`.
pub(crate) fn indent_unit(indent: &str) -> &'static str {
    if indent.contains('\t') {
        "\t"
    } else {
        "    "
    }
}

pub(crate) fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Replace whole-word occurrences of `word` that appear in code (not in
/// literals or comments).
pub(crate) fn replace_word_in_code(code: &str, word: &str, replacement: &str) -> String {
    let masked = mask_source(code);
    let masked_bytes = masked.as_bytes();
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for (start, _) in masked.match_indices(word) {
        let end = start + word.len();
        let bounded_left = start == 0 || !is_identifier_byte(masked_bytes[start - 1]);
        let bounded_right = end == masked_bytes.len() || !is_identifier_byte(masked_bytes[end]);
        // Attribute access such as `obj.word` is not the bare name.
        let attribute = start > 0 && masked_bytes[start - 1] == b'.';
        if bounded_left && bounded_right && !attribute {
            out.push_str(&code[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }

    out.push_str(&code[last..]);
    out
}
