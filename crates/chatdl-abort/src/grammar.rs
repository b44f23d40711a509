//! Splits one `--abort-condition` occurrence (a condition group) into
//! its `&`-separated predicate segments (spec.md §4.4 Grammar).

use chatdl_core::Error;

fn parsing_error(detail: impl Into<String>) -> Error {
    Error::Parsing {
        what: "abort-condition group".to_string(),
        detail: detail.into(),
    }
}

/// Splits on unescaped `&`, trimming surrounding whitespace from each
/// segment. `\&` and `\\` are literal escapes; any other char after a
/// backslash is passed through with the backslash kept. The empty
/// string and a trailing backslash are both rejected.
pub fn split_predicates(group_text: &str) -> Result<Vec<String>, Error> {
    if group_text.is_empty() {
        return Err(parsing_error("empty condition group"));
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = group_text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('&') => current.push('&'),
                Some('\\') => current.push('\\'),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => return Err(parsing_error("trailing backslash")),
            },
            '&' => {
                segments.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    segments.push(current.trim().to_string());

    if segments.iter().any(|s| s.is_empty()) {
        return Err(parsing_error("empty predicate segment"));
    }
    Ok(segments)
}
