//! `%d`-parameterized pattern matching for request and DB names.
//!
//! A pattern is either a literal or contains exactly one `%d` placeholder
//! matching a decimal integer ("lachesis-%d" matches "lachesis-7"). The
//! captured value can be substituted back into a route's name and table.

use crate::core::error::{Result, StrataError};

/// Check that `pattern` is a literal or contains exactly one `%d`.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    let mut rest = pattern;
    let mut placeholders = 0;
    while let Some(idx) = rest.find('%') {
        if rest[idx + 1..].starts_with('d') {
            placeholders += 1;
            rest = &rest[idx + 2..];
        } else {
            return Err(StrataError::config(format!(
                "pattern {:?} contains an unsupported % verb; only %d is allowed",
                pattern
            )));
        }
    }
    if placeholders > 1 {
        return Err(StrataError::config(format!(
            "pattern {:?} contains more than one %d placeholder",
            pattern
        )));
    }
    Ok(())
}

/// Match `input` against a `%d` pattern, returning the captured integer.
///
/// A literal pattern matches only itself (capturing nothing is represented
/// as `None`; use string equality for literals instead).
pub fn match_pattern(pattern: &str, input: &str) -> Option<u64> {
    let (head, tail) = pattern.split_once("%d")?;
    let middle = input.strip_prefix(head)?.strip_suffix(tail)?;
    if middle.is_empty() || !middle.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    middle.parse().ok()
}

/// Substitute a captured integer into every `%d` of `template`.
pub fn render(template: &str, value: u64) -> String {
    template.replace("%d", &value.to_string())
}
