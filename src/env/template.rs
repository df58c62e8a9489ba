//! Variable templating for strings
//!
//! Replaces `$VAR` and `${VAR}` references with values from a lookup, the way an
//! unquoted shell word would. A `$` preceded by an odd number of backslashes is
//! escaped: the backslash immediately before it is dropped and the reference is
//! left in place.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static SHELL_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:",
        r"(?:[^\\]|^)(?:\\(?:\\{2})*)\$(?P<esc_naked>[A-Za-z0-9_]+)|",
        r"(?:[^\\]|^)(?:\\(?:\\{2})*)\$\{(?P<esc_paren>[A-Za-z0-9_]+)\}|",
        r"\$(?P<naked>[A-Za-z0-9_]+)|",
        r"\$\{(?P<paren>[A-Za-z0-9_]+)\}",
        r")"
    ))
    .expect("static template pattern")
});

static SHELL_VAR_PATTERN_BRACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:",
        r"(?:[^\\]|^)(?:\\(?:\\{2})*)\$\{(?P<esc_paren>[A-Za-z0-9_]+)\}|",
        r"\$\{(?P<paren>[A-Za-z0-9_]+)\}",
        r")"
    ))
    .expect("static template pattern")
});

/// Template variables from `lookup` into `content`
///
/// Undefined variables expand to the empty string. With `require_braces` only the
/// `${VAR}` form is recognised.
pub fn apply_envvars_to_template<F>(content: &str, lookup: F, require_braces: bool) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = if require_braces {
        &*SHELL_VAR_PATTERN_BRACES
    } else {
        &*SHELL_VAR_PATTERN
    };

    let mut cursor = 0;
    let mut resolved = String::with_capacity(content.len());

    for caps in pattern.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        resolved.push_str(&content[cursor..whole.start()]);
        cursor = whole.end();

        if let Some(var_name) = group(&caps, "paren").or_else(|| group(&caps, "naked")) {
            if let Some(value) = lookup(var_name) {
                resolved.push_str(&value);
            }
        } else {
            // Drop the backslash that escapes the `$`
            let matched = whole.as_str();
            if let Some(rest) = matched.strip_prefix('\\') {
                resolved.push_str(rest);
            } else {
                let mut chars = matched.chars();
                if let Some(first) = chars.next() {
                    resolved.push(first);
                }
                chars.next();
                resolved.push_str(chars.as_str());
            }
        }
    }

    resolved.push_str(&content[cursor..]);
    resolved
}

fn group<'a>(caps: &Captures<'a>, name: &str) -> Option<&'a str> {
    caps.name(name).map(|m| m.as_str())
}
