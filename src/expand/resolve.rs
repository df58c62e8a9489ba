//! Turning a parsed command into argument tokens
//!
//! Parameters are substituted from a lookup. An unquoted parameter value is
//! split on whitespace and may contribute glob patterns; quoted values are kept
//! as a single word and never globbed.

use crate::expand::ast::{Element, ParamExpansion, ParamOperator, Script, Segment};
use regex::Regex;
use std::sync::LazyLock;

static GLOB_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?*]|\[!?\]?[^\]]*\]").expect("static glob pattern"));

/// A command word after parameter substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    /// The word as written, with substitutions applied
    pub value: String,

    /// Set when the word contains an active glob. Literal parts of the word
    /// are escaped so only the active parts match as patterns.
    pub pattern: Option<String>,
}

type Parts = Vec<(String, bool)>;

enum ParamResult {
    Value(String),
    /// The argument of a `:-` or `:+` operation, as (text, quoted) pairs
    Parts(Vec<(String, bool)>),
}

fn finalize(parts: &mut Parts) -> ResolvedToken {
    let includes_glob = parts.iter().any(|(_, glob)| *glob);
    let value: String = parts.iter().map(|(text, _)| text.as_str()).collect();
    let pattern = includes_glob.then(|| {
        parts
            .iter()
            .map(|(text, glob)| {
                if *glob {
                    text.clone()
                } else {
                    glob::Pattern::escape(text)
                }
            })
            .collect()
    });
    parts.clear();
    ResolvedToken { value, pattern }
}

fn is_space(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_whitespace)
}

/// Split an unquoted value into words, continuing the current token with the
/// first word unless the value starts with whitespace
fn split_into(value: &str, parts: &mut Parts, tokens: &mut Vec<ResolvedToken>) {
    if value.starts_with(char::is_whitespace) && !parts.is_empty() {
        tokens.push(finalize(parts));
    }

    for (index, word) in value.split_whitespace().enumerate() {
        if index > 0 && !parts.is_empty() {
            tokens.push(finalize(parts));
        }
        parts.push((word.to_string(), GLOB_PATTERN.is_match(word)));
    }

    if value.ends_with(char::is_whitespace) && !parts.is_empty() {
        tokens.push(finalize(parts));
    }
}

fn resolve_param<F>(param: &ParamExpansion, lookup: &F) -> ParamResult
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(&param.name).unwrap_or_default();

    if let Some(operation) = &param.operation {
        let applies = match operation.operator {
            ParamOperator::Alternate => !value.is_empty(),
            ParamOperator::Default => value.is_empty(),
        };
        if applies {
            return ParamResult::Parts(resolve_argument(&operation.argument, lookup));
        }
    }

    ParamResult::Value(value)
}

fn resolve_argument<F>(segments: &[Segment], lookup: &F) -> Vec<(String, bool)>
where
    F: Fn(&str) -> Option<String>,
{
    segments
        .iter()
        .map(|segment| {
            let text: String = segment
                .elements
                .iter()
                .map(|element| match element {
                    Element::Param(param) => match resolve_param(param, lookup) {
                        ParamResult::Value(value) => value,
                        ParamResult::Parts(parts) => {
                            parts.into_iter().map(|(text, _)| text).collect()
                        }
                    },
                    Element::Text(text) | Element::Glob(text) => text.clone(),
                })
                .collect();
            (text, segment.is_quoted())
        })
        .collect()
}

/// Resolve every word of a parsed command against `lookup`
///
/// Undefined parameters are empty. A word that resolves to nothing at all
/// (e.g. an empty unquoted parameter) produces no token, while an explicitly
/// quoted empty string does.
pub fn resolve_command_tokens<F>(script: &Script, lookup: F) -> Vec<ResolvedToken>
where
    F: Fn(&str) -> Option<String>,
{
    let mut tokens = Vec::new();

    for line in &script.lines {
        for word in &line.words {
            let mut parts: Parts = Vec::new();

            for segment in &word.segments {
                for element in &segment.elements {
                    match element {
                        Element::Text(text) => parts.push((text.clone(), false)),
                        Element::Glob(glob) => parts.push((glob.clone(), true)),
                        Element::Param(param) => match resolve_param(param, &lookup) {
                            ParamResult::Value(value) => {
                                if value.is_empty() {
                                    continue;
                                }
                                if segment.is_quoted() {
                                    parts.push((value, false));
                                } else if is_space(&value) {
                                    parts.push((" ".to_string(), false));
                                } else {
                                    split_into(&value, &mut parts, &mut tokens);
                                }
                            }
                            ParamResult::Parts(result) => {
                                if result.iter().all(|(text, _)| text.is_empty()) {
                                    continue;
                                }
                                if segment.is_quoted() {
                                    let joined = result.into_iter().map(|(text, _)| text).collect();
                                    parts.push((joined, false));
                                    continue;
                                }
                                for (text, quoted) in result {
                                    if text.is_empty() {
                                        continue;
                                    }
                                    if quoted {
                                        parts.push((text, false));
                                    } else if is_space(&text) {
                                        if !parts.is_empty() {
                                            tokens.push(finalize(&mut parts));
                                        }
                                    } else {
                                        split_into(&text, &mut parts, &mut tokens);
                                    }
                                }
                            }
                        },
                    }
                }
            }

            if !parts.is_empty() {
                tokens.push(finalize(&mut parts));
            }
        }
    }

    tokens
}
