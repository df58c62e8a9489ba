//! Filesystem glob expansion of resolved command tokens

use crate::error::{ExpansionError, ExpansionResult};
use crate::expand::resolve::ResolvedToken;
use glob::MatchOptions;
use std::path::Path;

/// What to do with a glob pattern that matches nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlobPolicy {
    /// Keep the pattern as a literal argument
    #[default]
    Pass,
    /// Drop the argument
    Null,
    /// Fail the task
    Fail,
}

impl GlobPolicy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pass" => Some(GlobPolicy::Pass),
            "null" => Some(GlobPolicy::Null),
            "fail" => Some(GlobPolicy::Fail),
            _ => None,
        }
    }
}

/// Expand a token against the filesystem relative to `cwd`
///
/// Tokens without an active glob come back unchanged. Matches are sorted and,
/// for relative patterns, reported relative to `cwd`.
pub fn glob_token(
    token: &ResolvedToken,
    cwd: &Path,
    policy: GlobPolicy,
) -> ExpansionResult<Vec<String>> {
    let Some(pattern) = &token.pattern else {
        return Ok(vec![token.value.clone()]);
    };

    let relative = !Path::new(pattern).is_absolute();
    let full_pattern = if relative {
        let base = glob::Pattern::escape(&cwd.to_string_lossy());
        format!("{}/{}", base.trim_end_matches(['/', '\\']), pattern)
    } else {
        pattern.clone()
    };

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let paths = glob::glob_with(&full_pattern, options).map_err(|e| {
        ExpansionError::InvalidPattern {
            pattern: token.value.clone(),
            error: e.to_string(),
        }
    })?;

    let mut matches: Vec<String> = paths
        .filter_map(Result::ok)
        .map(|path| {
            if relative {
                path.strip_prefix(cwd)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| path.to_string_lossy().into_owned())
            } else {
                path.to_string_lossy().into_owned()
            }
        })
        .collect();
    matches.sort();

    if !matches.is_empty() {
        return Ok(matches);
    }

    tracing::debug!(pattern = %token.value, ?policy, "glob matched nothing");
    match policy {
        GlobPolicy::Pass => Ok(vec![token.value.clone()]),
        GlobPolicy::Null => Ok(Vec::new()),
        GlobPolicy::Fail => Err(ExpansionError::GlobMiss(token.value.clone())),
    }
}
