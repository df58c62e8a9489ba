//! Shell-lite expansion for command tasks
//!
//! Command content is parsed once into a small syntax tree, resolved against a
//! variable lookup into words, and finally matched against the filesystem.

pub mod ast;
pub mod glob;
pub mod resolve;

pub use self::ast::{parse as parse_command, Script};
pub use self::glob::{glob_token, GlobPolicy};
pub use self::resolve::{resolve_command_tokens, ResolvedToken};

use crate::error::ExpansionResult;
use std::path::Path;

/// Resolve a template into words without touching the filesystem
pub fn expand_words<F>(template: &str, lookup: F) -> ExpansionResult<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let script = parse_command(template)?;
    Ok(resolve_command_tokens(&script, lookup)
        .into_iter()
        .map(|token| token.value)
        .collect())
}

/// Resolve a template into a single string, words joined by spaces
pub fn expand<F>(template: &str, lookup: F) -> ExpansionResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(expand_words(template, lookup)?.join(" "))
}

/// Resolve a template into argv tokens, expanding globs relative to `cwd`
pub fn expand_and_glob<F>(
    template: &str,
    lookup: F,
    cwd: &Path,
    policy: GlobPolicy,
) -> ExpansionResult<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let script = parse_command(template)?;
    let mut argv = Vec::new();
    for token in resolve_command_tokens(&script, lookup) {
        argv.extend(glob_token(&token, cwd, policy)?);
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::error::ExpansionError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_literals_unchanged() {
        let env = Environment::new();
        for literal in ["echo hello", "cargo build --release", "a-b c_d e.f"] {
            assert_eq!(expand(literal, env.reader()).unwrap(), literal);
        }
    }

    #[test]
    fn test_parameter_operators() {
        let env = Environment::from_vars([("X", "")]);
        assert_eq!(expand("${X:-d}", env.reader()).unwrap(), "d");

        let env = Environment::from_vars([("X", "v")]);
        assert_eq!(expand("${X:+a}", env.reader()).unwrap(), "a");
        assert_eq!(expand("${X:-d}", env.reader()).unwrap(), "v");
    }

    #[test]
    fn test_boolean_false_counts_as_unset() {
        let mut env = Environment::new();
        env.set("flag", false);
        env.set("on", true);
        assert_eq!(expand("${flag:-fallback}", env.reader()).unwrap(), "fallback");
        assert_eq!(expand("${on:-fallback}", env.reader()).unwrap(), "True");
    }

    #[test]
    fn test_escaped_dollar() {
        let env = Environment::from_vars([("HOME", "/home/poet")]);
        assert_eq!(expand_words(r"echo \$HOME", env.reader()).unwrap(), vec!["echo", "$HOME"]);
    }

    #[test]
    fn test_expand_and_glob_policies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("one.py"), "").unwrap();
        let env = Environment::new();

        let argv = expand_and_glob("ls *.py *.md", env.reader(), dir.path(), GlobPolicy::Pass).unwrap();
        assert_eq!(argv, vec!["ls", "one.py", "*.md"]);

        let argv = expand_and_glob("ls *.py *.md", env.reader(), dir.path(), GlobPolicy::Null).unwrap();
        assert_eq!(argv, vec!["ls", "one.py"]);

        let err = expand_and_glob("ls *.md", env.reader(), dir.path(), GlobPolicy::Fail).unwrap_err();
        assert!(matches!(err, ExpansionError::GlobMiss(_)));
    }

    #[test]
    fn test_quoted_glob_not_expanded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("one.py"), "").unwrap();
        let env = Environment::new();
        let argv = expand_and_glob("ls '*.py'", env.reader(), dir.path(), GlobPolicy::Fail).unwrap();
        assert_eq!(argv, vec!["ls", "*.py"]);
    }
}
