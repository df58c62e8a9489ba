//! Env file loading

use crate::error::{EnvironmentError, EnvironmentResult};
use std::path::Path;

/// Load the assignments declared in an env file, in file order
///
/// Returns `Ok(None)` when the file does not exist so the caller can decide how
/// loudly to complain. A file that exists but cannot be parsed is an error.
pub fn load_envfile(path: &Path) -> EnvironmentResult<Option<Vec<(String, String)>>> {
    if !path.is_file() {
        return Ok(None);
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| EnvironmentError::Parse {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut vars = Vec::new();
    for item in iter {
        let (key, value) = item.map_err(|e| EnvironmentError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        vars.push((key, value));
    }

    Ok(Some(vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_envfile() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(
            &path,
            "# comment\nexport FOO=bar\nQUOTED=\"hello world\"\nSINGLE='a b'\n",
        )
        .unwrap();

        let vars = load_envfile(&path).unwrap().unwrap();
        assert_eq!(
            vars,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("QUOTED".to_string(), "hello world".to_string()),
                ("SINGLE".to_string(), "a b".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_envfile_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_envfile(&temp_dir.path().join("missing.env")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unparsable_envfile_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.env");
        fs::write(&path, "FOO=\"unterminated\n").unwrap();

        let result = load_envfile(&path);
        assert!(matches!(result, Err(EnvironmentError::Parse { .. })));
    }
}
