//! Layered task environment
//!
//! Each task invocation gets its own [`Environment`] layered on top of the one
//! it was invoked from. Lookups fall through to parent layers, writes only ever
//! touch the current layer.

use crate::env::envfile::load_envfile;
use crate::env::template::apply_envvars_to_template;
use crate::error::EnvironmentResult;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the variable exposing the directory of the config file while
/// config-level env values are templated
pub const CONF_DIR_VAR: &str = "POET_CONF_DIR";

/// A variable value as stored in the environment
///
/// Booleans keep their type until they are exposed to a process or a template,
/// where `true` becomes `"True"` and `false` becomes the empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    Str(String),
    Bool(bool),
}

impl EnvValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EnvValue::Bool(b) => Some(*b),
            EnvValue::Str(_) => None,
        }
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Str(s) => f.write_str(s),
            EnvValue::Bool(true) => f.write_str("True"),
            EnvValue::Bool(false) => Ok(()),
        }
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        EnvValue::Str(value)
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        EnvValue::Str(value.to_string())
    }
}

impl From<bool> for EnvValue {
    fn from(value: bool) -> Self {
        EnvValue::Bool(value)
    }
}

/// A declared env entry from the config: either a value or a default that only
/// applies when the variable is not already set by a lower layer
#[derive(Debug, Clone, PartialEq)]
pub enum EnvEntry {
    Value(String),
    Default(String),
}

/// One scope of variables plus the scope it was derived from
#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<Arc<Environment>>,
    vars: HashMap<String, EnvValue>,
}

impl Environment {
    /// An empty root scope
    pub fn new() -> Self {
        Environment::default()
    }

    /// A root scope holding the variables of the current process
    pub fn from_host() -> Self {
        Environment::from_vars(std::env::vars())
    }

    /// A root scope holding the given variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Environment {
            parent: None,
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), EnvValue::Str(v.into())))
                .collect(),
        }
    }

    /// Derive a child scope that sees everything in `parent` unless shadowed
    pub fn layer(parent: &Arc<Environment>) -> Self {
        Environment {
            parent: Some(Arc::clone(parent)),
            vars: HashMap::new(),
        }
    }

    /// Resolve a variable through all layers
    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        match self.vars.get(key) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.get(key)),
        }
    }

    /// Resolve a variable as it would be exposed to a process
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<EnvValue>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Set a variable only if no layer defines it yet
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<EnvValue>) {
        let key = key.into();
        if !self.contains(&key) {
            self.vars.insert(key, value.into());
        }
    }

    /// Flatten all layers into the string mapping handed to a subprocess
    pub fn to_process_env(&self) -> BTreeMap<String, String> {
        let mut flat = match &self.parent {
            Some(parent) => parent.to_process_env(),
            None => BTreeMap::new(),
        };
        for (key, value) in &self.vars {
            flat.insert(key.clone(), value.to_string());
        }
        flat
    }

    /// A lookup function for template expansion, with booleans stringified
    pub fn reader(&self) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| self.get_str(key)
    }

    /// Template `$VAR` / `${VAR}` references against this environment
    pub fn fill_template(&self, template: &str) -> String {
        apply_envvars_to_template(template, self.reader(), false)
    }

    /// Apply config env entries to this layer in declaration order
    ///
    /// Values are templated against the environment as it stands, with braces
    /// required. When `conf_dir` is given it is visible as `POET_CONF_DIR`
    /// while templating.
    pub fn apply_entries(&mut self, entries: &[(String, EnvEntry)], conf_dir: Option<&Path>) {
        for (key, entry) in entries {
            match entry {
                EnvEntry::Value(template) => {
                    let value = self.template_with_conf_dir(template, conf_dir);
                    self.set(key.clone(), value);
                }
                EnvEntry::Default(template) => {
                    if !self.contains(key) {
                        let value = self.template_with_conf_dir(template, conf_dir);
                        self.set(key.clone(), value);
                    }
                }
            }
        }
    }

    /// Load env files into this layer, later files overriding earlier ones
    ///
    /// Paths are templated and resolved against `base_dir`. Files that do not
    /// exist are skipped and returned so the caller can warn about them.
    pub fn apply_envfiles(
        &mut self,
        paths: &[String],
        base_dir: &Path,
        conf_dir: Option<&Path>,
    ) -> EnvironmentResult<Vec<PathBuf>> {
        let mut missing = Vec::new();

        for raw_path in paths {
            let path = base_dir.join(self.template_with_conf_dir(raw_path, conf_dir));
            match load_envfile(&path)? {
                Some(vars) => {
                    tracing::debug!(path = %path.display(), count = vars.len(), "loaded envfile");
                    for (key, value) in vars {
                        self.set(key, value);
                    }
                }
                None => missing.push(path),
            }
        }

        Ok(missing)
    }

    fn template_with_conf_dir(&self, template: &str, conf_dir: Option<&Path>) -> String {
        let conf_dir = conf_dir.map(|p| p.display().to_string());
        apply_envvars_to_template(
            template,
            |key| match (&conf_dir, key) {
                (Some(dir), CONF_DIR_VAR) => Some(dir.clone()),
                _ => self.get_str(key),
            },
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_bool_values_stringify_at_exposure() {
        let mut env = Environment::new();
        env.set("on", true);
        env.set("off", false);

        assert_eq!(env.get("on"), Some(&EnvValue::Bool(true)));
        assert_eq!(env.get("off").and_then(EnvValue::as_bool), Some(false));

        let flat = env.to_process_env();
        assert_eq!(flat.get("on"), Some(&"True".to_string()));
        assert_eq!(flat.get("off"), Some(&String::new()));
    }

    #[test]
    fn test_layers_shadow_parent() {
        let root = Arc::new(Environment::from_vars([("A", "1"), ("B", "2")]));
        let mut child = Environment::layer(&root);
        child.set("B", "3");
        child.set("C", "4");

        assert_eq!(child.get_str("A"), Some("1".to_string()));
        assert_eq!(child.get_str("B"), Some("3".to_string()));
        assert_eq!(root.get_str("B"), Some("2".to_string()));
        assert!(!root.contains("C"));

        let flat = child.to_process_env();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat["B"], "3");
    }

    #[test]
    fn test_default_entry_only_applies_when_absent() {
        let root = Arc::new(Environment::from_vars([("HOST", "example.com")]));
        let mut env = Environment::layer(&root);
        env.apply_entries(
            &[
                ("HOST".to_string(), EnvEntry::Default("localhost".to_string())),
                ("PORT".to_string(), EnvEntry::Default("8080".to_string())),
                ("URL".to_string(), EnvEntry::Value("${HOST}:${PORT}".to_string())),
            ],
            None,
        );

        assert_eq!(env.get_str("HOST"), Some("example.com".to_string()));
        assert_eq!(env.get_str("URL"), Some("example.com:8080".to_string()));
    }

    #[test]
    fn test_entries_require_braces() {
        let mut env = Environment::from_vars([("NAME", "poet")]);
        env.apply_entries(
            &[("GREETING".to_string(), EnvEntry::Value("$NAME ${NAME}".to_string()))],
            None,
        );
        assert_eq!(env.get_str("GREETING"), Some("$NAME poet".to_string()));
    }

    #[test]
    fn test_conf_dir_only_visible_while_templating() {
        let mut env = Environment::new();
        env.apply_entries(
            &[("DATA".to_string(), EnvEntry::Value("${POET_CONF_DIR}/data".to_string()))],
            Some(Path::new("/project")),
        );
        assert_eq!(env.get_str("DATA"), Some("/project/data".to_string()));
        assert!(!env.contains(CONF_DIR_VAR));
    }

    #[test]
    fn test_envfiles_apply_in_order_and_report_missing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.env"), "X=1\nY=a\n").unwrap();
        fs::write(temp_dir.path().join("b.env"), "Y=b\n").unwrap();

        let mut env = Environment::new();
        let missing = env
            .apply_envfiles(
                &["a.env".to_string(), "nope.env".to_string(), "b.env".to_string()],
                temp_dir.path(),
                None,
            )
            .unwrap();

        assert_eq!(env.get_str("X"), Some("1".to_string()));
        assert_eq!(env.get_str("Y"), Some("b".to_string()));
        assert_eq!(missing, vec![temp_dir.path().join("nope.env")]);
    }

    #[test]
    fn test_fill_template_with_bool() {
        let mut env = Environment::new();
        env.set("flag", true);
        env.set("unset_flag", false);
        assert_eq!(env.fill_template("[$flag] [${unset_flag}]"), "[True] []");
    }
}
