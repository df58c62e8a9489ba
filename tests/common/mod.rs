//! Common test utilities

#![allow(dead_code)]

use poet::config::load_catalog;
use poet::env::Environment;
use poet::{Engine, RunOverrides};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory with a poet.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("poet.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Create a test config with an empty subdirectory next to it
pub fn create_test_config_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let (temp_dir, config_path) = create_test_config(content);
    let sub_dir = temp_dir.path().join("subdir");
    fs::create_dir(&sub_dir).unwrap();
    (temp_dir, config_path, sub_dir)
}

/// An engine over `content` whose host environment is only `PATH` plus `vars`
pub fn engine_with_env(content: &str, vars: &[(&str, &str)]) -> (TempDir, Engine) {
    let (temp_dir, config_path) = create_test_config(content);
    let catalog = load_catalog(&config_path).unwrap();

    let mut host: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if let Ok(path) = std::env::var("PATH") {
        host.push(("PATH".to_string(), path));
    }
    let engine = Engine::new(catalog).with_host_env(Environment::from_vars(host));
    (temp_dir, engine)
}

pub fn engine(content: &str) -> (TempDir, Engine) {
    engine_with_env(content, &[])
}

/// Overrides that keep action lines off stderr
pub fn quiet() -> RunOverrides {
    RunOverrides {
        verbosity_delta: -1,
        ..RunOverrides::default()
    }
}

pub fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
