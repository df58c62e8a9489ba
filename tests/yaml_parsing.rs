//! Integration tests for YAML parsing

mod common;

use common::{create_test_config, create_test_config_in_subdir};
use poet::config::{find_config_file_from, load_catalog, parse_catalog};
use poet::env::EnvEntry;
use poet::error::{ConfigError, PoetError};
use poet::runner::task::{IgnoreFail, SwitchDefault};
use poet::runner::{ExecutorKind, TaskKind, TaskType};
use std::fs;
use std::path::Path;

fn config_error(yaml: &str) -> ConfigError {
    match parse_catalog(yaml, Path::new("."), None) {
        Err(PoetError::Config(e)) => e,
        Err(other) => panic!("expected a config error, got {}", other),
        Ok(_) => panic!("expected a config error"),
    }
}

#[test]
fn test_parse_complete_config() {
    let yaml = r#"
env:
  STAGE: dev
  REGION: {default: eu}
envfile: [.env, local.env]
shell_interpreter: bash
verbosity: -1
executor:
  type: virtualenv
  location: venv

tasks:
  build:
    help: Build the project
    cmd: cargo build --release
    env:
      RUSTFLAGS: -Dwarnings

  test:
    help: Run tests
    shell: cargo test && cargo clippy
    interpreter: [zsh, posix]

  release:
    help: Build and test
    sequence: [build, test]
    ignore_fail: return_non_zero

  _helper: echo hidden
"#;
    let (_dir, path) = create_test_config(yaml);
    let catalog = load_catalog(&path).unwrap();

    assert_eq!(catalog.root, path.parent().unwrap());
    assert_eq!(catalog.config_path.as_deref(), Some(path.as_path()));
    assert_eq!(catalog.tasks().len(), 4);
    assert_eq!(catalog.visible().count(), 3);

    let global = &catalog.global;
    assert_eq!(global.env[0], ("STAGE".to_string(), EnvEntry::Value("dev".to_string())));
    assert_eq!(global.env[1], ("REGION".to_string(), EnvEntry::Default("eu".to_string())));
    assert_eq!(global.envfile, vec![".env", "local.env"]);
    assert_eq!(global.shell_interpreter, vec!["bash"]);
    assert_eq!(global.verbosity, -1);
    assert_eq!(
        global.executor,
        ExecutorKind::Virtualenv {
            location: Some("venv".to_string())
        }
    );

    let build = catalog.get("build").unwrap();
    assert_eq!(build.task_type(), TaskType::Cmd);
    assert_eq!(build.help(), Some("Build the project"));

    match &catalog.get("test").unwrap().kind {
        TaskKind::Shell(shell) => {
            assert_eq!(shell.interpreter, Some(vec!["zsh".to_string(), "posix".to_string()]))
        }
        other => panic!("unexpected kind {:?}", other),
    }

    let release = catalog.get("release").unwrap();
    assert_eq!(release.options.ignore_fail, IgnoreFail::ReturnNonZero);
    assert!(catalog.get("_helper").unwrap().hidden);
}

#[test]
fn test_every_task_kind() {
    let yaml = r#"
tasks:
  a: {cmd: echo a}
  b: {shell: echo b}
  c: {script: "poet:echo('c')"}
  d: {sequence: [a, b]}
  e: {parallel: [a, b]}
  f: {expr: "1 + 1"}
  g:
    control: {expr: "'x'"}
    default: pass
    switch:
      - {case: x, ref: a}
  h: {ref: a}
"#;
    let catalog = parse_catalog(yaml, Path::new("."), None).unwrap();
    let kinds: Vec<TaskType> = catalog.tasks().iter().map(|t| t.task_type()).collect();
    assert_eq!(kinds, TaskType::ALL.to_vec());

    match &catalog.get("g").unwrap().kind {
        TaskKind::Switch(switch) => {
            assert_eq!(switch.default, SwitchDefault::Pass);
            assert_eq!(switch.control.name, "g[control]");
            assert_eq!(switch.cases[0].values, vec!["x"]);
        }
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_find_config_from_subdir() {
    let (_dir, path, sub_dir) = create_test_config_in_subdir("tasks:\n  a: echo a\n");
    let found = find_config_file_from(sub_dir).unwrap();
    assert_eq!(found, path);
}

#[test]
fn test_yaml_extension_is_found() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("poet.yaml");
    fs::write(&path, "tasks:\n  a: echo a\n").unwrap();
    assert_eq!(find_config_file_from(dir.path().to_path_buf()).unwrap(), path);
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = find_config_file_from(dir.path().to_path_buf());
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_invalid_yaml() {
    let result = parse_catalog("tasks: [unclosed", Path::new("."), None);
    assert!(result.is_err());
}

#[test]
fn test_conflicting_content_keys() {
    let err = config_error("tasks:\n  a: {cmd: echo, shell: echo}\n");
    assert!(matches!(err, ConfigError::InvalidTask { .. }));

    let err = config_error("tasks:\n  a: {help: nothing to run}\n");
    assert!(matches!(err, ConfigError::InvalidTask { .. }));
}

#[test]
fn test_unknown_keys_rejected() {
    assert!(parse_catalog("tasks:\n  a: {cmd: echo, colour: red}\n", Path::new("."), None).is_err());
    assert!(parse_catalog("bogus: 1\ntasks: {}\n", Path::new("."), None).is_err());
}

#[test]
fn test_kind_specific_options_checked() {
    let err = config_error("tasks:\n  a: {shell: echo, empty_glob: fail}\n");
    assert!(err.to_string().contains("empty_glob"));

    let err = config_error("tasks:\n  a: {cmd: echo, use_exec: true, capture_stdout: out.txt}\n");
    assert!(err.to_string().contains("use_exec"));

    let err = config_error("tasks:\n  a: {sequence: [b], ignore_fail: [1]}\n  b: echo\n");
    assert!(err.to_string().contains("ignore_fail"));
}

#[test]
fn test_invalid_expression_rejected_at_load() {
    let err = config_error("tasks:\n  a: {expr: \"1 +\"}\n");
    assert!(matches!(err, ConfigError::InvalidTask { .. }));

    let err = config_error("tasks:\n  a: {expr: \"os.name\"}\n");
    assert!(err.to_string().contains("os"));
}

#[test]
fn test_static_cycle_rejected() {
    let err = config_error("tasks:\n  a: {ref: b}\n  b: {cmd: echo, uses: {X: a}}\n");
    assert!(matches!(err, ConfigError::CyclicDependency(_)));
}

#[test]
fn test_unknown_dependency_rejected() {
    let err = config_error("tasks:\n  a: {cmd: echo, deps: [nowhere]}\n");
    assert!(err.to_string().contains("nowhere"));
}
