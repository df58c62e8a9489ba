//! End-to-end tests of the poet binary

#![cfg(unix)]

mod common;

use assert_cmd::Command;
use common::{create_test_config, create_test_config_in_subdir};
use predicates::prelude::*;

const CONFIG: &str = r#"
tasks:
  greet:
    help: Say hello
    cmd: echo hello ${name}
    args:
      - name: name
        default: world
  fail:
    help: Exit with a code
    shell: exit 7
  _internal: echo hidden
"#;

fn poet(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("poet").unwrap();
    cmd.current_dir(dir)
        .env_remove("POET_ACTIVE")
        .env_remove("POET_CWD")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_lists_tasks_without_arguments() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("greet"))
        .stdout(predicate::str::contains("Say hello"))
        .stdout(predicate::str::contains("_internal").not());
}

#[test]
fn test_runs_task_with_arguments() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path())
        .args(["greet", "--name", "poet"])
        .assert()
        .success()
        .stdout("hello poet\n")
        .stderr(predicate::str::contains("Poet => echo hello poet"));
}

#[test]
fn test_quiet_hides_actions() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path())
        .args(["-q", "greet"])
        .assert()
        .success()
        .stdout("hello world\n")
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_exit_code_passes_through() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path()).arg("fail").assert().code(7);
}

#[test]
fn test_unknown_task() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path())
        .arg("nope")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'nope' is not defined"));
}

#[test]
fn test_hidden_task_not_invocable() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path())
        .arg("_internal")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("hidden"));
}

#[test]
fn test_argument_error_exit_code() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path())
        .args(["greet", "--unknown"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--unknown"))
        .stderr(predicate::str::contains("usage"));
}

#[test]
fn test_dry_run_prints_without_running() {
    let (dir, _) = create_test_config(CONFIG);
    poet(dir.path())
        .args(["--dry-run", "greet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Poet <= echo hello world"));
}

#[test]
fn test_file_option() {
    let (dir, path) = create_test_config(CONFIG);
    let elsewhere = tempfile::TempDir::new().unwrap();
    poet(elsewhere.path())
        .args(["-q", "-f"])
        .arg(&path)
        .arg("greet")
        .assert()
        .success()
        .stdout("hello world\n");
    drop(dir);
}

#[test]
fn test_config_found_from_subdirectory() {
    let (_dir, _, sub_dir) = create_test_config_in_subdir(CONFIG);
    poet(&sub_dir)
        .args(["-q", "greet"])
        .assert()
        .success()
        .stdout("hello world\n");
}

#[test]
fn test_missing_config() {
    let dir = tempfile::TempDir::new().unwrap();
    poet(dir.path())
        .arg("greet")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to find config file"));
}

#[test]
fn test_version() {
    let dir = tempfile::TempDir::new().unwrap();
    poet(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
