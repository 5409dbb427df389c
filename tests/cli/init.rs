//! Tests for `cellar init` and `cellar generate`.

use crate::support::*;

#[test]
fn test_init_writes_starter_config() {
    let t = Test::new();

    let output = t.run(&["init"]);
    assert_success(&output);
    assert_stdout_contains(&output, "created");

    let config = t.read(CONFIG_FILE);
    assert!(config.contains("interval: 10m"));
    assert!(config.contains("branch: main"));
    assert!(config.contains("statePath"));

    #[cfg(unix)]
    assert_eq!(mode(&t.path(CONFIG_FILE)), 0o600);
}

#[test]
fn test_init_refuses_to_overwrite() {
    let t = Test::new();
    assert_success(&t.run(&["init"]));

    let output = t.run(&["init"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "already exists");
}

#[test]
fn test_init_with_identity() {
    let t = Test::new();

    let output = t.run(&["init", "--generate-identity", "keys/cellar.txt"]);
    assert_success(&output);
    assert_stdout_contains(&output, "age1");

    assert!(t.exists("keys/cellar.txt"));
    assert!(t.exists("keys/cellar.txt.pub"));
    let config = t.read(CONFIG_FILE);
    assert!(config.contains("keys/cellar.txt"));
    assert!(config.contains("recipients"));
}

#[test]
fn test_generate_to_file() {
    let t = Test::new();

    let output = t.run(&["generate", "--output", "new.txt"]);
    assert_success(&output);
    assert_stdout_contains(&output, "age1");
    assert!(t.read("new.txt").contains("AGE-SECRET-KEY-"));
    assert!(t.read("new.txt.pub").starts_with("age1"));

    #[cfg(unix)]
    assert_eq!(mode(&t.path("new.txt")), 0o600);

    let again = t.run(&["generate", "--output", "new.txt"]);
    assert_failure(&again);
}

#[test]
fn test_generate_to_stdout() {
    let t = Test::new();

    let output = t.run(&["generate"]);
    assert_success(&output);
    assert_stdout_contains(&output, "# public key: age1");
    assert_stdout_contains(&output, "AGE-SECRET-KEY-");
}

#[test]
fn test_completions() {
    let t = Test::new();

    let output = t.run(&["completions", "bash"]);
    assert_success(&output);
    assert_stdout_contains(&output, "cellar");
}
