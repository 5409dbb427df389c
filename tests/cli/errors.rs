//! Error reporting and hints.

use crate::support::*;

#[test]
fn test_missing_config_suggests_init() {
    let t = Test::new();

    let output = t.export(&[]);
    assert_failure(&output);
    assert_stderr_contains(&output, "config file not found");
    assert_stderr_contains(&output, "run: cellar init");
}

#[test]
fn test_config_without_git_is_rejected() {
    let t = Test::new();
    std::fs::write(t.path(CONFIG_FILE), "apps:\n  web:\n    files: []\n").unwrap();

    let output = t.export(&[]);
    assert_failure(&output);
    assert_stderr_contains(&output, "no git configuration found");
    assert_stderr_contains(&output, "git.repo");
}

#[test]
fn test_missing_identity_is_fatal_before_sync() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);
    let config = t
        .read(CONFIG_FILE)
        .lines()
        .filter(|line| !line.starts_with("age:") && !line.contains("identity:"))
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(t.path(CONFIG_FILE), config).unwrap();

    let output = t.export(&[]);
    assert_failure(&output);
    assert_stderr_contains(&output, "no age identities configured");
    assert!(!t.exists("a.env"));
}

#[test]
fn test_malformed_state_is_reported() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);
    std::fs::write(t.path(STATE_FILE), "{ nope").unwrap();

    let output = t.export(&[]);
    assert_failure(&output);
    assert_stderr_contains(&output, "malformed state file");
}

#[test]
fn test_verbose_logs_to_stderr() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);

    let output = t.run(&["-v", "export"]);
    assert_success(&output);
    assert_stderr_contains(&output, "runtime context ready");
}
