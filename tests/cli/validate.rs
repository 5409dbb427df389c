//! Tests for `cellar validate`.

use crate::support::*;

#[test]
fn test_validate_passes_when_all_files_exist() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);

    let output = t.validate();
    assert_success(&output);
    assert_stdout_contains(&output, "config valid (1 apps, 2 files found)");
    assert!(!t.exists("a.env"), "validate must not decrypt");
}

#[test]
fn test_validate_reports_missing_files() {
    let t = Test::with_secrets(WEB_AND_BROKEN_APPS, WEB_SECRETS);

    let output = t.validate();
    assert_failure(&output);
    assert_stdout_contains(&output, "broken: broken/missing.age missing");
}

#[test]
fn test_validate_rejects_destination_collisions() {
    let t = Test::new();
    t.commit_secrets(WEB_SECRETS);
    t.write_config(
        r#"
  web:
    files:
      - path: web/a.age
        output: shared.env
      - path: web/b.age
        output: shared.env
"#,
    );

    let output = t.validate();
    assert_failure(&output);
    assert_stderr_contains(&output, "written by both web:web/a.age and web:web/b.age");
}

#[test]
fn test_validate_missing_branch() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);
    let config = t.read(CONFIG_FILE).replace("branch: main", "branch: nope");
    std::fs::write(t.path(CONFIG_FILE), config).unwrap();

    let output = t.validate();
    assert_failure(&output);
    assert_stdout_contains(&output, "web: ");
    assert_stdout_contains(&output, "nope");
}
