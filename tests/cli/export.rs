//! Tests for `cellar export`.

use crate::support::*;

#[test]
fn test_export_writes_files_and_state() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);

    let output = t.export(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "web: web/a.age");

    assert_eq!(t.read("a.env"), "DATABASE_URL=postgres://localhost/web\n");
    assert_eq!(t.read("b.env"), "API_KEY=sk-test-12345\n");

    let state: serde_json::Value = serde_json::from_str(&t.read(STATE_FILE)).unwrap();
    assert!(state["data"]["web:web/a.age"].is_string());
    assert!(state["data"]["web:web/b.age"].is_string());
    assert!(state["lastUpdated"].as_i64().unwrap() > 0);

    #[cfg(unix)]
    assert_eq!(mode(&t.path("a.env")), 0o600);
}

#[test]
fn test_second_export_is_up_to_date() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);
    assert_success(&t.export(&[]));
    std::fs::write(t.path("a.env"), "local edit").unwrap();

    let output = t.export(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "web: web/a.age up to date");
    assert_stdout_contains(&output, "web: web/b.age up to date");
    assert_eq!(t.read("a.env"), "local edit");
}

#[test]
fn test_force_rewrites() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);
    assert_success(&t.export(&[]));
    std::fs::write(t.path("a.env"), "local edit").unwrap();

    assert_success(&t.export(&["--force"]));
    assert_eq!(t.read("a.env"), "DATABASE_URL=postgres://localhost/web\n");
}

#[test]
fn test_new_commit_is_picked_up() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);
    assert_success(&t.export(&[]));

    t.commit_secrets(&[("web/b.age", "API_KEY=rotated\n")]);
    let output = t.export(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "web: web/a.age up to date");
    assert_eq!(t.read("b.env"), "API_KEY=rotated\n");
}

#[test]
fn test_dry_run_prints_without_writing() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);

    let output = t.export(&["--dry-run"]);
    assert_success(&output);
    assert_stdout_contains(&output, "DATABASE_URL=postgres://localhost/web");
    assert_stdout_contains(&output, "API_KEY=sk-test-12345");
    assert_stderr_contains(&output, "dry run");
    assert!(!t.exists("a.env"));
    assert!(!t.exists(STATE_FILE));
}

#[test]
fn test_decrypt_alias_and_single_app() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);

    let output = t.run(&["decrypt", "--app", "web"]);
    assert_success(&output);
    assert!(t.exists("a.env"));
}

#[test]
fn test_unknown_app_lists_available() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);

    let output = t.export(&["-a", "api"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "app 'api' not found");
    assert_stderr_contains(&output, "available: web");
}

#[test]
fn test_failing_app_does_not_block_others() {
    let t = Test::with_secrets(WEB_AND_BROKEN_APPS, WEB_SECRETS);

    let output = t.export(&[]);
    assert_failure(&output);
    assert_stderr_contains(&output, "broken/missing.age");
    assert_eq!(t.read("a.env"), "DATABASE_URL=postgres://localhost/web\n");
    assert!(t.exists("b.env"));
}

#[test]
fn test_explicit_output_and_identity_override() {
    let t = Test::new();
    t.commit_secrets(WEB_SECRETS);
    t.write_config(
        r#"
  web:
    files:
      - path: web/a.age
        output: deploy/web/.env
"#,
    );
    let moved = t.path("moved-key.txt");
    std::fs::rename(t.key_path(), &moved).unwrap();

    let output = t.run(&["--identity", moved.to_str().unwrap(), "export"]);
    assert_success(&output);
    assert_eq!(t.read("deploy/web/.env"), "DATABASE_URL=postgres://localhost/web\n");
}
