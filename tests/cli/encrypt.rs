//! Tests for `cellar encrypt`.

use crate::support::*;
use cellar::core::cipher::{self, Age, Cipher};
use predicates::prelude::*;

#[test]
fn test_encrypt_file_roundtrip() {
    let t = Test::new();
    std::fs::write(t.path("plain.env"), "TOKEN=abc\n").unwrap();

    let output = t.run(&[
        "encrypt",
        "--input",
        "plain.env",
        "--output",
        "plain.age",
        "--recipient",
        &t.public_key,
    ]);
    assert_success(&output);

    let ciphertext = std::fs::read(t.path("plain.age")).unwrap();
    let identities = cipher::load_identities(&[t.key_path()]).unwrap();
    assert_eq!(Age.decrypt(&ciphertext, &identities).unwrap(), b"TOKEN=abc\n");

    #[cfg(unix)]
    assert_eq!(mode(&t.path("plain.age")), 0o600);
}

#[test]
fn test_encrypt_stdin_to_stdout() {
    let t = Test::new();

    t.cmd()
        .args(["encrypt", "-r", t.public_key.as_str()])
        .write_stdin("TOKEN=abc\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("-----BEGIN AGE ENCRYPTED FILE-----"));
}

#[test]
fn test_encrypt_uses_configured_recipients() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);
    let config = t.read(CONFIG_FILE).replace(
        "age:\n",
        &format!("age:\n  recipients: ['{}']\n", t.public_key),
    );
    std::fs::write(t.path(CONFIG_FILE), config).unwrap();

    t.cmd()
        .arg("encrypt")
        .write_stdin("X=1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("BEGIN AGE ENCRYPTED FILE"));
}

#[test]
fn test_encrypt_rejects_invalid_recipient() {
    let t = Test::new();

    t.cmd()
        .args(["encrypt", "-r", INVALID_PUBLIC_KEY])
        .write_stdin("X=1\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid public key"));
}

#[test]
fn test_encrypt_without_any_recipient_fails() {
    let t = Test::with_secrets(WEB_APP, WEB_SECRETS);

    t.cmd()
        .arg("encrypt")
        .write_stdin("X=1\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no recipients"));
}
