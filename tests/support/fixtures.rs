//! Test fixtures and constants.

use std::path::Path;

/// Identity file written into every test project.
pub const KEY_FILE: &str = "key.txt";

/// Config file name the CLI looks for by default.
pub const CONFIG_FILE: &str = "cellar.yaml";

/// State file name used by generated configs.
pub const STATE_FILE: &str = ".cellar-state.json";

/// A valid age public key that no test holds the identity for.
pub const STRANGER_PUBLIC_KEY: &str =
    "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p";

/// An invalid public key for negative tests.
pub const INVALID_PUBLIC_KEY: &str = "not-a-valid-age-key";

/// Plaintext of the `web` app used across scenarios.
pub const WEB_SECRETS: &[(&str, &str)] = &[
    ("web/a.age", "DATABASE_URL=postgres://localhost/web\n"),
    ("web/b.age", "API_KEY=sk-test-12345\n"),
];

/// `apps` section for a single `web` app with two files.
pub const WEB_APP: &str = r#"
  web:
    files:
      - path: web/a.age
      - path: web/b.age
"#;

/// `apps` section with two independent apps, the second referencing a file
/// that isn't committed.
pub const WEB_AND_BROKEN_APPS: &str = r#"
  broken:
    files:
      - path: broken/missing.age
  web:
    files:
      - path: web/a.age
      - path: web/b.age
"#;

/// Full config text for an origin, identity and apps section.
pub fn config_yaml(origin: &str, identity: &Path, apps: &str) -> String {
    format!(
        "interval: 1m\nstatePath: {state}\ngit:\n  repo: '{origin}'\n  branch: main\nage:\n  identity: '{identity}'\napps:{apps}",
        state = STATE_FILE,
        origin = origin,
        identity = identity.display(),
        apps = apps,
    )
}
