//! Terminal output for commands.
//!
//! Results go to stdout; status lines, errors and hints go to stderr so that
//! `export --dry-run` and `encrypt` can be piped. Styling is dropped when
//! `NO_COLOR` is set.

use std::fmt::Display;

use console::{style, StyledObject};

fn plain() -> bool {
    std::env::var_os("NO_COLOR").is_some()
}

/// Render `value` with `paint` unless color is disabled.
fn styled<D: Display>(value: D, paint: impl FnOnce(StyledObject<D>) -> StyledObject<D>) -> String {
    if plain() {
        value.to_string()
    } else {
        paint(style(value)).to_string()
    }
}

/// `✓ web: web/a.age → a.env`
pub fn success(msg: &str) {
    println!("{} {}", styled("✓", |s| s.green()), msg);
}

/// `✗ config file not found: cellar.yaml`, on stderr.
pub fn error(msg: &str) {
    eprintln!("{} {}", styled("✗", |s| s.red()), msg);
}

/// `⚠ web: web/b.age failed to decrypt: ...`
pub fn warn(msg: &str) {
    println!("{} {}", styled("⚠", |s| s.yellow()), msg);
}

/// `→ run: cellar init`, on stderr.
pub fn hint(msg: &str) {
    eprintln!("{} {}", styled("→", |s| s.cyan()), styled(msg, |s| s.cyan()));
}

/// Indented `label  value` line, e.g. a public key.
pub fn kv(label: &str, value: impl Display) {
    println!("  {}  {}", styled(label, |s| s.dim()), styled(value, |s| s.bold()));
}

pub fn list_item(item: &str) {
    println!("  • {}", item);
}

/// Secondary result line, such as an up-to-date file.
pub fn dimmed(msg: &str) {
    println!("{}", styled(msg, |s| s.dim()));
}

/// Progress or status line on stderr, keeping stdout for data.
pub fn status(msg: &str) {
    eprintln!("{}", styled(msg, |s| s.dim()));
}

/// A path for inline use.
pub fn path(p: impl Display) -> String {
    styled(p, |s| s.cyan())
}
