//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// Create a cellar command isolated to this environment.
    ///
    /// HOME points at the temporary home, the working directory is the
    /// project dir, and color and log overrides are cleared.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("cellar").expect("failed to find cellar binary");
        cmd.env("HOME", self.home.path());
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("CELLAR_LOG");
        cmd.env_remove("CELLAR_CONFIG");
        cmd.env_remove("CELLAR_GIT_TOKEN");
        cmd.env_remove("CELLAR_GIT_SSH_KEY_FILE");
        cmd.env_remove("CELLAR_GIT_SSH_KEY_PASSWORD");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Run `cellar` with `args`.
    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .expect("failed to run cellar")
    }

    /// Shortcut for `cellar export` with extra flags.
    pub fn export(&self, flags: &[&str]) -> Output {
        let mut args = vec!["export"];
        args.extend_from_slice(flags);
        self.run(&args)
    }

    /// Shortcut for `cellar validate`.
    pub fn validate(&self) -> Output {
        self.run(&["validate"])
    }
}
