//! Command-line interface.

pub mod completions;
pub mod encrypt;
pub mod export;
pub mod generate;
pub mod init;
pub mod output;
pub mod validate;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::core::cache::SourceCache;
use crate::core::config::Config;
use crate::core::constants;
use crate::core::context::{RuntimeOptions, SyncOptions};
use crate::core::source::{GitAuth, GitProvider};
use crate::core::sync::SyncEngine;
use crate::error::Result;

/// Cellar - age-encrypted secrets from git, decrypted where your apps need them.
#[derive(Parser)]
#[command(
    name = "cellar",
    about = "Distributes age-encrypted secrets from git repositories to local files",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Enable debug logging (overridden by CELLAR_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file
    #[arg(short, long, global = true, env = "CELLAR_CONFIG", default_value = constants::CONFIG_FILE)]
    pub config: PathBuf,

    /// State file (overrides statePath from the config)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Identity file (repeatable; overrides age.identity from the config)
    #[arg(short, long = "identity", global = true)]
    pub identities: Vec<PathBuf>,
}

impl GlobalArgs {
    fn runtime_options(&self, app: Option<String>, sync: SyncOptions) -> RuntimeOptions {
        RuntimeOptions {
            config_path: Some(self.config.clone()),
            state_path: self.state.clone(),
            identities: self.identities.clone(),
            app,
            sync,
        }
    }
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Decrypt secrets to their configured destinations
    #[command(visible_aliases = ["decrypt", "e"])]
    Export {
        /// Only this app
        #[arg(short, long)]
        app: Option<String>,
        /// Print plaintext instead of writing files
        #[arg(short, long)]
        dry_run: bool,
        /// Rewrite files even when unchanged
        #[arg(short, long)]
        force: bool,
    },

    /// Check that every configured file exists in its repository
    Validate {
        /// Only this app
        #[arg(short, long)]
        app: Option<String>,
    },

    /// Encrypt a file to age recipients
    Encrypt {
        /// Input file, or - for stdin
        #[arg(long, default_value = constants::STDIO)]
        input: String,
        /// Output file, or - for stdout
        #[arg(short, long, default_value = constants::STDIO)]
        output: String,
        /// Recipient public key (repeatable; defaults to age.recipients)
        #[arg(short, long = "recipient")]
        recipients: Vec<String>,
    },

    /// Generate an age key pair
    Generate {
        /// Write the key here (and the public key to <path>.pub)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a starter configuration file
    Init {
        /// Also generate an identity at this path and reference it
        #[arg(long, value_name = "PATH")]
        generate_identity: Option<PathBuf>,
    },

    /// Sync on an interval until interrupted
    Watch {
        /// Only this app
        #[arg(short, long)]
        app: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Execute a command.
pub fn execute(cli: Cli) -> Result<()> {
    use Command::*;

    let global = cli.global;
    match cli.command {
        Export {
            app,
            dry_run,
            force,
        } => export::execute(&global, app, SyncOptions { force, dry_run }),
        Validate { app } => validate::execute(&global, app),
        Encrypt {
            input,
            output,
            recipients,
        } => encrypt::execute(&global, &input, &output, &recipients),
        Generate { output } => generate::execute(output.as_deref()),
        Init { generate_identity } => init::execute(&global.config, generate_identity.as_deref()),
        Watch { app } => watch::execute(&global, app),
        Completions { shell } => completions::execute(shell),
    }
}

/// Sync engine over git, authenticated from the environment.
fn engine(config: &Config) -> Result<SyncEngine> {
    let provider = GitProvider::new(config.cache_dir().as_deref(), GitAuth::from_env())?;
    let cache = SourceCache::new(Arc::new(provider));
    Ok(SyncEngine::new(Arc::new(cache)))
}
