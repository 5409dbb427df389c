//! Cellar - distributes age-encrypted secrets from git repositories to
//! local application trees.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── export        # Decrypt apps to their destinations
//! │   ├── validate      # Check every mapped file exists
//! │   ├── encrypt       # Stand-alone age encryption
//! │   ├── generate      # Key pair generation
//! │   ├── init          # Write a starter config
//! │   ├── watch         # Periodic sync until signalled
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── config        # cellar.yaml management
//!     ├── context       # Per-invocation runtime context
//!     ├── state         # Change-tracking state file
//!     ├── fsutil        # Atomic, owner-only writes
//!     ├── cipher/       # Encryption backends
//!     │   ├── mod       # Cipher trait
//!     │   └── age       # age encryption implementation
//!     ├── source/       # Source providers
//!     │   ├── mod       # SourceProvider trait, snapshots
//!     │   ├── git       # git2-backed provider
//!     │   ├── memory    # In-process provider
//!     │   └── retry     # Backoff for transient failures
//!     ├── cache         # Single-flight source tree cache
//!     ├── sync          # Incremental sync engine
//!     └── watcher       # Interval-driven sync loop
//! ```
//!
//! # Features
//!
//! - Content-hash change detection: unchanged ciphertext is never decrypted
//! - Atomic, owner-only plaintext writes
//! - One fetch per repository and branch, shared across apps
//! - Dry-run and forced modes
//! - Long-running watch mode with graceful shutdown

pub mod cli;
pub mod core;
pub mod error;
