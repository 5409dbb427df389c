//! Core library components.
//!
//! The sync pipeline (source cache, sync engine, watcher) and the
//! collaborators it is built from: configuration, state, ciphers and
//! source providers.

pub mod cache;
pub mod cipher;
pub mod config;
pub mod constants;
pub mod context;
pub mod fsutil;
pub mod source;
pub mod state;
pub mod sync;
pub mod watcher;
