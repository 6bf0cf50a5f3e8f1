//! Storage infrastructure: settings file persistence.
//!
//! The `config` sub-module resolves the per-user configuration directory
//! (shared with the credential vault), loads the optional `config.toml`
//! with defaults for anything missing.  The bridge never writes it.

pub mod config;
