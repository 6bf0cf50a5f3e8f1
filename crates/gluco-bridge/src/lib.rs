//! gluco-bridge library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the bridge do?
//!
//! 1. Decrypts the Share account credentials saved by `setup`.
//! 2. Polls the Share service for the latest glucose reading on a fixed
//!    cadence, backing off when the service misbehaves.
//! 3. Finds the headset's OSC port (fixed address or mDNS discovery).
//! 4. Sends each new reading to the VRChat chatbox.

/// Application layer: the polling engine and the ports it drives.
pub mod application;

/// Infrastructure layer: vault, HTTP, mDNS, UDP and settings storage.
pub mod infrastructure;
