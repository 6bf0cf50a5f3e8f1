//! Infrastructure layer for the bridge.
//!
//! Contains the adapters that touch the outside world: the encrypted
//! credential file, the Share HTTP client, mDNS discovery, the OSC UDP socket
//! and the TOML settings file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `gluco_core`, but MUST NOT be imported by the `application` layer.

pub mod endpoint;
pub mod network;
pub mod share;
pub mod storage;
pub mod vault;
