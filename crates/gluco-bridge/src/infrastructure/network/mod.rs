//! Network infrastructure for the bridge.
//!
//! # Sub-modules
//!
//! - **`osc_sender`** – Encodes chatbox text as an OSC `/chatbox/input`
//!   message and fires it at the resolved endpoint as a single UDP datagram.
//!   There is no reply and no retry; the polling engine decides what a failed
//!   send means.

pub mod osc_sender;

pub use osc_sender::OscSender;
