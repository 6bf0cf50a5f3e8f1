//! Chatbox message construction: text formatting and OSC encoding.
//!
//! VRChat exposes its chatbox over OSC at `/chatbox/input`.  The bridge
//! renders each reading into a short line of text ([`format`]) and wraps it in
//! the OSC packet shape the client expects ([`osc`]).

pub mod format;
pub mod osc;
