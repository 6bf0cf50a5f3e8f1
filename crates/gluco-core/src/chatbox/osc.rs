//! OSC packet encoding for the chatbox input address.
//!
//! # Message shape
//!
//! ```text
//! /chatbox/input ,sTT "BG 120 →" true true
//!                  │   │          │    └─ play the notification sound
//!                  │   │          └────── send immediately (skip the keyboard)
//!                  │   └───────────────── text to display
//!                  └───────────────────── OSC type tags
//! ```

use rosc::{encoder, OscMessage, OscPacket, OscType};
use thiserror::Error;

/// OSC address the VR client reads chatbox text from.
pub const CHATBOX_INPUT_ADDR: &str = "/chatbox/input";

/// Returned when `rosc` refuses to encode the packet.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("failed to encode OSC packet: {0}")]
pub struct OscEncodeError(pub String);

/// Builds the `/chatbox/input` datagram for `text`.
///
/// # Errors
///
/// Returns [`OscEncodeError`] if the encoder rejects the packet.
pub fn encode_chatbox_input(text: &str, notify: bool) -> Result<Vec<u8>, OscEncodeError> {
    let packet = OscPacket::Message(OscMessage {
        addr: CHATBOX_INPUT_ADDR.to_string(),
        args: vec![
            OscType::String(text.to_string()),
            OscType::Bool(true),
            OscType::Bool(notify),
        ],
    });
    encoder::encode(&packet).map_err(|e| OscEncodeError(format!("{e:?}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
