//! # gluco-core
//!
//! Shared library for the Dexcom-OSC bridge containing the domain entities,
//! the chatbox text formatter and the OSC packet encoder.
//!
//! This crate is used by the bridge application.  It has zero dependencies on
//! sockets, the filesystem, or HTTP clients, so everything in it can be unit
//! tested without any external setup.
//!
//! # Architecture overview
//!
//! The bridge polls a glucose reading from the Dexcom Share cloud service and
//! shows it in the VRChat chatbox of a headset on the local network.  This
//! crate defines:
//!
//! - **`domain`** – What a reading, a trend, a region, a set of account
//!   credentials and a destination address *are*, plus the rules for deciding
//!   whether a new reading supersedes the previous one.
//!
//! - **`chatbox`** – How a reading becomes the short text shown above the
//!   avatar, and how that text is wrapped into the OSC datagram the VR client
//!   listens for on `/chatbox/input`.

pub mod chatbox;
pub mod domain;

pub use chatbox::format::{format_reading, truncate_chars, ChatboxFormat, CHATBOX_MAX_CHARS};
pub use chatbox::osc::{encode_chatbox_input, OscEncodeError, CHATBOX_INPUT_ADDR};
pub use domain::credentials::{Credentials, Region, RegionParseError};
pub use domain::endpoint::{EndpointAddress, EndpointError};
pub use domain::reading::{GlucoseValue, Reading, ReadingFreshness, Trend};
