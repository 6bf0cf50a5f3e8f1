//! Collaborator traits driven by the polling engine.
//!
//! Every network-facing collaborator classifies its own failures before they
//! reach the engine, so the engine only ever branches on the small tagged
//! types defined here and never sees a raw HTTP or socket error.

use async_trait::async_trait;
use gluco_core::{EndpointAddress, Reading};
use thiserror::Error;

/// Result of one `fetch_latest` call against the Share service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The service returned a reading.
    Reading(Reading),
    /// The account has no current data (sensor warm-up, no uploader).
    NoReading,
    /// Timeout, connection failure, 5xx, throttling or an unparseable body.
    Transient(String),
    /// Session expired or credentials rejected.
    Auth(String),
}

/// Errors from logging in to the Share service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShareError {
    /// The service rejected the credentials or the session.
    #[error("Share service rejected the login: {0}")]
    Auth(String),
    /// The login could not be completed for a reason that may go away.
    #[error("Share service unavailable: {0}")]
    Transient(String),
}

/// No OSC destination could be determined this cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no OSC endpoint available: {0}")]
pub struct ResolutionError(pub String);

/// A chatbox datagram could not be handed to the network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to send chatbox message to {addr}: {reason}")]
pub struct SendError {
    pub addr: EndpointAddress,
    pub reason: String,
}

/// Source of glucose readings.
///
/// Implementations hold their own login session, which is why the methods
/// take `&mut self`.
#[async_trait]
pub trait ShareSource: Send {
    /// Fetches the most recent reading.  Never returns a raw transport error.
    async fn fetch_latest(&mut self) -> FetchOutcome;

    /// Discards any cached session and logs in again with the stored
    /// credentials.
    async fn reauthenticate(&mut self) -> Result<(), ShareError>;
}

/// Determines where chatbox messages are sent.
#[async_trait]
pub trait EndpointResolver: Send {
    /// Returns the current destination, discovering it if necessary.
    async fn resolve(&mut self) -> Result<EndpointAddress, ResolutionError>;

    /// Forgets any cached destination so the next `resolve` looks again.
    fn invalidate(&mut self);
}

/// Delivers formatted chatbox text.
///
/// Infrastructure implementation writes one OSC datagram; test
/// implementations record calls.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Sends `text` to `addr`.  Best effort; no acknowledgement exists.
    async fn send(&self, text: &str, addr: &EndpointAddress) -> Result<(), SendError>;
}
