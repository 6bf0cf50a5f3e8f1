//! Destination address of the VR client's OSC input port.

use std::fmt;

use thiserror::Error;

/// Errors produced when building an [`EndpointAddress`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("endpoint host must not be empty")]
    EmptyHost,
    #[error("endpoint port must be in 1..=65535, got {0}")]
    InvalidPort(u32),
}

/// A host (name or IP literal) and UDP port.
///
/// The host is kept as text because a fixed destination may be a DNS name;
/// the sender resolves it at send time so a changed DHCP lease is picked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    host: String,
    port: u16,
}

impl EndpointAddress {
    /// Validates and builds an address.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::EmptyHost`] for a blank host and
    /// [`EndpointError::InvalidPort`] for port 0 or anything above 65535.
    pub fn new(host: impl Into<String>, port: u32) -> Result<Self, EndpointError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(EndpointError::InvalidPort(port))?;
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            // Bare IPv6 literal.
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_valid_address() {
        let addr = EndpointAddress::new("192.168.1.40", 9000).unwrap();
        assert_eq!(addr.host(), "192.168.1.40");
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn test_new_rejects_port_zero_and_overflow() {
        assert_eq!(
            EndpointAddress::new("quest.local", 0),
            Err(EndpointError::InvalidPort(0))
        );
        assert_eq!(
            EndpointAddress::new("quest.local", 70_000),
            Err(EndpointError::InvalidPort(70_000))
        );
    }

    #[test]
    fn test_new_rejects_blank_host() {
        assert_eq!(EndpointAddress::new("   ", 9000), Err(EndpointError::EmptyHost));
    }

    #[test]
    fn test_display_brackets_ipv6() {
        let v4 = EndpointAddress::new("10.0.0.2", 9000).unwrap();
        let v6 = EndpointAddress::new("fe80::1", 9000).unwrap();
        assert_eq!(v4.to_string(), "10.0.0.2:9000");
        assert_eq!(v6.to_string(), "[fe80::1]:9000");
    }
}
