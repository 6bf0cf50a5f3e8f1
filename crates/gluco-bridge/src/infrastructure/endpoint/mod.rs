//! OSC endpoint resolution.
//!
//! [`Resolver`] implements [`EndpointResolver`] in one of two modes:
//!
//! - **Fixed** – the user gave `--host HOST --port PORT`.  The address is
//!   returned as-is and discovery is never touched.
//! - **Auto** – the headset is found by browsing mDNS.  A discovered address
//!   is reused until its TTL runs out or the engine calls
//!   [`EndpointResolver::invalidate`] after a failed send.

pub mod mdns;

use std::time::Duration;

use async_trait::async_trait;
use gluco_core::{EndpointAddress, EndpointError};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::application::ports::{EndpointResolver, ResolutionError};

pub use mdns::MdnsBrowser;

/// Where chatbox messages go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Fixed(EndpointAddress),
    Auto,
}

impl Destination {
    /// Interprets the `--host` / `--port` pair.  `auto` (any case) selects
    /// discovery and ignores the port.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] for a blank host or port 0.
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, EndpointError> {
        if host.trim().eq_ignore_ascii_case("auto") {
            Ok(Destination::Auto)
        } else {
            EndpointAddress::new(host, u32::from(port)).map(Destination::Fixed)
        }
    }
}

/// Parameters for one mDNS browse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseQuery {
    pub service_type: String,
    pub instance_prefix: String,
    pub timeout: Duration,
}

impl Default for BrowseQuery {
    fn default() -> Self {
        Self {
            service_type: "_osc._udp.local.".to_string(),
            instance_prefix: "VRChat-Client-".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

/// Something that can look a service up on the LAN.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceBrowser: Send + Sync {
    /// Returns the first matching instance seen within `query.timeout`.
    async fn browse(&self, query: &BrowseQuery) -> Result<EndpointAddress, ResolutionError>;
}

/// Fixed-or-discovered endpoint resolver with a TTL cache.
pub struct Resolver<B> {
    destination: Destination,
    browser: B,
    query: BrowseQuery,
    ttl: Duration,
    cached: Option<(EndpointAddress, Instant)>,
}

impl<B: ServiceBrowser> Resolver<B> {
    pub fn new(destination: Destination, browser: B, query: BrowseQuery, ttl: Duration) -> Self {
        Self {
            destination,
            browser,
            query,
            ttl,
            cached: None,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    fn cached_if_fresh(&self) -> Option<EndpointAddress> {
        self.cached
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(addr, _)| addr.clone())
    }
}

#[async_trait]
impl<B: ServiceBrowser> EndpointResolver for Resolver<B> {
    async fn resolve(&mut self) -> Result<EndpointAddress, ResolutionError> {
        if let Destination::Fixed(addr) = &self.destination {
            return Ok(addr.clone());
        }
        if let Some(addr) = self.cached_if_fresh() {
            return Ok(addr);
        }

        debug!("browsing {} for {}*", self.query.service_type, self.query.instance_prefix);
        let addr = self.browser.browse(&self.query).await?;
        if self.cached.as_ref().map(|(prev, _)| prev) != Some(&addr) {
            info!("discovered OSC endpoint {addr}");
        }
        self.cached = Some((addr.clone(), Instant::now()));
        Ok(addr)
    }

    fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            debug!("dropped cached OSC endpoint");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn quest() -> EndpointAddress {
        EndpointAddress::new("192.168.1.40", 9000).unwrap()
    }

    fn auto_resolver(browser: MockServiceBrowser) -> Resolver<MockServiceBrowser> {
        Resolver::new(
            Destination::Auto,
            browser,
            BrowseQuery::default(),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_destination_auto_is_case_insensitive() {
        assert_eq!(Destination::from_host_port("AUTO", 9000), Ok(Destination::Auto));
        assert_eq!(
            Destination::from_host_port("10.0.0.5", 9001),
            Ok(Destination::Fixed(EndpointAddress::new("10.0.0.5", 9001).unwrap()))
        );
        assert!(Destination::from_host_port("10.0.0.5", 0).is_err());
    }

    #[tokio::test]
    async fn test_fixed_destination_never_browses() {
        // Arrange
        let mut browser = MockServiceBrowser::new();
        browser.expect_browse().times(0);
        let mut resolver = Resolver::new(
            Destination::Fixed(quest()),
            browser,
            BrowseQuery::default(),
            Duration::from_secs(60),
        );

        // Act
        let first = resolver.resolve().await.unwrap();
        resolver.invalidate();
        let second = resolver.resolve().await.unwrap();

        // Assert
        assert_eq!(first, quest());
        assert_eq!(second, quest());
    }

    #[tokio::test]
    async fn test_auto_caches_within_ttl() {
        let mut browser = MockServiceBrowser::new();
        browser.expect_browse().times(1).returning(|_| Ok(quest()));
        let mut resolver = auto_resolver(browser);

        assert_eq!(resolver.resolve().await.unwrap(), quest());
        assert_eq!(resolver.resolve().await.unwrap(), quest());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_browses_again_after_ttl() {
        // Arrange
        let mut browser = MockServiceBrowser::new();
        browser.expect_browse().times(2).returning(|_| Ok(quest()));
        let mut resolver = auto_resolver(browser);

        // Act
        resolver.resolve().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        resolver.resolve().await.unwrap();

        // Assert: expectations verified on drop
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_browse() {
        let mut browser = MockServiceBrowser::new();
        browser.expect_browse().times(2).returning(|_| Ok(quest()));
        let mut resolver = auto_resolver(browser);

        resolver.resolve().await.unwrap();
        resolver.invalidate();
        resolver.resolve().await.unwrap();
    }

    #[tokio::test]
    async fn test_browse_failure_is_reported_and_not_cached() {
        let mut browser = MockServiceBrowser::new();
        let mut seq = mockall::Sequence::new();
        browser
            .expect_browse()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ResolutionError("nobody answered".into())));
        browser
            .expect_browse()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(quest()));
        let mut resolver = auto_resolver(browser);

        assert!(resolver.resolve().await.is_err());
        assert_eq!(resolver.resolve().await.unwrap(), quest());
    }

    #[tokio::test]
    async fn test_browse_receives_configured_query() {
        let query = BrowseQuery {
            instance_prefix: "VRChat-Client-Desk".to_string(),
            ..BrowseQuery::default()
        };
        let expected = query.clone();
        let mut browser = MockServiceBrowser::new();
        browser
            .expect_browse()
            .withf(move |q| *q == expected)
            .times(1)
            .returning(|_| Ok(quest()));
        let mut resolver = Resolver::new(Destination::Auto, browser, query, Duration::from_secs(60));

        resolver.resolve().await.unwrap();
    }
}
