//! mDNS / DNS-SD browser for the VR client's OSC service.
//!
//! VRChat advertises its OSC input port as a `_osc._udp.local.` service with
//! an instance name like `VRChat-Client-A1B2C3._osc._udp.local.`.  Other OSC
//! apps on the LAN use the same service type, so instances are filtered by
//! name prefix.
//!
//! `mdns-sd` runs its own thread and hands events over a blocking channel,
//! so each browse runs inside `spawn_blocking` and shuts its daemon down
//! before returning.

use std::net::IpAddr;
use std::time::Instant;

use async_trait::async_trait;
use gluco_core::EndpointAddress;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, warn};

use super::{BrowseQuery, ServiceBrowser};
use crate::application::ports::ResolutionError;

/// Browser backed by the `mdns-sd` daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct MdnsBrowser;

impl MdnsBrowser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServiceBrowser for MdnsBrowser {
    async fn browse(&self, query: &BrowseQuery) -> Result<EndpointAddress, ResolutionError> {
        let query = query.clone();
        tokio::task::spawn_blocking(move || browse_blocking(&query))
            .await
            .map_err(|e| ResolutionError(format!("mDNS browse task failed: {e}")))?
    }
}

fn browse_blocking(query: &BrowseQuery) -> Result<EndpointAddress, ResolutionError> {
    let daemon = ServiceDaemon::new()
        .map_err(|e| ResolutionError(format!("failed to start mDNS daemon: {e}")))?;
    let result = browse_with(&daemon, query);
    if let Err(e) = daemon.shutdown() {
        warn!("failed to shut down mDNS daemon: {e}");
    }
    result
}

fn browse_with(daemon: &ServiceDaemon, query: &BrowseQuery) -> Result<EndpointAddress, ResolutionError> {
    let receiver = daemon
        .browse(&query.service_type)
        .map_err(|e| ResolutionError(format!("failed to browse {}: {e}", query.service_type)))?;

    let deadline = Instant::now() + query.timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        // Err is either the deadline passing or the daemon going away.
        let Ok(event) = receiver.recv_timeout(remaining) else {
            break;
        };
        if let ServiceEvent::ServiceResolved(info) = event {
            debug!(
                "mDNS resolved {} at {:?}:{}",
                info.get_fullname(),
                info.get_addresses(),
                info.get_port()
            );
            if let Some(addr) = endpoint_from(&info, &query.instance_prefix) {
                return Ok(addr);
            }
        }
    }

    Err(ResolutionError(format!(
        "no {}* instance of {} answered within {:?}",
        query.instance_prefix, query.service_type, query.timeout
    )))
}

fn endpoint_from(info: &ServiceInfo, instance_prefix: &str) -> Option<EndpointAddress> {
    if !info.get_fullname().starts_with(instance_prefix) {
        return None;
    }
    let ip = pick_address(info.get_addresses().iter().copied())?;
    EndpointAddress::new(ip.to_string(), u32::from(info.get_port())).ok()
}

/// First IPv4 address if there is one, otherwise the first address at all.
pub(crate) fn pick_address(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    let mut fallback = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        fallback.get_or_insert(addr);
    }
    fallback
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_pick_address_prefers_ipv4() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let v4 = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40));
        assert_eq!(pick_address([v6, v4]), Some(v4));
    }

    #[test]
    fn test_pick_address_falls_back_to_ipv6() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(pick_address([v6]), Some(v6));
        assert_eq!(pick_address(Vec::<IpAddr>::new()), None);
    }

    #[test]
    fn test_endpoint_from_filters_instance_prefix() {
        // Arrange
        let no_txt: &[(&str, &str)] = &[];
        let vrchat = ServiceInfo::new(
            "_osc._udp.local.",
            "VRChat-Client-ABC123",
            "quest.local.",
            "192.168.1.40",
            9000,
            no_txt,
        )
        .unwrap();
        let other = ServiceInfo::new(
            "_osc._udp.local.",
            "TouchOSC",
            "tablet.local.",
            "192.168.1.41",
            8000,
            no_txt,
        )
        .unwrap();

        // Act / Assert
        assert_eq!(
            endpoint_from(&vrchat, "VRChat-Client-"),
            Some(EndpointAddress::new("192.168.1.40", 9000).unwrap())
        );
        assert_eq!(endpoint_from(&other, "VRChat-Client-"), None);
    }
}
