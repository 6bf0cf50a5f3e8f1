//! UDP sender for chatbox messages.

use std::net::SocketAddr;

use async_trait::async_trait;
use gluco_core::{encode_chatbox_input, EndpointAddress};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::application::ports::{MessageSink, SendError};

/// Sends `/chatbox/input` datagrams from one ephemeral local socket.
pub struct OscSender {
    socket: UdpSocket,
    notify: bool,
}

impl OscSender {
    /// Binds an ephemeral IPv4 socket.
    ///
    /// # Errors
    ///
    /// Returns the bind error if no local port is available.
    pub async fn bind(notify: bool) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self { socket, notify })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Resolves `addr` now, so a fixed host name follows DHCP changes.
    /// IPv4 results are preferred because the socket is bound to IPv4.
    async fn lookup(addr: &EndpointAddress) -> Result<SocketAddr, String> {
        let candidates: Vec<SocketAddr> = tokio::net::lookup_host((addr.host(), addr.port()))
            .await
            .map_err(|e| format!("could not resolve host: {e}"))?
            .collect();
        candidates
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| "host resolved to no addresses".to_string())
    }
}

#[async_trait]
impl MessageSink for OscSender {
    async fn send(&self, text: &str, addr: &EndpointAddress) -> Result<(), SendError> {
        let fail = |reason: String| SendError {
            addr: addr.clone(),
            reason,
        };

        let packet = encode_chatbox_input(text, self.notify).map_err(|e| fail(e.to_string()))?;
        let target = Self::lookup(addr).await.map_err(fail)?;
        let written = self
            .socket
            .send_to(&packet, target)
            .await
            .map_err(|e| fail(e.to_string()))?;

        debug!("wrote {written}-byte OSC datagram to {target}");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{decoder, OscPacket, OscType};

    #[tokio::test]
    async fn test_send_delivers_chatbox_datagram() {
        // Arrange: a local socket standing in for the headset
        let headset = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = headset.local_addr().unwrap().port();
        let sender = OscSender::bind(false).await.unwrap();
        let addr = EndpointAddress::new("127.0.0.1", u32::from(port)).unwrap();

        // Act
        sender.send("BG 120 →", &addr).await.unwrap();
        let mut buf = [0u8; 1024];
        let (len, _) = headset.recv_from(&mut buf).await.unwrap();

        // Assert
        let (_, packet) = decoder::decode_udp(&buf[..len]).unwrap();
        let OscPacket::Message(msg) = packet else {
            panic!("expected a message, got {packet:?}");
        };
        assert_eq!(msg.addr, "/chatbox/input");
        assert_eq!(
            msg.args,
            vec![
                OscType::String("BG 120 →".to_string()),
                OscType::Bool(true),
                OscType::Bool(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_resolves_localhost_name() {
        let headset = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = headset.local_addr().unwrap().port();
        let sender = OscSender::bind(true).await.unwrap();
        let addr = EndpointAddress::new("localhost", u32::from(port)).unwrap();

        sender.send("BG 99", &addr).await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = headset.recv_from(&mut buf).await.unwrap();
        assert!(len > 0);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_send_error() {
        let sender = OscSender::bind(true).await.unwrap();
        let addr = EndpointAddress::new("no-such-host.invalid", 9000).unwrap();

        let err = sender.send("BG 99", &addr).await.unwrap_err();

        assert_eq!(err.addr, addr);
    }
}
