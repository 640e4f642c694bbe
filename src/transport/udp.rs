//! UDP transport for DNS queries.
//!
//! Every datagram is handled on its own task so a slow upstream exchange never
//! holds up the receive loop. The reply goes back to the datagram's source.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::debug;

use super::{MAX_DNS_PACKET_SIZE, Transport};
use crate::error::{Error, Result};
use crate::resolver::Resolver;

/// UDP listener for the relay.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    transport: Transport,
}

impl UdpTransport {
    /// Bind the listening socket.
    ///
    /// `udp4`/`udp6` refuse a bind address of the other family.
    pub async fn bind(addr: SocketAddr, transport: Transport) -> Result<Self> {
        if !transport.family.accepts(&addr) {
            return Err(Error::Config(format!("{} cannot bind {}", transport, addr)));
        }
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket, transport })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive queries until the socket fails.
    pub async fn serve(self, resolver: Arc<Resolver>) -> Result<()> {
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let (len, src) = self.socket.recv_from(&mut buf).await?;
            if len < 12 {
                debug!(transport = %self.transport, %src, len, "ignoring short datagram");
                continue;
            }

            let query = buf[..len].to_vec();
            let socket = self.socket.clone();
            let resolver = resolver.clone();
            let transport = self.transport;

            tokio::spawn(async move {
                let Some(response) = resolver.handle(&query, src, transport).await else {
                    return;
                };
                if let Err(e) = socket.send_to(&response, src).await {
                    debug!(%transport, %src, "UDP response error: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn udp4_refuses_an_ipv6_bind_address() {
        let transport: Transport = "udp4".parse().unwrap();

        let result = UdpTransport::bind("[::1]:0".parse().unwrap(), transport).await;

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn second_bind_on_the_same_port_fails() {
        let first = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), Transport::UDP)
            .await
            .unwrap();

        let second = UdpTransport::bind(first.local_addr().unwrap(), Transport::UDP).await;

        assert!(matches!(second, Err(Error::Io(_))));
    }
}
