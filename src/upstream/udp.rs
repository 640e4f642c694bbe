//! UDP exchange with the upstream.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::debug;

use super::MAX_UDP_RESPONSE_SIZE;
use crate::dns;
use crate::error::Result;

/// Send `query` from a fresh ephemeral socket and wait for the matching answer.
///
/// Datagrams carrying another id are ignored; the caller bounds the wait.
pub(super) async fn exchange(server: SocketAddr, query: &[u8], id: u16) -> Result<Vec<u8>> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;
    socket.send(query).await?;

    let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
    loop {
        let len = socket.recv(&mut buf).await?;
        if dns::message_id(&buf[..len]) == Some(id) {
            buf.truncate(len);
            return Ok(buf);
        }
        debug!(%server, len, "ignoring stray UDP datagram");
    }
}
