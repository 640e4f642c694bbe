//! Exchange tunneled through a SOCKS5 proxy.

use std::net::SocketAddr;

use tokio_socks::tcp::Socks5Stream;
use tracing::debug;

use super::tcp::exchange_over;
use crate::error::Result;

/// Dial `upstream` through the proxy and run one TCP exchange over the tunnel.
///
/// The tunnel is owned by this call and closed when it returns.
pub(super) async fn exchange(proxy: SocketAddr, upstream: &str, query: &[u8]) -> Result<Vec<u8>> {
    let mut stream = Socks5Stream::connect(proxy, upstream).await?;
    debug!(%proxy, upstream, "SOCKS5 tunnel established");

    exchange_over(&mut stream, query).await
}
