//! DNS-over-TLS exchange with the upstream.

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::tcp::exchange_over;
use crate::error::{Error, Result};

/// Client connector verifying the upstream against the webpki roots.
pub(super) fn connector() -> Result<TlsConnector> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Tls(e.to_string()))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Host part of a `host:port` address, without IPv6 brackets.
fn host(addr: &str) -> &str {
    let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}

pub(super) async fn exchange(
    connector: &TlsConnector,
    server: SocketAddr,
    addr: &str,
    query: &[u8],
) -> Result<Vec<u8>> {
    let server_name = ServerName::try_from(host(addr).to_string())
        .map_err(|e| Error::Tls(format!("invalid server name {:?}: {}", host(addr), e)))?;

    let stream = TcpStream::connect(server).await?;
    stream.set_nodelay(true)?;
    let mut stream = connector
        .connect(server_name, stream)
        .await
        .map_err(|e| Error::Tls(format!("handshake with {} failed: {}", addr, e)))?;

    exchange_over(&mut stream, query).await
}
