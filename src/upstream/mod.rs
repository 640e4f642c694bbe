//! Upstream exchange.
//!
//! Sends one admitted query to the configured upstream resolver and returns
//! its raw answer. Two mutually exclusive paths:
//! - direct, over the configured upstream transport (UDP, TCP or TCP+TLS)
//! - tunneled through a SOCKS5 proxy, which always uses plain TCP
//!
//! Every exchange is a single attempt bounded by the configured timeout, and
//! every connection it opens is dropped before it returns.

mod socks;
mod tcp;
mod tls;
mod udp;

use std::net::SocketAddr;
use std::time::Duration;

use tokio_rustls::TlsConnector;

use crate::config::ProxyConfig;
use crate::dns;
use crate::error::{Error, Result};
use crate::transport::{Protocol, Transport};

/// Maximum UDP response size accepted from the upstream.
pub const MAX_UDP_RESPONSE_SIZE: usize = 0xffff;

/// Client side of the relay.
pub struct Upstream {
    addr: String,
    transport: Transport,
    timeout: Duration,
    socks5: Option<SocketAddr>,
    tls: Option<TlsConnector>,
}

impl Upstream {
    /// Build the exchanger for a configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let tls = if config.upstream_transport.tls && config.socks5.is_none() {
            Some(tls::connector()?)
        } else {
            None
        };

        Ok(Self {
            addr: config.upstream.clone(),
            transport: config.upstream_transport,
            timeout: config.timeout,
            socks5: config.socks5,
            tls,
        })
    }

    /// The upstream address as configured (`host:port`).
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Exchange a raw query with the upstream and return the raw response.
    pub async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>> {
        let id = dns::message_id(query)
            .ok_or(Error::Malformed("query shorter than a DNS header"))?;

        let response = tokio::time::timeout(self.timeout, self.exchange_once(query, id))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        match dns::message_id(&response) {
            Some(got) if got == id => Ok(response),
            Some(got) => Err(Error::IdMismatch { expected: id, got }),
            None => Err(Error::Malformed("response shorter than a DNS header")),
        }
    }

    async fn exchange_once(&self, query: &[u8], id: u16) -> Result<Vec<u8>> {
        if let Some(proxy) = self.socks5 {
            return socks::exchange(proxy, &self.addr, query).await;
        }

        let server = self.resolve().await?;
        match (self.transport.protocol, &self.tls) {
            (Protocol::Udp, _) => udp::exchange(server, query, id).await,
            (Protocol::Tcp, None) => tcp::exchange(server, query).await,
            (Protocol::Tcp, Some(connector)) => {
                tls::exchange(connector, server, &self.addr, query).await
            }
        }
    }

    /// Resolve the upstream to the first address allowed by the transport's family.
    async fn resolve(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host(self.addr.as_str())
            .await?
            .find(|addr| self.transport.family.accepts(addr))
            .ok_or_else(|| Error::Resolve(format!("{} ({})", self.addr, self.transport)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::tests::query_for;
    use tokio::net::UdpSocket;

    fn config(upstream: String, transport: Transport, timeout: Duration) -> ProxyConfig {
        ProxyConfig {
            upstream,
            upstream_transport: transport,
            timeout,
            ..ProxyConfig::default()
        }
    }

    #[tokio::test]
    async fn udp_exchange_times_out_against_silent_upstream() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap().to_string();
        let upstream =
            Upstream::new(&config(addr, Transport::UDP, Duration::from_millis(200))).unwrap();
        let query = dns::to_bytes(&query_for(1, &["example.com."])).unwrap();

        let err = upstream.exchange(&query).await.unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn tcp_exchange_fails_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let upstream =
            Upstream::new(&config(addr, Transport::TCP, Duration::from_secs(2))).unwrap();
        let query = dns::to_bytes(&query_for(1, &["example.com."])).unwrap();

        assert!(upstream.exchange(&query).await.is_err());
    }

    #[tokio::test]
    async fn family_mismatch_is_a_resolve_error() {
        let transport: Transport = "udp6".parse().unwrap();
        let upstream = Upstream::new(&config(
            "127.0.0.1:53".into(),
            transport,
            Duration::from_secs(1),
        ))
        .unwrap();
        let query = dns::to_bytes(&query_for(1, &["example.com."])).unwrap();

        assert!(matches!(upstream.exchange(&query).await, Err(Error::Resolve(_))));
    }

    #[tokio::test]
    async fn mismatched_tcp_response_id_is_rejected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let query = crate::transport::tcp::read_message(&mut stream).await.unwrap().unwrap();
            let mut response = query.clone();
            dns::set_message_id(&mut response, 0xFFFF);
            crate::transport::tcp::write_message(&mut stream, &response).await.unwrap();
        });
        let upstream =
            Upstream::new(&config(addr, Transport::TCP, Duration::from_secs(2))).unwrap();
        let query = dns::to_bytes(&query_for(9, &["example.com."])).unwrap();

        let err = upstream.exchange(&query).await.unwrap_err();

        assert!(matches!(err, Error::IdMismatch { expected: 9, got: 0xFFFF }));
    }
}
