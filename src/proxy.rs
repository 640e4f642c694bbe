//! DNS relay orchestration.
//!
//! Runs one supervised listener per configured transport. A listener that
//! fails to bind or whose receive loop breaks is restarted after a fixed
//! delay, forever; transports never affect each other.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::resolver::Resolver;
use crate::transport::{Protocol, Transport, tcp::TcpTransport, tls, udp::UdpTransport};

/// Delay between a listener failure and the next start attempt.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Delay between starting consecutive transports.
pub const START_STAGGER: Duration = Duration::from_millis(200);

/// Lifecycle of a transport listener. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Starting,
    Listening,
    Failed,
    Backoff,
}

/// Snapshot published by a listener on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStatus {
    pub state: ListenerState,
    /// Number of failures since the listener was created.
    pub failures: u64,
}

/// A bound socket ready to serve.
enum Bound {
    Udp(UdpTransport),
    Tcp(TcpTransport),
}

impl Bound {
    async fn serve(self, resolver: Arc<Resolver>) -> Result<()> {
        match self {
            Bound::Udp(udp) => udp.serve(resolver).await,
            Bound::Tcp(tcp) => tcp.serve(resolver).await,
        }
    }
}

/// Supervised listener for one transport.
pub struct TransportListener {
    transport: Transport,
    bind_addr: SocketAddr,
    config: Arc<ProxyConfig>,
    status: watch::Sender<ListenerStatus>,
}

impl TransportListener {
    pub fn new(transport: Transport, config: Arc<ProxyConfig>) -> Self {
        let (status, _) = watch::channel(ListenerStatus {
            state: ListenerState::Starting,
            failures: 0,
        });

        Self {
            transport,
            bind_addr: config.bind_addr,
            config,
            status,
        }
    }

    /// Watch the listener's state changes.
    pub fn subscribe(&self) -> watch::Receiver<ListenerStatus> {
        self.status.subscribe()
    }

    /// Run the listener until the process exits.
    pub async fn run(self, resolver: Arc<Resolver>) {
        loop {
            self.set_state(ListenerState::Starting);
            if self.config.verbose {
                info!(
                    transport = %self.transport,
                    "Listening for domains: {}",
                    self.config.allowlist
                );
                info!(transport = %self.transport, "Sending to {}", resolver.upstream_addr());
            }

            let result = match self.bind().await {
                Ok(bound) => {
                    self.set_state(ListenerState::Listening);
                    info!(transport = %self.transport, addr = %self.bind_addr, "listener started");
                    bound.serve(resolver.clone()).await
                }
                Err(e) => Err(e),
            };

            self.status.send_modify(|status| {
                status.state = ListenerState::Failed;
                status.failures += 1;
            });
            match result {
                Ok(()) => warn!(transport = %self.transport, "listener stopped"),
                Err(e) => error!(transport = %self.transport, "error: {}", e),
            }

            self.set_state(ListenerState::Backoff);
            info!(
                transport = %self.transport,
                "Sleeping for {} seconds before retrying...",
                RETRY_DELAY.as_secs()
            );
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }

    async fn bind(&self) -> Result<Bound> {
        match self.transport.protocol {
            Protocol::Udp => Ok(Bound::Udp(
                UdpTransport::bind(self.bind_addr, self.transport).await?,
            )),
            Protocol::Tcp => {
                let acceptor = if self.transport.tls {
                    Some(tls::load_acceptor(
                        self.config.tls_cert.as_deref(),
                        self.config.tls_key.as_deref(),
                    )?)
                } else {
                    None
                };
                Ok(Bound::Tcp(
                    TcpTransport::bind(self.bind_addr, self.transport, acceptor).await?,
                ))
            }
        }
    }

    fn set_state(&self, state: ListenerState) {
        debug!(transport = %self.transport, ?state, "listener state");
        self.status.send_modify(|status| status.state = state);
    }
}

/// Run the DNS relay with the given configuration.
///
/// Starts one listener per configured transport, staggered by
/// [`START_STAGGER`], and runs indefinitely.
pub async fn run(config: ProxyConfig) -> Result<()> {
    if config.transports.is_empty() {
        return Err(Error::Config("no transports configured".into()));
    }

    let config = Arc::new(config);
    let resolver = Arc::new(Resolver::new(&config)?);

    info!(
        addr = %config.bind_addr,
        upstream = %config.upstream,
        suffixes = config.allowlist.len(),
        socks5 = ?config.socks5,
        "DNS relay starting"
    );

    let mut listeners = Vec::with_capacity(config.transports.len());
    for (i, transport) in config.transports.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(START_STAGGER).await;
        }
        let listener = TransportListener::new(*transport, config.clone());
        listeners.push(tokio::spawn(listener.run(resolver.clone())));
    }

    for result in futures::future::join_all(listeners).await {
        if let Err(e) = result {
            error!("listener task ended: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket;

    #[tokio::test(start_paused = true)]
    async fn bind_failures_retry_every_five_seconds() {
        let blocker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = Arc::new(ProxyConfig {
            bind_addr: blocker.local_addr().unwrap(),
            transports: vec![Transport::UDP],
            ..ProxyConfig::default()
        });
        let resolver = Arc::new(Resolver::new(&config).unwrap());
        let listener = TransportListener::new(Transport::UDP, config);
        let status = listener.subscribe();

        let task = tokio::spawn(listener.run(resolver));
        tokio::time::sleep(Duration::from_secs(12)).await;

        let snapshot = *status.borrow();
        assert_eq!(snapshot.failures, 3);
        assert_eq!(snapshot.state, ListenerState::Backoff);
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn healthy_listener_reaches_listening() {
        let config = Arc::new(ProxyConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            transports: vec![Transport::TCP],
            ..ProxyConfig::default()
        });
        let resolver = Arc::new(Resolver::new(&config).unwrap());
        let listener = TransportListener::new(Transport::TCP, config);
        let mut status = listener.subscribe();

        let task = tokio::spawn(listener.run(resolver));
        status
            .wait_for(|s| s.state == ListenerState::Listening)
            .await
            .unwrap();

        assert_eq!(status.borrow().failures, 0);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn tls_listener_without_certificate_keeps_retrying() {
        let transport: Transport = "tcp-tls".parse().unwrap();
        let config = Arc::new(ProxyConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            transports: vec![transport],
            ..ProxyConfig::default()
        });
        let resolver = Arc::new(Resolver::new(&config).unwrap());
        let listener = TransportListener::new(transport, config);
        let status = listener.subscribe();

        let task = tokio::spawn(listener.run(resolver));
        tokio::time::sleep(Duration::from_secs(7)).await;

        assert_eq!(status.borrow().failures, 2);
        task.abort();
    }

    #[tokio::test]
    async fn run_requires_a_transport() {
        let config = ProxyConfig {
            transports: Vec::new(),
            ..ProxyConfig::default()
        };

        assert!(matches!(run(config).await, Err(Error::Config(_))));
    }
}
