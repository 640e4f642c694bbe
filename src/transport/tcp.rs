//! TCP transport for DNS queries, optionally wrapped in TLS.
//!
//! Each client connection is handled independently. A connection may carry
//! several queries; each is read, relayed and answered in turn. TCP DNS
//! messages are prefixed with a 2-byte length.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use super::Transport;
use crate::error::{Error, Result};
use crate::resolver::Resolver;

/// Idle connections are closed after this long without a query.
const IDLE_TIMEOUT: Duration = Duration::from_secs(8);

/// TCP listener for the relay.
///
/// Accepts connections and handles each one in a separate task.
pub struct TcpTransport {
    listener: TcpListener,
    transport: Transport,
    tls: Option<TlsAcceptor>,
}

impl TcpTransport {
    /// Bind the listener. `tls` must be set for the `*-tls` transports.
    ///
    /// `tcp4`/`tcp6` refuse a bind address of the other family.
    pub async fn bind(addr: SocketAddr, transport: Transport, tls: Option<TlsAcceptor>) -> Result<Self> {
        if !transport.family.accepts(&addr) {
            return Err(Error::Config(format!("{} cannot bind {}", transport, addr)));
        }
        if transport.tls && tls.is_none() {
            return Err(Error::Tls(format!("{} needs a certificate", transport)));
        }
        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            transport,
            tls,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self, resolver: Arc<Resolver>) -> Result<()> {
        loop {
            let (client, peer) = self.listener.accept().await?;
            tokio::spawn(handle_connection(
                client,
                peer,
                self.tls.clone(),
                resolver.clone(),
                self.transport,
            ));
        }
    }
}

async fn handle_connection(
    client: TcpStream,
    peer: SocketAddr,
    tls: Option<TlsAcceptor>,
    resolver: Arc<Resolver>,
    transport: Transport,
) {
    let _ = client.set_nodelay(true);

    match tls {
        None => serve_stream(client, peer, &resolver, transport).await,
        Some(acceptor) => match tokio::time::timeout(IDLE_TIMEOUT, acceptor.accept(client)).await {
            Ok(Ok(stream)) => serve_stream(stream, peer, &resolver, transport).await,
            Ok(Err(e)) => debug!(%transport, %peer, "TLS handshake failed: {}", e),
            Err(_) => debug!(%transport, %peer, "TLS handshake timed out"),
        },
    }
}

/// Answer queries on one connection until the client goes away or idles out.
async fn serve_stream<S>(mut stream: S, peer: SocketAddr, resolver: &Resolver, transport: Transport)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let query = match tokio::time::timeout(IDLE_TIMEOUT, read_message(&mut stream)).await {
            Ok(Ok(Some(query))) => query,
            Ok(Ok(None)) | Err(_) => return,
            Ok(Err(e)) => {
                debug!(%transport, %peer, "TCP read error: {}", e);
                return;
            }
        };

        let Some(response) = resolver.handle(&query, peer, transport).await else {
            continue;
        };
        if let Err(e) = write_message(&mut stream, &response).await {
            debug!(%transport, %peer, "TCP write error: {}", e);
            return;
        }
    }
}

/// Read one length-prefixed DNS message.
///
/// Returns `None` when the peer closed the stream before a new message began.
pub async fn read_message<S>(stream: &mut S) -> io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let mut message = vec![0u8; u16::from_be_bytes(len_buf) as usize];
    stream.read_exact(&mut message).await?;

    Ok(Some(message))
}

/// Write one DNS message with its 2-byte length prefix.
pub async fn write_message<S>(stream: &mut S, message: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let len = u16::try_from(message.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "DNS message exceeds 65535 bytes"))?;

    let mut framed = Vec::with_capacity(message.len() + 2);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(message);
    stream.write_all(&framed).await?;
    stream.flush().await
}
