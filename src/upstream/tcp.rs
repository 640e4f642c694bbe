//! TCP exchange with the upstream.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::transport::tcp::{read_message, write_message};

pub(super) async fn exchange(server: SocketAddr, query: &[u8]) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(server).await?;
    stream.set_nodelay(true)?;

    exchange_over(&mut stream, query).await
}

/// Write one length-prefixed query and read one length-prefixed answer.
pub(super) async fn exchange_over<S>(stream: &mut S, query: &[u8]) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_message(stream, query).await?;

    read_message(stream)
        .await?
        .ok_or(Error::Malformed("upstream closed the connection before answering"))
}
