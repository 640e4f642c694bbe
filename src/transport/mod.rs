//! Transport layer implementations for the DNS relay.
//!
//! Provides UDP and TCP (optionally TLS-wrapped) listeners for receiving DNS
//! queries from clients, plus the transport identifiers shared with the
//! upstream side.

pub mod tcp;
pub mod tls;
pub mod udp;

/// Maximum size of an inbound DNS query (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use hickory_proto::op::Message;

use crate::error::Error;

/// Transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Address family restriction carried by the `4`/`6` network names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    /// Whether `addr` may be used under this restriction.
    pub fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

/// A DNS network identifier such as `udp`, `tcp6` or `tcp4-tls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    pub protocol: Protocol,
    pub family: Family,
    pub tls: bool,
}

const NAMES: [(&str, Transport); 9] = [
    ("udp", Transport::new(Protocol::Udp, Family::Any, false)),
    ("udp4", Transport::new(Protocol::Udp, Family::V4, false)),
    ("udp6", Transport::new(Protocol::Udp, Family::V6, false)),
    ("tcp", Transport::new(Protocol::Tcp, Family::Any, false)),
    ("tcp4", Transport::new(Protocol::Tcp, Family::V4, false)),
    ("tcp6", Transport::new(Protocol::Tcp, Family::V6, false)),
    ("tcp-tls", Transport::new(Protocol::Tcp, Family::Any, true)),
    ("tcp4-tls", Transport::new(Protocol::Tcp, Family::V4, true)),
    ("tcp6-tls", Transport::new(Protocol::Tcp, Family::V6, true)),
];

impl Transport {
    pub const UDP: Transport = Transport::new(Protocol::Udp, Family::Any, false);
    pub const TCP: Transport = Transport::new(Protocol::Tcp, Family::Any, false);

    pub const fn new(protocol: Protocol, family: Family, tls: bool) -> Self {
        Self {
            protocol,
            family,
            tls,
        }
    }

    pub fn as_str(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, t)| *t == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Parse a comma-separated transport list, e.g. `tcp,udp`.
    pub fn parse_list(list: &str) -> Result<Vec<Transport>, Error> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        NAMES
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, t)| *t)
            .ok_or_else(|| Error::Config(format!("unknown transport {:?}", s)))
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logger for per-query relay events, tagged with the listening transport.
#[derive(Debug, Clone, Copy)]
pub struct QueryLogger {
    transport: Transport,
    verbose: bool,
    full: bool,
}

impl QueryLogger {
    pub fn new(transport: Transport, verbose: bool, full: bool) -> Self {
        Self {
            transport,
            verbose,
            full,
        }
    }

    pub fn admitted(&self, domain: &str, from: SocketAddr) {
        if self.verbose {
            tracing::info!(transport = %self.transport, %from, "Query for {}", domain);
        }
    }

    pub fn rejected(&self, domain: &str, from: SocketAddr) {
        if self.verbose {
            tracing::info!(transport = %self.transport, %from, "Rejected query for {}", domain);
        }
    }

    pub fn upstream_error(&self, error: &Error) {
        if self.verbose {
            tracing::warn!(transport = %self.transport, "Error communicating to upstream: {}", error);
        }
    }

    pub fn response(&self, response: &Message) {
        if self.full {
            tracing::info!(transport = %self.transport, "Response:\n{}", response);
        }
    }
}
