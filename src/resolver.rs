//! DNS query handling.
//!
//! Handles the per-query pipeline:
//! 1. Admission (every question must be under an allowed suffix)
//! 2. Relay to the upstream
//! 3. Hand the upstream answer back to the transport
//!
//! Transports handle the actual I/O, the resolver handles decisions. Rejected
//! and failed queries produce no response at all.

use std::net::SocketAddr;

use hickory_proto::op::{Message, MessageType};
use tracing::debug;

use crate::config::ProxyConfig;
use crate::dns;
use crate::error::Result;
use crate::filter::Allowlist;
use crate::transport::{QueryLogger, Transport};
use crate::upstream::Upstream;

/// Action to take for a DNS query.
#[derive(Debug, PartialEq, Eq)]
pub enum QueryAction {
    /// At least one question is outside the allowlist; drop the query.
    Rejected { domain: String },
    /// Every question is admitted; relay the query upstream.
    Forward,
}

/// Resolver holds everything shared by the transports: the allowlist, the
/// upstream exchanger and the logging switches.
pub struct Resolver {
    allowlist: Allowlist,
    upstream: Upstream,
    verbose: bool,
    full: bool,
}

impl Resolver {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        Ok(Self {
            allowlist: config.allowlist.clone(),
            upstream: Upstream::new(config)?,
            verbose: config.verbose,
            full: config.full,
        })
    }

    /// Decide whether a parsed query is admitted.
    ///
    /// The query is rejected as a whole as soon as one question fails.
    pub fn process_query(&self, query: &Message, from: SocketAddr, logger: &QueryLogger) -> QueryAction {
        for question in query.queries() {
            let domain = question.name().to_ascii();
            if !self.allowlist.admits(question.name()) {
                logger.rejected(&domain, from);
                return QueryAction::Rejected { domain };
            }
            logger.admitted(&domain, from);
        }
        QueryAction::Forward
    }

    /// Handle one raw query received on `transport` from `from`.
    ///
    /// Returns the bytes to send back, or `None` when the query is dropped.
    pub async fn handle(&self, query: &[u8], from: SocketAddr, transport: Transport) -> Option<Vec<u8>> {
        let logger = QueryLogger::new(transport, self.verbose, self.full);

        let message = match dns::parse(query) {
            Ok(message) => message,
            Err(e) => {
                debug!(%transport, %from, "dropping unparseable query: {}", e);
                return None;
            }
        };
        if message.message_type() != MessageType::Query {
            debug!(%transport, %from, "dropping non-query message");
            return None;
        }

        if let QueryAction::Rejected { .. } = self.process_query(&message, from, &logger) {
            return None;
        }

        let outbound = match dns::to_bytes(&dns::upstream_query(&message, fastrand::u16(..))) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(%transport, %from, "cannot encode upstream query: {}", e);
                return None;
            }
        };

        let mut response = match self.upstream.exchange(&outbound).await {
            Ok(response) => response,
            Err(e) => {
                logger.upstream_error(&e);
                return None;
            }
        };

        if self.full {
            match dns::parse(&response) {
                Ok(parsed) => logger.response(&parsed),
                Err(e) => debug!(%transport, "cannot parse upstream response for logging: {}", e),
            }
        }

        dns::set_message_id(&mut response, message.id());
        Some(response)
    }

    /// The upstream address queries are relayed to.
    pub fn upstream_addr(&self) -> &str {
        self.upstream.addr()
    }
}
