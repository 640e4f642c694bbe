//! dnsfwd - A DNS forwarding filter.
//!
//! Listens on one or more local transports, admits queries whose names fall
//! under a configured set of domain suffixes and relays them to a single
//! upstream resolver, directly or through a SOCKS5 tunnel.

pub mod config;
pub mod dns;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod resolver;
pub mod transport;
pub mod upstream;

pub use config::{Args, ProxyConfig};
pub use error::{Error, Result};
