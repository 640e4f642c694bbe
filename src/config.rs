//! Command line flags and the immutable relay configuration built from them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::filter::Allowlist;
use crate::transport::Transport;

/// Exchange timeout used when `--timeout` is not given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Fixed SOCKS5 proxy endpoint enabled by `-s`.
pub const SOCKS5_PROXY: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
    1080,
);

/// Version embedded at build time through `DNSFWD_VERSION`, if any.
pub fn version_string() -> String {
    match option_env!("DNSFWD_VERSION") {
        Some(version) if !version.is_empty() => format!("dnsfwd {}", version),
        _ => "dnsfwd UNTAGGED LOCAL BUILD".to_string(),
    }
}

#[derive(Parser, Debug)]
#[command(name = "dnsfwd")]
#[command(about = "DNS forwarding filter", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Domain suffixes to admit, comma separated (empty admits everything)
    #[arg(short = 'd', default_value = "")]
    pub domains: String,

    /// Upstream server to send requests to (host:port, port required)
    #[arg(short = 'u', default_value = "127.0.0.1:5353")]
    pub upstream: String,

    /// Local address to listen on
    #[arg(short = 'l', default_value = "0.0.0.0:53")]
    pub listen: String,

    /// Local transports, comma separated (udp, udp4, udp6, tcp, tcp4, tcp6, tcp-tls, tcp4-tls, tcp6-tls)
    #[arg(short = 't', default_value = "tcp,udp")]
    pub transports: String,

    /// Transport to use for the upstream
    #[arg(long = "ut", default_value = "udp")]
    pub upstream_transport: String,

    /// Path of the log file
    #[arg(long = "of", default_value = "dnsfwd.log")]
    pub log_path: PathBuf,

    /// Also write log output to the log file
    #[arg(short = 'o')]
    pub log_file: bool,

    /// Log every admitted and rejected query
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Tunnel upstream queries through the SOCKS5 proxy at 127.0.0.1:1080 (forces TCP)
    #[arg(short = 's')]
    pub socks: bool,

    /// Log full upstream responses
    #[arg(long)]
    pub full: bool,

    /// Exchange timeout in seconds [default: 2]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// PEM certificate chain for the *-tls listeners
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for the *-tls listeners
    #[arg(long)]
    pub tls_key: Option<PathBuf>,

    /// Show version and exit
    #[arg(long)]
    pub version: bool,
}

/// Relay configuration.
///
/// Built once at startup and shared read-only by every listener and query task.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Admitted domain suffixes.
    pub allowlist: Allowlist,
    /// Upstream resolver as `host:port`.
    pub upstream: String,
    /// Local address every transport binds.
    pub bind_addr: SocketAddr,
    /// Local transports, in start order.
    pub transports: Vec<Transport>,
    pub upstream_transport: Transport,
    /// SOCKS5 proxy to tunnel through, when enabled.
    pub socks5: Option<SocketAddr>,
    pub timeout: Duration,
    pub verbose: bool,
    pub full: bool,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allowlist: Allowlist::default(),
            upstream: "127.0.0.1:5353".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 53)),
            transports: vec![Transport::TCP, Transport::UDP],
            upstream_transport: Transport::UDP,
            socks5: None,
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
            full: false,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl TryFrom<&Args> for ProxyConfig {
    type Error = Error;

    fn try_from(args: &Args) -> Result<Self> {
        validate_upstream(&args.upstream)?;

        let bind_addr = args
            .listen
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address {:?}: {}", args.listen, e)))?;

        let transports = Transport::parse_list(&args.transports)?;
        if transports.is_empty() {
            return Err(Error::Config("no transports configured".into()));
        }

        let timeout = match args.timeout {
            Some(0) => return Err(Error::Config("timeout must be at least one second".into())),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            allowlist: Allowlist::parse(&args.domains)?,
            upstream: args.upstream.trim().to_string(),
            bind_addr,
            transports,
            upstream_transport: args.upstream_transport.parse()?,
            socks5: args.socks.then_some(SOCKS5_PROXY),
            timeout,
            verbose: args.verbose,
            full: args.full,
            tls_cert: args.tls_cert.clone(),
            tls_key: args.tls_key.clone(),
        })
    }
}

/// The upstream must be `host:port` with a numeric port; IPv6 hosts need brackets.
fn validate_upstream(upstream: &str) -> Result<()> {
    let invalid = |why: &str| Error::Config(format!("invalid upstream {:?}: {}", upstream, why));

    let (host, port) = upstream
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(invalid("IPv6 hosts must be bracketed"));
    }
    port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["dnsfwd"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_documented_flags() {
        let config = ProxyConfig::try_from(&args(&[])).unwrap();

        assert!(config.allowlist.is_empty());
        assert_eq!(config.upstream, "127.0.0.1:5353");
        assert_eq!(config.bind_addr, "0.0.0.0:53".parse().unwrap());
        assert_eq!(config.transports, vec![Transport::TCP, Transport::UDP]);
        assert_eq!(config.upstream_transport, Transport::UDP);
        assert_eq!(config.socks5, None);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(!config.verbose && !config.full);
    }

    #[test]
    fn parses_every_flag() {
        let config = ProxyConfig::try_from(&args(&[
            "-d", "example.com,corp.internal",
            "-u", "dns.example:853",
            "-l", "127.0.0.1:5300",
            "-t", "udp4,tcp4-tls",
            "--ut", "tcp-tls",
            "-v", "-s", "--full",
            "--timeout", "5",
            "--tls-cert", "cert.pem",
            "--tls-key", "key.pem",
        ]))
        .unwrap();

        assert_eq!(config.allowlist.len(), 2);
        assert_eq!(config.upstream, "dns.example:853");
        assert_eq!(config.bind_addr.port(), 5300);
        assert_eq!(config.transports.len(), 2);
        assert!(config.upstream_transport.tls);
        assert_eq!(config.socks5, Some(SOCKS5_PROXY));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.verbose && config.full);
        assert_eq!(config.tls_cert, Some(PathBuf::from("cert.pem")));
    }

    #[test]
    fn explicit_default_timeout_equals_omitted_timeout() {
        let explicit = ProxyConfig::try_from(&args(&["--timeout", "2"])).unwrap();

        assert_eq!(explicit.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn rejects_upstream_without_port() {
        for upstream in ["127.0.0.1", "dns.example:", ":53", "::1:53", "host:port"] {
            let err = ProxyConfig::try_from(&args(&["-u", upstream])).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{upstream}");
        }
        assert!(ProxyConfig::try_from(&args(&["-u", "[::1]:53"])).is_ok());
    }

    #[test]
    fn rejects_bad_transports_bind_and_timeout() {
        assert!(ProxyConfig::try_from(&args(&["-t", "quic"])).is_err());
        assert!(ProxyConfig::try_from(&args(&["-t", ","])).is_err());
        assert!(ProxyConfig::try_from(&args(&["--ut", "carrier-pigeon"])).is_err());
        assert!(ProxyConfig::try_from(&args(&["-l", "localhost"])).is_err());
        assert!(ProxyConfig::try_from(&args(&["--timeout", "0"])).is_err());
    }

    #[test]
    fn version_string_names_the_binary() {
        assert!(version_string().starts_with("dnsfwd "));
    }
}
