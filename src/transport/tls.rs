//! TLS material for the `*-tls` listeners.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, private_key};
use tokio_rustls::TlsAcceptor;

use crate::error::{Error, Result};

/// Build a TLS acceptor from a PEM certificate chain and private key.
pub fn load_acceptor(cert_path: Option<&Path>, key_path: Option<&Path>) -> Result<TlsAcceptor> {
    let (Some(cert_path), Some(key_path)) = (cert_path, key_path) else {
        return Err(Error::Tls(
            "TLS listeners need both --tls-cert and --tls-key".into(),
        ));
    };

    let mut cert_reader = BufReader::new(File::open(cert_path).map_err(|e| {
        Error::Tls(format!("cannot open certificate {}: {}", cert_path.display(), e))
    })?);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| {
            Error::Tls(format!("cannot parse certificates in {}: {}", cert_path.display(), e))
        })?;
    if cert_chain.is_empty() {
        return Err(Error::Tls(format!("no certificates in {}", cert_path.display())));
    }

    let mut key_reader = BufReader::new(File::open(key_path).map_err(|e| {
        Error::Tls(format!("cannot open private key {}: {}", key_path.display(), e))
    })?);
    let key: PrivateKeyDer<'static> = private_key(&mut key_reader)
        .map_err(|e| Error::Tls(format!("cannot parse private key in {}: {}", key_path.display(), e)))?
        .ok_or_else(|| Error::Tls(format!("no private key in {}", key_path.display())))?;

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Tls(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(cert_chain, key)
    .map_err(|e| Error::Tls(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
