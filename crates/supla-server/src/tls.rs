//! TLS configuration for the framed protocol and API listeners.
//!
//! Certificates come from the configured PEM files; without them a
//! self-signed certificate is generated so local setups and tests work
//! out of the box.

use std::{path::Path, sync::Arc};

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::ServerError;

/// Certificate chain plus private key, ready to build listener configs.
pub struct TlsMaterial {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsMaterial {
    /// Load PEM files, or self-sign for `localhost` when none are
    /// configured.
    pub fn load(certfile: Option<&Path>, keyfile: Option<&Path>) -> Result<Self, ServerError> {
        match (certfile, keyfile) {
            (Some(cert), Some(key)) => Self::from_pem_files(cert, key),
            _ => Self::self_signed(),
        }
    }

    fn from_pem_files(certfile: &Path, keyfile: &Path) -> Result<Self, ServerError> {
        let cert_pem = std::fs::read(certfile).map_err(|e| {
            ServerError::Config(format!("failed to read cert '{}': {e}", certfile.display()))
        })?;
        let key_pem = std::fs::read(keyfile).map_err(|e| {
            ServerError::Config(format!("failed to read key '{}': {e}", keyfile.display()))
        })?;

        let certs = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;
        let key = rustls_pemfile::private_key(&mut &key_pem[..])
            .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
            .ok_or_else(|| ServerError::Config("no private key found".to_owned()))?;

        Ok(Self { certs, key })
    }

    fn self_signed() -> Result<Self, ServerError> {
        tracing::warn!("no TLS certificate configured; using a self-signed certificate");

        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()])
            .map_err(|e| ServerError::Tls(format!("failed to generate self-signed cert: {e}")))?;

        let certs = vec![cert.cert.der().clone()];
        let key = PrivateKeyDer::Pkcs8(cert.key_pair.serialize_der().into());

        Ok(Self { certs, key })
    }

    /// Build a rustls server config from this material.
    pub fn server_config(&self) -> Result<Arc<rustls::ServerConfig>, ServerError> {
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(self.certs.clone(), self.key.clone_key())
            .map_err(|e| ServerError::Tls(format!("invalid TLS config: {e}")))?;
        Ok(Arc::new(config))
    }
}

/// Install the process-wide rustls crypto provider, once.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
