//! Server-side TLS certificate loading.

use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use crate::config::ServerOptions;
use crate::{Error, Result};

/// Supplies the TLS acceptor used for STARTTLS, STLS and implicit TLS.
pub trait CertificateProvider: Send + Sync {
    /// Returns an acceptor for the configured certificate, or `None` when
    /// no certificate is available.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured certificate or key cannot be loaded.
    fn tls_acceptor(&self, options: &ServerOptions) -> Result<Option<TlsAcceptor>>;
}

/// Loads a PEM certificate chain and private key from the paths in
/// [`ServerOptions`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PemCertificateProvider;

impl CertificateProvider for PemCertificateProvider {
    fn tls_acceptor(&self, options: &ServerOptions) -> Result<Option<TlsAcceptor>> {
        let (Some(cert_path), Some(key_path)) = (
            options.tls_certificate.as_deref(),
            options.tls_certificate_private_key.as_deref(),
        ) else {
            return Ok(None);
        };

        let config = load_server_config(cert_path, key_path)?;
        debug!("Loaded TLS certificate from {}", cert_path.display());
        Ok(Some(TlsAcceptor::from(Arc::new(config))))
    }
}

/// Builds a rustls server configuration from PEM files.
///
/// # Errors
///
/// Returns an error if either file is unreadable or the key does not match.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig> {
    let certs = CertificateDer::pem_file_iter(cert_path)
        .map_err(|e| Error::Certificate(format!("{}: {e}", cert_path.display())))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Certificate(format!("{}: {e}", cert_path.display())))?;
    if certs.is_empty() {
        return Err(Error::Certificate(format!(
            "{}: no certificates found",
            cert_path.display()
        )));
    }

    let key = PrivateKeyDer::from_pem_file(key_path)
        .map_err(|e| Error::Certificate(format!("{}: {e}", key_path.display())))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_no_certificate_configured() {
        let options = ServerOptions::default();
        assert!(PemCertificateProvider.tls_acceptor(&options).unwrap().is_none());
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn test_fixture_certificate_loads() {
        let options = ServerOptions {
            tls_certificate: Some(fixture("cert.pem")),
            tls_certificate_private_key: Some(fixture("key.pem")),
            ..ServerOptions::default()
        };
        assert!(PemCertificateProvider.tls_acceptor(&options).unwrap().is_some());
    }

    #[test]
    fn test_key_is_not_a_certificate() {
        let Err(err) = load_server_config(&fixture("key.pem"), &fixture("key.pem")) else {
            panic!("a key file holds no certificate");
        };
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn test_missing_files_are_errors() {
        let options = ServerOptions {
            tls_certificate: Some("/nonexistent/cert.pem".into()),
            tls_certificate_private_key: Some("/nonexistent/key.pem".into()),
            ..ServerOptions::default()
        };
        let Err(err) = PemCertificateProvider.tls_acceptor(&options) else {
            panic!("missing certificate files should not load");
        };
        assert!(matches!(err, Error::Certificate(_)));
    }
}
