//! TLS setup for the daemon socket
//!
//! The daemon serves a certificate issued by the node's own private CA, so
//! the server certificate is not checked against any trust store. The client
//! authenticates with the daemon certificate and key from the node's SSL
//! directory.

use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Build the rustls config presenting the given client identity.
pub(crate) fn client_config(cert_path: &Path, key_path: &Path) -> ClientResult<Arc<ClientConfig>> {
    let certs = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
        .with_client_auth_cert(certs, key)?;

    debug!("Client identity loaded from {}", cert_path.display());
    Ok(Arc::new(config))
}

fn read_pem(path: &Path) -> ClientResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| ClientError::Identity {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn load_certificates(path: &Path) -> ClientResult<Vec<CertificateDer<'static>>> {
    let pem = read_pem(path)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::Identity {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if certs.is_empty() {
        return Err(ClientError::Identity {
            path: path.to_path_buf(),
            message: "no PEM certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> ClientResult<PrivateKeyDer<'static>> {
    let pem = read_pem(path)?;
    PrivateKeyDer::from_pem_slice(&pem).map_err(|e| ClientError::Identity {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Skips chain and hostname validation but still checks handshake
/// signatures against the presented certificate.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_certificate_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("private_daemon.crt");
        let key = dir.path().join("private_daemon.key");

        let err = client_config(&cert, &key).unwrap_err();
        match err {
            ClientError::Identity { path, .. } => assert_eq!(path, cert),
            other => panic!("expected identity error, got {other:?}"),
        }
    }

    #[test]
    fn file_without_certificates_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not PEM").unwrap();

        let err = load_certificates(file.path()).unwrap_err();
        match err {
            ClientError::Identity { message, .. } => {
                assert!(message.contains("no PEM certificates"))
            }
            other => panic!("expected identity error, got {other:?}"),
        }
    }

    #[test]
    fn file_without_private_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
        writeln!(file, "-----END CERTIFICATE-----").unwrap();

        assert!(matches!(
            load_private_key(file.path()),
            Err(ClientError::Identity { .. })
        ));
    }
}
