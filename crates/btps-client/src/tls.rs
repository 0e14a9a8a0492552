//! TLS client configuration
//!
//! Builds the rustls client config from the passthrough [`TlsOptions`]:
//! webpki roots plus any extra PEM roots, optional mutual-TLS client
//! identity, and, when `reject_unauthorized` is off, a verifier that
//! accepts any server certificate (self-signed deployments and tests).

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::TlsConnector;

use crate::error::{ClientError, ClientResult};
use crate::options::TlsOptions;

/// Build a [`TlsConnector`] from the client's TLS options.
pub(crate) fn build_connector(tls: &TlsOptions) -> ClientResult<TlsConnector> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    for pem in &tls.extra_roots_pem {
        for cert in rustls_pemfile::certs(&mut pem.as_bytes()) {
            let cert = cert.map_err(|e| ClientError::Tls(format!("root certificate: {}", e)))?;
            roots
                .add(cert)
                .map_err(|e| ClientError::Tls(format!("root certificate: {}", e)))?;
        }
    }

    let builder = rustls::ClientConfig::builder().with_root_certificates(roots);

    let mut config = match (&tls.client_cert_pem, &tls.client_key_pem) {
        (Some(cert_pem), Some(key_pem)) => {
            let certs: Vec<CertificateDer<'static>> =
                rustls_pemfile::certs(&mut cert_pem.as_bytes())
                    .collect::<Result<_, _>>()
                    .map_err(|e| ClientError::Tls(format!("client certificate: {}", e)))?;
            let key = rustls_pemfile::private_key(&mut key_pem.expose_secret().as_bytes())
                .map_err(|e| ClientError::Tls(format!("client key: {}", e)))?
                .ok_or_else(|| ClientError::Tls("client key PEM holds no key".to_string()))?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| ClientError::Tls(format!("client auth: {}", e)))?
        }
        _ => builder.with_no_client_auth(),
    };

    if !tls.reject_unauthorized {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyServerCert));
    }

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Parse the dial host into a TLS server name.
pub(crate) fn server_name(host: &str) -> ClientResult<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|_| ClientError::Resolver(btps_resolver::ResolverError::InvalidHostname(
            host.to_string(),
        )))
}

/// Verifier that accepts every server certificate. Installed only when
/// `reject_unauthorized` is explicitly disabled.
#[derive(Debug)]
struct AcceptAnyServerCert;

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
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
