use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

use crate::error::Error;

/// Transport-layer TLS settings, passed through to the connector untouched by
/// the request pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsOptions {
    root_certificates_pem: Vec<Vec<u8>>,
    accept_invalid_certs: bool,
}

impl TlsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trusts the given PEM bundle instead of the bundled web PKI roots.
    pub fn root_ca_pem(mut self, certificate_pem: impl Into<Vec<u8>>) -> Self {
        self.root_certificates_pem.push(certificate_pem.into());
        self
    }

    /// Disables server certificate verification entirely.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn has_custom_roots(&self) -> bool {
        !self.root_certificates_pem.is_empty()
    }
}

pub(crate) fn tls_config_error(message: impl Into<String>) -> Error {
    Error::TlsConfig {
        message: message.into(),
    }
}

fn build_root_store(options: &TlsOptions) -> Result<rustls::RootCertStore, Error> {
    if !options.has_custom_roots() {
        return Ok(rustls::RootCertStore::from_iter(
            webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
        ));
    }

    let mut root_store = rustls::RootCertStore::empty();
    for pem in &options.root_certificates_pem {
        let mut parsed = Vec::new();
        for item in CertificateDer::pem_slice_iter(pem) {
            let certificate = item.map_err(|source| {
                tls_config_error(format!("failed to parse PEM root certificate: {source}"))
            })?;
            parsed.push(certificate);
        }
        if parsed.is_empty() {
            return Err(tls_config_error(
                "no certificate blocks found in PEM root certificate",
            ));
        }
        let (added, _ignored) = root_store.add_parsable_certificates(parsed);
        if added == 0 {
            return Err(tls_config_error("failed to parse PEM root certificate(s)"));
        }
    }
    Ok(root_store)
}

pub(crate) fn build_rustls_config(options: &TlsOptions) -> Result<rustls::ClientConfig, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|source| tls_config_error(source.to_string()))?;

    if options.accept_invalid_certs {
        let verifier = NoVerifier {
            schemes: provider
                .signature_verification_algorithms
                .supported_schemes(),
        };
        return Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth());
    }

    let root_store = build_root_store(options)?;
    Ok(builder
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

#[derive(Debug)]
struct NoVerifier {
    schemes: Vec<SignatureScheme>,
}

impl ServerCertVerifier for NoVerifier {
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
        self.schemes.clone()
    }
}
