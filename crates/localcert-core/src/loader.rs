//! Load a certificate/key PEM pair into a rustls server configuration.
//!
//! Accepted input is exactly one or more `CERTIFICATE` blocks plus one
//! `EC PRIVATE KEY` block on P-256 whose public half matches the leaf.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::ring::{cipher_suite, default_provider, kx_group};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;

use crate::error::{CertError, Result};
use crate::inspect::public_key_matches;

/// ALPN protocol announced by [`server_config`].
pub const ALPN_HTTP1: &[u8] = b"http/1.1";

/// A validated certificate chain and its private key.
#[derive(Debug)]
pub struct TlsIdentity {
    /// Leaf first.
    pub certificates: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
}

impl Clone for TlsIdentity {
    fn clone(&self) -> Self {
        Self {
            certificates: self.certificates.clone(),
            private_key: self.private_key.clone_key(),
        }
    }
}

/// Parse and validate a PEM certificate chain and EC private key.
pub fn load_identity(certificate_pem: &[u8], private_key_pem: &[u8]) -> Result<TlsIdentity> {
    let certificates = CertificateDer::pem_slice_iter(certificate_pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CertError::Load(format!("invalid certificate PEM: {e:?}")))?;
    let Some(leaf) = certificates.first() else {
        return Err(CertError::Load("no CERTIFICATE block found".into()));
    };

    let private_key = PrivateKeyDer::from_pem_slice(private_key_pem)
        .map_err(|e| CertError::Load(format!("invalid private key PEM: {e:?}")))?;
    let sec1 = match &private_key {
        PrivateKeyDer::Sec1(sec1) => sec1,
        PrivateKeyDer::Pkcs8(_) => {
            return Err(CertError::Load(
                "expected an EC PRIVATE KEY block, found PKCS#8 PRIVATE KEY".into(),
            ))
        }
        PrivateKeyDer::Pkcs1(_) => {
            return Err(CertError::Load(
                "expected an EC PRIVATE KEY block, found RSA PRIVATE KEY".into(),
            ))
        }
        _ => return Err(CertError::Load("unsupported private key type".into())),
    };

    let secret = p256::SecretKey::from_sec1_der(sec1.secret_sec1_der())
        .map_err(|_| CertError::Load("private key is not an ECDSA P-256 key".into()))?;

    let (_, cert) = x509_parser::parse_x509_certificate(leaf)
        .map_err(|e| CertError::Load(format!("invalid certificate: {e}")))?;
    if !public_key_matches(&cert, &secret) {
        return Err(CertError::Load(
            "private key does not match the certificate".into(),
        ));
    }

    debug!(chain = certificates.len(), "loaded certificate and EC key");
    Ok(TlsIdentity {
        certificates,
        private_key,
    })
}

/// Read both files, then [`load_identity`].
pub fn load_identity_from_files(certificate_path: &Path, key_path: &Path) -> Result<TlsIdentity> {
    let read = |path: &Path| {
        std::fs::read(path)
            .map_err(|e| CertError::Load(format!("cannot read '{}': {e}", path.display())))
    };
    load_identity(&read(certificate_path)?, &read(key_path)?)
}

/// ring provider restricted to the TLS 1.3 AEAD suites and X25519.
pub fn crypto_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: vec![
            cipher_suite::TLS13_AES_128_GCM_SHA256,
            cipher_suite::TLS13_AES_256_GCM_SHA384,
            cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
        ],
        kx_groups: vec![kx_group::X25519],
        ..default_provider()
    }
}

/// TLS 1.3-only server configuration presenting `identity`.
pub fn server_config(identity: TlsIdentity) -> Result<rustls::ServerConfig> {
    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(crypto_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| CertError::Load(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(identity.certificates, identity.private_key)
        .map_err(|e| CertError::Load(e.to_string()))?;
    config.alpn_protocols = vec![ALPN_HTTP1.to_vec()];
    Ok(config)
}
