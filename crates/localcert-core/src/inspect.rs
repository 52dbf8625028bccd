//! Certificate inspection via `x509-parser`.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use ring::digest::{digest, SHA256};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

use crate::error::{CertError, Result};

/// Human-readable view of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    /// Subject distinguished name (RFC 4514 style).
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Organization attributes of the subject, in order. Certificates from
    /// this crate carry one attribute even when several names were configured.
    pub organization_names: Vec<String>,
    /// DNS entries of the subject alternative name extension.
    pub dns_names: Vec<String>,
    /// Serial number (hex).
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// True when issuer and subject encode identically.
    pub self_signed: bool,
    /// SHA-256 over the DER encoding, lowercase hex.
    pub fingerprint: String,
}

impl CertificateSummary {
    /// Returns true if `now` lies inside the validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

/// Parse the first `CERTIFICATE` block of `pem` and summarize it.
pub fn inspect_certificate(pem: &[u8]) -> Result<CertificateSummary> {
    let (_, block) =
        parse_x509_pem(pem).map_err(|e| CertError::Load(format!("invalid PEM: {e}")))?;
    if block.label != "CERTIFICATE" {
        return Err(CertError::Load(format!(
            "expected a CERTIFICATE block, found '{}'",
            block.label
        )));
    }
    let cert = block
        .parse_x509()
        .map_err(|e| CertError::Load(format!("invalid certificate: {e}")))?;
    Ok(summarize(&cert, &block.contents))
}

fn summarize(cert: &X509Certificate<'_>, der: &[u8]) -> CertificateSummary {
    let organization_names = cert
        .subject()
        .iter_organization()
        .filter_map(|attr| attr.as_str().ok())
        .map(String::from)
        .collect();

    let dns_names = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        organization_names,
        dns_names,
        serial: cert.raw_serial_as_string(),
        not_before: asn1_to_utc(cert.validity().not_before),
        not_after: asn1_to_utc(cert.validity().not_after),
        self_signed: cert.subject().as_raw() == cert.issuer().as_raw(),
        fingerprint: sha256_hex(der),
    }
}

/// SHA-256 of raw bytes, lowercase hex.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data).as_ref())
}

/// Returns true if the certificate's subject public key is the public half of `key`.
pub(crate) fn public_key_matches(cert: &X509Certificate<'_>, key: &p256::SecretKey) -> bool {
    let expected = key.public_key().to_encoded_point(false);
    let actual: &[u8] = &cert.public_key().subject_public_key.data;
    actual == expected.as_bytes()
}

/// Convert an ASN.1 time to `DateTime<Utc>`.
fn asn1_to_utc(t: x509_parser::time::ASN1Time) -> DateTime<Utc> {
    Utc.timestamp_opt(t.timestamp(), 0)
        .single()
        .unwrap_or_default()
}
