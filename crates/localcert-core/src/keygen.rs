//! Key pair and self-signed certificate generation.
//!
//! Keys are ECDSA on P-256. The certificate is a TLS server leaf signed by its
//! own key: issuer == subject, key usage `digitalSignature | keyEncipherment`,
//! extended key usage `serverAuth`, basic constraints present with `cA = false`.

use p256::pkcs8::{DecodePrivateKey, LineEnding};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, SanType, SerialNumber, PKCS_ECDSA_P256_SHA256,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::error::{CertError, Result};

/// PEM-encoded output of one generation.
///
/// Several organization names end up in a single `O` attribute joined with
/// `", "`, so parsing the certificate yields one merged name rather than the
/// original list.
#[derive(Debug, Clone)]
pub struct GeneratedPair {
    /// `CERTIFICATE` block.
    pub certificate_pem: String,
    /// `EC PRIVATE KEY` block (SEC1).
    pub private_key_pem: String,
    /// Start of the validity window.
    pub not_before: OffsetDateTime,
    /// End of the validity window.
    pub not_after: OffsetDateTime,
}

/// Produces a fresh key and a certificate over it on every call.
#[derive(Debug, Clone, Copy)]
pub struct KeyPairGenerator {
    validity_days: u32,
}

impl KeyPairGenerator {
    /// Generator whose certificates are valid for `validity_days` from now.
    pub const fn new(validity_days: u32) -> Self {
        Self { validity_days }
    }

    /// Generate a key pair and a self-signed certificate binding it to
    /// `organization_names` and `dns_names`.
    ///
    /// An empty organization list leaves the subject empty. An empty DNS list
    /// omits the subject alternative name extension, which most TLS clients
    /// will refuse for hostname verification; this is logged, not rejected.
    pub fn generate(
        &self,
        organization_names: &[String],
        dns_names: &[String],
    ) -> Result<GeneratedPair> {
        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| CertError::KeyGeneration(e.to_string()))?;

        let mut params = CertificateParams::default();

        // Constant placeholder serial.
        params.serial_number = Some(SerialNumber::from_slice(&[1]));

        let mut dn = DistinguishedName::new();
        if !organization_names.is_empty() {
            // rcgen keeps one value per attribute type, so several names share one O attribute.
            dn.push(DnType::OrganizationName, organization_names.join(", "));
        }
        params.distinguished_name = dn;

        if dns_names.is_empty() {
            warn!("no DNS names given, certificate will carry no subject alternative names");
        }
        params.subject_alt_names = dns_names
            .iter()
            .map(|name| {
                name.clone()
                    .try_into()
                    .map(SanType::DnsName)
                    .map_err(|e| {
                        CertError::CertificateCreation(format!("invalid DNS name '{name}': {e}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let not_before = OffsetDateTime::now_utc();
        let not_after = not_before
            .checked_add(Duration::days(i64::from(self.validity_days)))
            .ok_or_else(|| {
                CertError::CertificateCreation(format!(
                    "validity of {} days ends past the latest representable date",
                    self.validity_days
                ))
            })?;
        params.not_before = not_before;
        params.not_after = not_after;

        params.key_usages = vec![
            KeyUsagePurpose::KeyEncipherment,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        params.is_ca = IsCa::ExplicitNoCa;

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| CertError::CertificateCreation(e.to_string()))?;

        let private_key_pem = encode_sec1(&key_pair)?;

        debug!(
            organizations = organization_names.len(),
            dns_names = dns_names.len(),
            %not_after,
            "generated self-signed certificate"
        );

        Ok(GeneratedPair {
            certificate_pem: cert.pem(),
            private_key_pem,
            not_before,
            not_after,
        })
    }
}

/// Re-encode rcgen's PKCS#8 key as a SEC1 `EC PRIVATE KEY` block.
fn encode_sec1(key_pair: &KeyPair) -> Result<String> {
    let secret = p256::SecretKey::from_pkcs8_der(&key_pair.serialize_der())
        .map_err(|e| CertError::KeyEncoding(e.to_string()))?;
    let pem = secret
        .to_sec1_pem(LineEnding::LF)
        .map_err(|e| CertError::KeyEncoding(e.to_string()))?;
    Ok(pem.as_str().to_owned())
}
