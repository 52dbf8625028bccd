//! Certificate pair compiled into the binary.
//!
//! Build with `--features embedded-cert` after placing `localhost.crt` and
//! `localhost.key` in `crates/localcert-cli/certs/`, e.g. with
//! `localcert generate --dir crates/localcert-cli/certs --skip-trust`.

use localcert_core::{load_identity, CertError, Result, TlsIdentity};

#[cfg(feature = "embedded-cert")]
const EMBEDDED: Option<(&[u8], &[u8])> = Some((
    include_bytes!("../certs/localhost.crt"),
    include_bytes!("../certs/localhost.key"),
));

#[cfg(not(feature = "embedded-cert"))]
const EMBEDDED: Option<(&[u8], &[u8])> = None;

/// True when this build carries an embedded pair.
pub const fn is_available() -> bool {
    EMBEDDED.is_some()
}

/// Parse and validate the embedded pair.
pub fn embedded_identity() -> Result<TlsIdentity> {
    let (certificate, key) = EMBEDDED.ok_or_else(|| {
        CertError::Load(
            "no embedded certificate in this build (rebuild with --features embedded-cert \
             or pass --cert and --key)"
                .into(),
        )
    })?;
    load_identity(certificate, key)
}
