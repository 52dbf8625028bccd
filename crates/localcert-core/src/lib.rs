//! # localcert-core
//!
//! Self-signed TLS certificates for local development, kept fresh and trusted.
//!
//! One lifecycle run:
//!
//! ```text
//! KeyPairGenerator::generate()        new ECDSA P-256 key + self-signed cert
//!   -> ArchiveRotator::rotate()       move *.crt/*.key/*.pem into old/, cap it
//!   -> ArtifactWriter::write()        timestamped pair + current pair
//!   -> load_identity_from_files()     read back the way a server would
//!   -> TrustStoreReconciler::reconcile()
//!        remove stale roots by organization, write <base>_ca_<ts>.pem, import
//! ```
//!
//! The trust store is reached only through [`TrustStoreInstaller`], so tests
//! and unsupported platforms plug in their own implementation.

pub mod config;
pub mod error;
pub mod inspect;
pub mod keygen;
pub mod lifecycle;
pub mod loader;
pub mod rotate;
pub mod trust;
pub mod writer;

pub use config::{CollisionPolicy, LifecycleConfig};
pub use error::{ArtifactKind, CertError, LifecycleError, Result, Stage};
pub use inspect::{inspect_certificate, CertificateSummary};
pub use keygen::{GeneratedPair, KeyPairGenerator};
pub use lifecycle::{CertificateLifecycleManager, LifecycleReport};
pub use loader::{load_identity, load_identity_from_files, server_config, TlsIdentity};
pub use rotate::{ArchiveRotator, RotationReport};
pub use trust::{
    platform_installer, NoopTrustStore, PowerShellTrustStore, TrustStoreInstaller,
    TrustStoreReconciler, UnsupportedTrustStore,
};
pub use writer::{ArtifactWriter, WrittenArtifacts};
