//! Error types for the certificate lifecycle.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for certificate lifecycle operations.
pub type Result<T> = std::result::Result<T, CertError>;

/// Errors raised by the individual lifecycle steps.
#[derive(Error, Debug)]
pub enum CertError {
    /// Randomness source or curve operation failed while creating the key pair.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Building or self-signing the certificate failed.
    #[error("certificate creation failed: {0}")]
    CertificateCreation(String),

    /// The private key could not be serialized.
    #[error("private key encoding failed: {0}")]
    KeyEncoding(String),

    /// A working or archive directory could not be listed or created.
    #[error("cannot access directory '{}': {source}", path.display())]
    DirectoryAccess {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Renaming an artifact into the archive failed.
    #[error("failed to move '{}' to '{}': {source}", from.display(), to.display())]
    FileMove {
        /// Source path in the working directory.
        from: PathBuf,
        /// Destination path in the archive.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The archive already holds a file with the destination name.
    #[error("archive already contains '{}'", path.display())]
    ArchiveCollision {
        /// Existing archive entry.
        path: PathBuf,
    },

    /// The oldest archive entry could not be deleted. Reported, never fatal.
    #[error("failed to evict '{}': {source}", path.display())]
    Eviction {
        /// Entry selected for eviction.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// One of the artifact writes failed.
    #[error("failed to write {artifact} to '{}': {source}", path.display())]
    Persistence {
        /// Which artifact was being written.
        artifact: ArtifactKind,
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Removing stale trust-store entries for an organization failed.
    #[error("failed to remove trust-store entries for '{name}': {reason}")]
    TrustStoreRemoval {
        /// Organization name used as subject substring.
        name: String,
        /// Exit status and combined command output.
        reason: String,
    },

    /// The trust-store import command failed.
    #[error("failed to import '{}' into the trust store: {reason}, output: {output}", path.display())]
    TrustStoreImport {
        /// Trust bundle that was being imported.
        path: PathBuf,
        /// Exit status or spawn failure.
        reason: String,
        /// Combined stdout and stderr of the command.
        output: String,
    },

    /// No trust-store facility exists on this platform.
    #[error("trust-store installation is not implemented on {platform}")]
    TrustStoreUnsupported {
        /// Target operating system.
        platform: &'static str,
    },

    /// Configuration file is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A certificate/key pair was rejected by the loader or inspector.
    #[error("failed to load certificate: {0}")]
    Load(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CertError {
    /// Returns false for failures that are reported but do not abort a run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Eviction { .. })
    }

    /// Captured command output, for trust-store failures.
    #[must_use]
    pub fn command_output(&self) -> Option<&str> {
        match self {
            Self::TrustStoreImport { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// The four files written by the artifact writer plus the trust bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `<base>_<timestamp>.crt`
    TimestampedCertificate,
    /// `<base>_<timestamp>.key`
    TimestampedKey,
    /// `<base>.crt`
    CurrentCertificate,
    /// `<base>.key`
    CurrentKey,
    /// `<base>_ca_<timestamp>.pem`
    TrustBundle,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TimestampedCertificate => "timestamped certificate",
            Self::TimestampedKey => "timestamped private key",
            Self::CurrentCertificate => "current certificate",
            Self::CurrentKey => "current private key",
            Self::TrustBundle => "trust bundle",
        };
        f.write_str(label)
    }
}

/// Lifecycle steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Key pair and certificate creation.
    Generate,
    /// Moving prior artifacts into the archive and enforcing the cap.
    RotateOldArtifacts,
    /// Persisting the timestamped and current pair, plus the read-back check.
    WriteArtifacts,
    /// Replacing the trusted root in the user's trust store.
    ReconcileTrustStore,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Generate => "generate",
            Self::RotateOldArtifacts => "rotate old artifacts",
            Self::WriteArtifacts => "write artifacts",
            Self::ReconcileTrustStore => "reconcile trust store",
        };
        f.write_str(label)
    }
}

/// First fatal error of a lifecycle run, tagged with the step that raised it.
#[derive(Error, Debug)]
#[error("{stage} step failed: {source}")]
pub struct LifecycleError {
    /// Step that failed.
    pub stage: Stage,
    /// Underlying cause.
    #[source]
    pub source: CertError,
}

impl LifecycleError {
    pub(crate) fn at(stage: Stage) -> impl FnOnce(CertError) -> Self {
        move |source| Self { stage, source }
    }
}
