//! Artifact persistence.
//!
//! Layout inside the working directory:
//!
//! ```text
//! <base>_<timestamp>.crt   timestamped certificate   0644
//! <base>_<timestamp>.key   timestamped private key   0600
//! <base>.crt               current certificate       0644
//! <base>.key               current private key       0600
//! <base>_ca_<timestamp>.pem  trust bundle            0644
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::LifecycleConfig;
use crate::error::{ArtifactKind, CertError, Result};

/// `chrono` format for artifact timestamps: `YYYYMMDD_HHMMSS`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Owner write, world read.
pub const CERT_MODE: u32 = 0o644;
/// Owner only.
pub const KEY_MODE: u32 = 0o600;
/// Owner only.
pub const DIR_MODE: u32 = 0o700;

/// Local wall-clock time formatted with [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Paths produced by one [`ArtifactWriter::write`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub timestamped_certificate: PathBuf,
    pub timestamped_key: PathBuf,
    pub current_certificate: PathBuf,
    pub current_key: PathBuf,
}

/// Writes certificate and key PEM under timestamped and current names.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    working_dir: PathBuf,
    base_name: String,
}

impl ArtifactWriter {
    pub fn new(working_dir: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            base_name: base_name.into(),
        }
    }

    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(config.working_dir.clone(), config.effective_base_name())
    }

    /// `<base>_<timestamp>.<ext>`
    pub fn timestamped_path(&self, timestamp: &str, ext: &str) -> PathBuf {
        self.working_dir
            .join(format!("{}_{timestamp}.{ext}", self.base_name))
    }

    /// `<base>.<ext>`
    pub fn current_path(&self, ext: &str) -> PathBuf {
        self.working_dir.join(format!("{}.{ext}", self.base_name))
    }

    /// `<base>_ca_<timestamp>.pem`
    pub fn trust_bundle_path(&self, timestamp: &str) -> PathBuf {
        self.working_dir
            .join(format!("{}_ca_{timestamp}.pem", self.base_name))
    }

    /// Persist both PEM blocks under the timestamped and the current names.
    ///
    /// Creates the working directory (owner-only) when absent. Writes happen
    /// in order timestamped cert, timestamped key, current cert, current key;
    /// a failure leaves earlier files in place.
    pub fn write(
        &self,
        certificate_pem: &[u8],
        private_key_pem: &[u8],
        timestamp: &str,
    ) -> Result<WrittenArtifacts> {
        ensure_private_dir(&self.working_dir).map_err(|source| CertError::DirectoryAccess {
            path: self.working_dir.clone(),
            source,
        })?;

        let artifacts = WrittenArtifacts {
            timestamped_certificate: self.timestamped_path(timestamp, "crt"),
            timestamped_key: self.timestamped_path(timestamp, "key"),
            current_certificate: self.current_path("crt"),
            current_key: self.current_path("key"),
        };

        let plan = [
            (ArtifactKind::TimestampedCertificate, &artifacts.timestamped_certificate, certificate_pem, CERT_MODE),
            (ArtifactKind::TimestampedKey, &artifacts.timestamped_key, private_key_pem, KEY_MODE),
            (ArtifactKind::CurrentCertificate, &artifacts.current_certificate, certificate_pem, CERT_MODE),
            (ArtifactKind::CurrentKey, &artifacts.current_key, private_key_pem, KEY_MODE),
        ];
        for (artifact, path, contents, mode) in plan {
            write_artifact(artifact, path, contents, mode)?;
        }

        info!(
            certificate = %artifacts.timestamped_certificate.display(),
            key = %artifacts.timestamped_key.display(),
            "certificate and private key written"
        );
        Ok(artifacts)
    }
}

/// Write one artifact with the given Unix mode.
pub(crate) fn write_artifact(
    artifact: ArtifactKind,
    path: &Path,
    contents: &[u8],
    mode: u32,
) -> Result<()> {
    write_with_mode(path, contents, mode).map_err(|source| CertError::Persistence {
        artifact,
        path: path.to_path_buf(),
        source,
    })
}

fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;

    // Existing files keep their old mode on open, so set it explicitly.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

/// Create `path` and missing parents with owner-only access.
pub(crate) fn ensure_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path)
}
