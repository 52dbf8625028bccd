//! Trust-store reconciliation.
//!
//! The lifecycle never shells out itself: every interaction with the
//! operating system's certificate store goes through a
//! [`TrustStoreInstaller`], chosen once at startup by [`platform_installer`].

mod powershell;

pub use powershell::PowerShellTrustStore;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ArtifactKind, CertError, Result};
use crate::writer::{write_artifact, CERT_MODE};

/// Capability to edit the current user's trusted root store.
pub trait TrustStoreInstaller {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    /// Remove every trusted entry whose subject contains any of
    /// `subject_substrings`. Finding nothing is success.
    fn remove(&self, subject_substrings: &[String]) -> Result<()>;

    /// Import the PEM certificate at `path` as a trusted root.
    fn import(&self, path: &Path) -> Result<()>;
}

/// Installer for platforms without a supported trust-store facility.
/// Every operation fails instead of pretending to succeed.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedTrustStore {
    platform: &'static str,
}

impl UnsupportedTrustStore {
    /// Stub for the operating system this binary was built for.
    pub const fn current() -> Self {
        Self {
            platform: std::env::consts::OS,
        }
    }
}

impl TrustStoreInstaller for UnsupportedTrustStore {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn remove(&self, _subject_substrings: &[String]) -> Result<()> {
        Err(CertError::TrustStoreUnsupported {
            platform: self.platform,
        })
    }

    fn import(&self, _path: &Path) -> Result<()> {
        Err(CertError::TrustStoreUnsupported {
            platform: self.platform,
        })
    }
}

/// Installer that does nothing. For runs that only need the files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTrustStore;

impl TrustStoreInstaller for NoopTrustStore {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn remove(&self, _subject_substrings: &[String]) -> Result<()> {
        Ok(())
    }

    fn import(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "skipping trust-store import");
        Ok(())
    }
}

/// Installer for the platform this binary runs on.
pub fn platform_installer() -> Box<dyn TrustStoreInstaller> {
    if cfg!(windows) {
        Box::new(PowerShellTrustStore::default())
    } else {
        Box::new(UnsupportedTrustStore::current())
    }
}

/// Makes the new certificate the only trusted entry for its organizations.
pub struct TrustStoreReconciler {
    installer: Box<dyn TrustStoreInstaller>,
}

impl TrustStoreReconciler {
    pub fn new(installer: Box<dyn TrustStoreInstaller>) -> Self {
        Self { installer }
    }

    /// Name of the underlying installer.
    pub fn installer_name(&self) -> &'static str {
        self.installer.name()
    }

    /// Remove stale entries matching `organization_names`, write
    /// `certificate_pem` to `bundle_path`, then import that file.
    ///
    /// Matching is by subject substring, not fingerprint: any trusted
    /// certificate whose subject contains one of the names is removed.
    /// A removal failure stops before the bundle is written.
    pub fn reconcile(
        &self,
        organization_names: &[String],
        certificate_pem: &[u8],
        bundle_path: &Path,
    ) -> Result<PathBuf> {
        debug!(
            installer = self.installer.name(),
            names = ?organization_names,
            "removing stale trust-store entries"
        );
        self.installer.remove(organization_names)?;

        write_artifact(ArtifactKind::TrustBundle, bundle_path, certificate_pem, CERT_MODE)?;

        self.installer.import(bundle_path)?;
        info!(
            installer = self.installer.name(),
            bundle = %bundle_path.display(),
            "certificate imported into the trust store"
        );
        Ok(bundle_path.to_path_buf())
    }
}

impl std::fmt::Debug for TrustStoreReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStoreReconciler")
            .field("installer", &self.installer.name())
            .finish()
    }
}
