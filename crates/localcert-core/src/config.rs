//! Lifecycle configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CertError, Result};

/// Base name used when none (or an empty one) is given.
pub const DEFAULT_BASE_NAME: &str = "localhost";

/// Settings for one lifecycle run. Every value that used to be a process-wide
/// default lives here so tests can shrink caps and validity windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Directory holding the current and timestamped artifacts.
    pub working_dir: PathBuf,

    /// Name of the archive subdirectory inside `working_dir`.
    pub archive_dir_name: String,

    /// File stem for all artifacts (default: localhost).
    pub base_name: String,

    /// Maximum number of archived artifacts kept (default: 100).
    pub archive_cap: usize,

    /// Certificate validity in days (default: 365).
    pub validity_days: u32,

    /// Subject organization names, also used to match stale trust entries.
    pub organization_names: Vec<String>,

    /// DNS names placed in the subject alternative name extension.
    pub dns_names: Vec<String>,

    /// What to do when an archived file already has the incoming name.
    pub collision_policy: CollisionPolicy,
}

/// Archive name collision handling. Neither variant overwrites history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Fail the rotation with `ArchiveCollision`.
    Reject,
    /// Archive the incoming file as `<stem>.<n>.<ext>`.
    #[default]
    Number,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("certificate"),
            archive_dir_name: String::from("old"),
            base_name: String::from(DEFAULT_BASE_NAME),
            archive_cap: 100,
            validity_days: 365,
            organization_names: vec![String::from("Local MyCompany Cert")],
            dns_names: vec![String::from("localhost")],
            collision_policy: CollisionPolicy::default(),
        }
    }
}

impl LifecycleConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML text. Missing fields take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CertError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the lifecycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.archive_cap == 0 {
            return Err(CertError::Config("archive_cap must be at least 1".into()));
        }
        if self.validity_days == 0 {
            return Err(CertError::Config("validity_days must be at least 1".into()));
        }
        if self.archive_dir_name.is_empty()
            || self.archive_dir_name.contains(['/', '\\'])
            || self.archive_dir_name == ".."
        {
            return Err(CertError::Config(format!(
                "archive_dir_name '{}' must be a plain directory name",
                self.archive_dir_name
            )));
        }
        if self.base_name.contains(['/', '\\']) {
            return Err(CertError::Config(format!(
                "base_name '{}' must not contain path separators",
                self.base_name
            )));
        }
        Ok(())
    }

    /// Base name with the empty string mapped to the default.
    pub fn effective_base_name(&self) -> &str {
        if self.base_name.trim().is_empty() {
            DEFAULT_BASE_NAME
        } else {
            &self.base_name
        }
    }

    /// Full path of the archive directory.
    pub fn archive_dir(&self) -> PathBuf {
        self.working_dir.join(&self.archive_dir_name)
    }
}
