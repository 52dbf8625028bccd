//! Archive rotation with bounded retention.
//!
//! Before a run writes new artifacts, every artifact file directly inside the
//! working directory is renamed into the archive directory. The archive is
//! then trimmed, oldest modification time first, until it holds at most
//! `cap` entries.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::{CollisionPolicy, LifecycleConfig};
use crate::error::{CertError, Result};
use crate::writer::ensure_private_dir;

/// File extensions treated as certificate artifacts (compared case-insensitively).
pub const ARTIFACT_EXTENSIONS: &[&str] = &["crt", "key", "pem"];

/// Returns true if `path` has one of the [`ARTIFACT_EXTENSIONS`].
pub fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            ARTIFACT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// What a rotation did.
#[derive(Debug, Default)]
pub struct RotationReport {
    /// `(from, to)` for every archived file.
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Archive entries deleted by retention.
    pub evicted: Vec<PathBuf>,
    /// Evictions that failed. Reported only; the run continues.
    pub eviction_failures: Vec<CertError>,
}

/// Moves prior artifacts into the archive and enforces the retention cap.
#[derive(Debug, Clone)]
pub struct ArchiveRotator {
    working_dir: PathBuf,
    archive_dir: PathBuf,
    cap: usize,
    policy: CollisionPolicy,
    ops: FsOps,
}

/// Filesystem calls that move and delete artifacts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FsOps {
    pub rename: fn(&Path, &Path) -> io::Result<()>,
    pub remove: fn(&Path) -> io::Result<()>,
}

impl Default for FsOps {
    fn default() -> Self {
        Self {
            rename: rename_file,
            remove: remove_file,
        }
    }
}

fn rename_file(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Archive entry candidate for eviction.
struct ArchiveEntry {
    path: PathBuf,
    modified: SystemTime,
}

impl ArchiveRotator {
    /// Create a rotator for explicit directories.
    pub fn new(
        working_dir: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        cap: usize,
        policy: CollisionPolicy,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            archive_dir: archive_dir.into(),
            cap,
            policy,
            ops: FsOps::default(),
        }
    }

    /// Same rotator with different filesystem primitives.
    #[cfg(test)]
    pub(crate) fn with_ops(mut self, ops: FsOps) -> Self {
        self.ops = ops;
        self
    }

    /// Create a rotator from lifecycle settings.
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(
            config.working_dir.clone(),
            config.archive_dir(),
            config.archive_cap,
            config.collision_policy,
        )
    }

    /// Archive existing artifacts, then evict the oldest archive entries
    /// until at most `cap` remain.
    ///
    /// A missing working directory means nothing to rotate. A failed rename
    /// aborts and leaves already-moved files where they are.
    pub fn rotate(&self) -> Result<RotationReport> {
        let mut report = RotationReport::default();

        let entries = match fs::read_dir(&self.working_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    dir = %self.working_dir.display(),
                    "working directory absent, nothing to rotate"
                );
                return Ok(report);
            }
            Err(source) => {
                return Err(CertError::DirectoryAccess {
                    path: self.working_dir.clone(),
                    source,
                })
            }
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CertError::DirectoryAccess {
                path: self.working_dir.clone(),
                source,
            })?;
            let file_type = entry.file_type().map_err(|source| CertError::DirectoryAccess {
                path: entry.path(),
                source,
            })?;
            let path = entry.path();
            if file_type.is_file() && is_artifact(&path) {
                candidates.push(path);
            }
        }
        candidates.sort();

        if !candidates.is_empty() {
            ensure_private_dir(&self.archive_dir).map_err(|source| CertError::DirectoryAccess {
                path: self.archive_dir.clone(),
                source,
            })?;
        }

        for from in candidates {
            let Some(name) = from.file_name() else {
                continue;
            };
            let to = self.destination_for(name)?;
            (self.ops.rename)(&from, &to).map_err(|source| CertError::FileMove {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
            debug!(from = %from.display(), to = %to.display(), "archived artifact");
            report.moved.push((from, to));
        }

        self.enforce_retention(&mut report)?;

        if !report.moved.is_empty() || !report.evicted.is_empty() {
            info!(
                moved = report.moved.len(),
                evicted = report.evicted.len(),
                archive = %self.archive_dir.display(),
                "rotated old artifacts"
            );
        }
        Ok(report)
    }

    /// Pick the archive path for a file named `name`.
    fn destination_for(&self, name: &OsStr) -> Result<PathBuf> {
        let direct = self.archive_dir.join(name);
        if !occupied(&direct) {
            return Ok(direct);
        }
        match self.policy {
            CollisionPolicy::Reject => Err(CertError::ArchiveCollision { path: direct }),
            CollisionPolicy::Number => {
                let original = Path::new(name);
                let stem = original.file_stem().unwrap_or(name).to_string_lossy();
                let ext = original.extension().map(OsStr::to_string_lossy);
                let mut n: u32 = 1;
                loop {
                    let candidate = match &ext {
                        Some(ext) => format!("{stem}.{n}.{ext}"),
                        None => format!("{stem}.{n}"),
                    };
                    let path = self.archive_dir.join(candidate);
                    if !occupied(&path) {
                        debug!(
                            name = %original.display(),
                            renamed = %path.display(),
                            "archive name taken, numbering"
                        );
                        return Ok(path);
                    }
                    n = n
                        .checked_add(1)
                        .ok_or_else(|| CertError::ArchiveCollision { path: direct.clone() })?;
                }
            }
        }
    }

    /// Delete the oldest archive entries while the archive exceeds the cap.
    ///
    /// Ties in modification time are broken by file name. Deletion failures
    /// are recorded in the report and logged; they never abort the run.
    pub fn enforce_retention(&self, report: &mut RotationReport) -> Result<()> {
        let mut entries = match self.archive_entries() {
            Ok(entries) => entries,
            Err(CertError::DirectoryAccess { source, .. }) if source.kind() == ErrorKind::NotFound => {
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if entries.len() <= self.cap {
            return Ok(());
        }

        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        let excess = entries.len() - self.cap;

        for entry in entries.into_iter().take(excess) {
            match (self.ops.remove)(&entry.path) {
                Ok(()) => {
                    debug!(path = %entry.path.display(), "evicted oldest archive entry");
                    report.evicted.push(entry.path);
                }
                Err(source) => {
                    let err = CertError::Eviction {
                        path: entry.path,
                        source,
                    };
                    warn!(error = %err, "archive eviction failed");
                    report.eviction_failures.push(err);
                }
            }
        }
        Ok(())
    }

    /// Artifact files in the archive directory with their modification times.
    fn archive_entries(&self) -> Result<Vec<ArchiveEntry>> {
        let access = |source: std::io::Error| CertError::DirectoryAccess {
            path: self.archive_dir.clone(),
            source,
        };

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.archive_dir).map_err(access)? {
            let entry = entry.map_err(access)?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(access)?;
            if !metadata.is_file() || !is_artifact(&path) {
                continue;
            }
            let modified = metadata.modified().map_err(access)?;
            entries.push(ArchiveEntry { path, modified });
        }
        Ok(entries)
    }
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
