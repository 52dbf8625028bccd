//! The lifecycle orchestrator.
//!
//! ```text
//! Start -> Generate -> RotateOldArtifacts -> WriteArtifacts -> ReconcileTrustStore -> Done
//!              \______________\__________________\_____________________\--> Error
//! ```
//!
//! The first fatal error stops the run. Nothing written before the failure is
//! cleaned up.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, Stage};
use crate::inspect::inspect_certificate;
use crate::keygen::KeyPairGenerator;
use crate::loader::load_identity_from_files;
use crate::rotate::{ArchiveRotator, RotationReport};
use crate::trust::{TrustStoreInstaller, TrustStoreReconciler};
use crate::writer::{timestamp_now, ArtifactWriter, WrittenArtifacts};

/// Outcome of a successful run.
#[derive(Debug)]
pub struct LifecycleReport {
    /// Timestamp embedded in this run's file names.
    pub timestamp: String,
    pub rotation: RotationReport,
    pub artifacts: WrittenArtifacts,
    /// Trust bundle handed to the installer.
    pub trust_bundle: PathBuf,
    /// SHA-256 of the new certificate (hex).
    pub fingerprint: String,
}

/// Sequences generation, rotation, persistence and trust reconciliation.
#[derive(Debug)]
pub struct CertificateLifecycleManager {
    config: LifecycleConfig,
    generator: KeyPairGenerator,
    rotator: ArchiveRotator,
    writer: ArtifactWriter,
    reconciler: TrustStoreReconciler,
}

impl CertificateLifecycleManager {
    /// Build a manager from validated settings and a trust-store installer.
    pub fn new(
        config: LifecycleConfig,
        installer: Box<dyn TrustStoreInstaller>,
    ) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            generator: KeyPairGenerator::new(config.validity_days),
            rotator: ArchiveRotator::from_config(&config),
            writer: ArtifactWriter::from_config(&config),
            reconciler: TrustStoreReconciler::new(installer),
            config,
        })
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Run every step with the current local time as timestamp.
    pub fn run(&self) -> Result<LifecycleReport, LifecycleError> {
        self.run_at(&timestamp_now())
    }

    /// Run every step, naming files with `timestamp`.
    pub fn run_at(&self, timestamp: &str) -> Result<LifecycleReport, LifecycleError> {
        let config = &self.config;

        let pair = self
            .generator
            .generate(&config.organization_names, &config.dns_names)
            .map_err(LifecycleError::at(Stage::Generate))?;

        let rotation = self
            .rotator
            .rotate()
            .map_err(LifecycleError::at(Stage::RotateOldArtifacts))?;
        for failure in &rotation.eviction_failures {
            warn!(error = %failure, "continuing despite eviction failure");
        }

        let artifacts = self
            .writer
            .write(
                pair.certificate_pem.as_bytes(),
                pair.private_key_pem.as_bytes(),
                timestamp,
            )
            .map_err(LifecycleError::at(Stage::WriteArtifacts))?;

        // Read the pair back the way a TLS server would.
        load_identity_from_files(&artifacts.timestamped_certificate, &artifacts.timestamped_key)
            .map_err(LifecycleError::at(Stage::WriteArtifacts))?;
        let summary = inspect_certificate(pair.certificate_pem.as_bytes())
            .map_err(LifecycleError::at(Stage::WriteArtifacts))?;
        info!(
            fingerprint = %summary.fingerprint,
            not_after = %summary.not_after,
            "certificate verified"
        );

        let trust_bundle = self
            .reconciler
            .reconcile(
                &config.organization_names,
                pair.certificate_pem.as_bytes(),
                &self.writer.trust_bundle_path(timestamp),
            )
            .map_err(LifecycleError::at(Stage::ReconcileTrustStore))?;

        Ok(LifecycleReport {
            timestamp: timestamp.to_string(),
            rotation,
            artifacts,
            trust_bundle,
            fingerprint: summary.fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use crate::error::CertError;
    use crate::rotate::FsOps;
    use crate::trust::tests::FakeInstaller;
    use crate::trust::{NoopTrustStore, UnsupportedTrustStore};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> LifecycleConfig {
        LifecycleConfig {
            working_dir: dir.path().join("certificate"),
            ..LifecycleConfig::default()
        }
    }

    fn manager(config: LifecycleConfig) -> CertificateLifecycleManager {
        CertificateLifecycleManager::new(config, Box::new(NoopTrustStore)).unwrap()
    }

    fn fingerprint_of(path: &Path) -> String {
        inspect_certificate(&fs::read(path).unwrap()).unwrap().fingerprint
    }

    fn sorted_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| {
                let e = e.unwrap();
                e.file_type().unwrap().is_file().then(|| e.file_name().to_string_lossy().into_owned())
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_first_run_on_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let work = config.working_dir.clone();

        let report = manager(config).run_at("20240101_120000").unwrap();

        assert!(report.rotation.moved.is_empty());
        assert!(!work.join("old").exists());
        assert_eq!(
            sorted_names(&work),
            vec![
                "localhost.crt",
                "localhost.key",
                "localhost_20240101_120000.crt",
                "localhost_20240101_120000.key",
                "localhost_ca_20240101_120000.pem",
            ]
        );
        assert_eq!(report.trust_bundle, work.join("localhost_ca_20240101_120000.pem"));
        assert_eq!(fingerprint_of(&work.join("localhost.crt")), report.fingerprint);
    }

    #[test]
    fn test_second_run_archives_and_replaces_current_pair() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let work = config.working_dir.clone();
        let manager = manager(config);

        let first = manager.run_at("20240101_120000").unwrap();
        let first_key = fs::read(work.join("localhost.key")).unwrap();
        let second = manager.run_at("20240101_120001").unwrap();

        assert_ne!(first.fingerprint, second.fingerprint);
        assert_eq!(fingerprint_of(&work.join("localhost.crt")), second.fingerprint);
        assert_eq!(
            sorted_names(&work.join("old")),
            vec![
                "localhost.crt",
                "localhost.key",
                "localhost_20240101_120000.crt",
                "localhost_20240101_120000.key",
                "localhost_ca_20240101_120000.pem",
            ]
        );
        let old = work.join("old");
        assert_eq!(fs::read(old.join("localhost.key")).unwrap(), first_key);
        assert_eq!(fingerprint_of(&old.join("localhost.crt")), first.fingerprint);
        assert!(work.join("localhost_20240101_120001.crt").exists());
        assert_eq!(second.rotation.moved.len(), 5);
    }

    #[test]
    fn test_retention_cap_holds_across_many_runs() {
        let tmp = TempDir::new().unwrap();
        let config = LifecycleConfig {
            archive_cap: 7,
            ..config(&tmp)
        };
        let old = config.archive_dir();
        let manager = manager(config);

        for run in 0..6 {
            manager.run_at(&format!("20240101_1200{run:02}")).unwrap();
        }

        assert_eq!(sorted_names(&old).len(), 7);
    }

    #[test]
    fn test_reject_policy_fails_third_run_at_rotation() {
        let tmp = TempDir::new().unwrap();
        let config = LifecycleConfig {
            collision_policy: CollisionPolicy::Reject,
            ..config(&tmp)
        };
        let manager = manager(config);

        manager.run_at("20240101_120000").unwrap();
        manager.run_at("20240101_120001").unwrap();
        let err = manager.run_at("20240101_120002").unwrap_err();

        assert_eq!(err.stage, Stage::RotateOldArtifacts);
        assert!(matches!(err.source, CertError::ArchiveCollision { .. }));
    }

    #[test]
    fn test_invalid_dns_name_fails_before_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let config = LifecycleConfig {
            dns_names: vec!["b\u{e4}d".to_string()],
            ..config(&tmp)
        };
        let work = config.working_dir.clone();

        let err = manager(config).run_at("20240101_120000").unwrap_err();

        assert_eq!(err.stage, Stage::Generate);
        assert!(!work.exists());
    }

    #[test]
    fn test_oversized_validity_fails_generate_without_panicking() {
        let tmp = TempDir::new().unwrap();
        let config = LifecycleConfig {
            validity_days: 3_000_000,
            ..config(&tmp)
        };
        let work = config.working_dir.clone();

        let err = manager(config).run_at("20240101_120000").unwrap_err();

        assert_eq!(err.stage, Stage::Generate);
        assert!(matches!(err.source, CertError::CertificateCreation(_)));
        assert!(!work.exists());
    }

    fn locked_remove(_path: &Path) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "file is locked"))
    }

    #[test]
    fn test_eviction_failure_does_not_stop_run() {
        let tmp = TempDir::new().unwrap();
        let config = LifecycleConfig {
            archive_cap: 1,
            ..config(&tmp)
        };
        let old = config.archive_dir();
        let mut manager = manager(config);
        manager.rotator = manager.rotator.clone().with_ops(FsOps {
            remove: locked_remove,
            ..FsOps::default()
        });

        manager.run_at("20240101_120000").unwrap();
        let report = manager.run_at("20240101_120001").unwrap();

        assert_eq!(report.rotation.moved.len(), 5);
        assert_eq!(report.rotation.eviction_failures.len(), 4);
        assert!(report.rotation.evicted.is_empty());
        assert_eq!(sorted_names(&old).len(), 5);
        assert!(report.trust_bundle.exists());
    }

    #[test]
    fn test_import_failure_keeps_written_files() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let work = config.working_dir.clone();
        let installer = FakeInstaller {
            fail_import: Some("Access is denied.".into()),
            ..FakeInstaller::default()
        };
        let manager = CertificateLifecycleManager::new(config, Box::new(installer)).unwrap();

        let err = manager.run_at("20240101_120000").unwrap_err();

        assert_eq!(err.stage, Stage::ReconcileTrustStore);
        assert_eq!(err.source.command_output(), Some("Access is denied."));
        let cert = fs::read(work.join("localhost_20240101_120000.crt")).unwrap();
        assert_eq!(fs::read(work.join("localhost.crt")).unwrap(), cert);
        assert!(work.join("localhost.key").exists());
        assert!(work.join("localhost_20240101_120000.key").exists());
    }

    #[test]
    fn test_unsupported_platform_fails_reconcile() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let work = config.working_dir.clone();
        let manager =
            CertificateLifecycleManager::new(config, Box::new(UnsupportedTrustStore::current()))
                .unwrap();

        let err = manager.run_at("20240101_120000").unwrap_err();

        assert_eq!(err.stage, Stage::ReconcileTrustStore);
        assert!(work.join("localhost.crt").exists());
    }

    #[test]
    fn test_fake_store_ends_with_one_entry() {
        let tmp = TempDir::new().unwrap();
        let installer = FakeInstaller::default();
        let store = std::rc::Rc::clone(&installer.store);
        let manager = CertificateLifecycleManager::new(config(&tmp), Box::new(installer)).unwrap();

        manager.run_at("20240101_120000").unwrap();
        manager.run_at("20240101_120001").unwrap();

        assert_eq!(store.borrow().subjects.len(), 1);
        assert_eq!(store.borrow().imports.len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = CertificateLifecycleManager::new(
            LifecycleConfig {
                archive_cap: 0,
                ..LifecycleConfig::default()
            },
            Box::new(NoopTrustStore),
        )
        .unwrap_err();
        assert!(matches!(err, CertError::Config(_)));
    }
}
