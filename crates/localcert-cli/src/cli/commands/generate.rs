//! `localcert generate` - run the certificate lifecycle.

use anyhow::Result;
use colored::Colorize;
use localcert_core::{
    platform_installer, CertificateLifecycleManager, LifecycleReport, NoopTrustStore,
    TrustStoreInstaller,
};

use super::Context;
use crate::cli::args::GenerateArgs;

pub fn execute(ctx: &Context, args: &GenerateArgs) -> Result<()> {
    let report = run(ctx, args)?;
    print_report(&report);
    Ok(())
}

/// Build the manager from config plus flags and run it once.
pub fn run(ctx: &Context, args: &GenerateArgs) -> Result<LifecycleReport> {
    let mut config = ctx.load_config()?;
    args.apply(&mut config);

    let installer: Box<dyn TrustStoreInstaller> = if args.skip_trust {
        Box::new(NoopTrustStore)
    } else {
        platform_installer()
    };
    let manager = CertificateLifecycleManager::new(config, installer)?;

    match manager.run() {
        Ok(report) => Ok(report),
        Err(err) => {
            if let Some(output) = err.source.command_output() {
                if !output.is_empty() {
                    eprintln!("{}", output.dimmed());
                }
            }
            Err(err.into())
        }
    }
}

fn print_report(report: &LifecycleReport) {
    let artifacts = &report.artifacts;
    println!("{}", "New certificate generated".green().bold());
    println!("  {:<12} {}", "Certificate:", artifacts.current_certificate.display());
    println!("  {:<12} {}", "Key:", artifacts.current_key.display());
    println!("  {:<12} {}", "Trusted:", report.trust_bundle.display());
    println!("  {:<12} {}", "SHA-256:", report.fingerprint.cyan());

    let rotation = &report.rotation;
    if !rotation.moved.is_empty() || !rotation.evicted.is_empty() {
        println!(
            "  {:<12} {} archived, {} evicted",
            "Archive:",
            rotation.moved.len(),
            rotation.evicted.len()
        );
    }
    for failure in &rotation.eviction_failures {
        println!("  {} {failure}", "warning:".yellow());
    }
}
