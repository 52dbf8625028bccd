//! `localcert inspect` - summarize a PEM certificate.

use anyhow::{Context as _, Result};
use chrono::Utc;
use colored::Colorize;
use localcert_core::{inspect_certificate, CertificateSummary};

use super::Context;
use crate::cli::args::InspectArgs;

pub fn execute(_ctx: &Context, args: &InspectArgs) -> Result<()> {
    let pem = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let summary = inspect_certificate(&pem)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render(&summary));
    }
    Ok(())
}

fn render(summary: &CertificateSummary) -> String {
    let status = if summary.is_valid_at(Utc::now()) {
        "valid".green()
    } else {
        "expired or not yet valid".red()
    };
    let mut out = String::new();
    let mut line = |label: &str, value: &str| {
        out.push_str(&format!("{:<14} {value}\n", format!("{label}:")));
    };
    line("Subject", &summary.subject);
    line("Issuer", &summary.issuer);
    line("Organization", &summary.organization_names.join(", "));
    line("DNS names", &summary.dns_names.join(", "));
    line("Serial", &summary.serial);
    line("Not before", &summary.not_before.to_rfc3339());
    line("Not after", &summary.not_after.to_rfc3339());
    line("Self-signed", if summary.self_signed { "yes" } else { "no" });
    line("SHA-256", &summary.fingerprint);
    line("Status", &status.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use localcert_core::KeyPairGenerator;

    #[test]
    fn test_render_lists_fields() {
        colored::control::set_override(false);
        let pair = KeyPairGenerator::new(30)
            .generate(&["Acme Dev".to_string()], &["localhost".to_string()])
            .unwrap();
        let summary = inspect_certificate(pair.certificate_pem.as_bytes()).unwrap();

        let text = render(&summary);

        assert!(text.contains("Organization:  Acme Dev"));
        assert!(text.contains("DNS names:     localhost"));
        assert!(text.contains("Self-signed:   yes"));
        assert!(text.contains("Status:        valid"));
        assert!(text.contains(&summary.fingerprint));
    }

    #[test]
    fn test_missing_file_is_error() {
        let args = InspectArgs {
            file: "does-not-exist.crt".into(),
            json: false,
        };
        let err = execute(&Context::default(), &args).unwrap_err();
        assert!(err.to_string().contains("does-not-exist.crt"));
    }
}
