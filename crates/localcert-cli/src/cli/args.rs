//! Command-line argument definitions using clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use localcert_core::{CollisionPolicy, LifecycleConfig};

/// Self-signed TLS certificates for local development
///
/// Generates a fresh key and certificate, archives the previous ones, and
/// replaces the trusted root for your organization. Runs `generate` when no
/// command is given.
#[derive(Parser, Debug)]
#[command(name = "localcert")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "LOCALCERT_CONFIG", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate, rotate and trust a new certificate
    Generate(GenerateArgs),

    /// Print a summary of a PEM certificate
    Inspect(InspectArgs),

    /// Serve HTTPS with a certificate pair
    Serve(ServeArgs),
}

// ============================================================================
// Generate command
// ============================================================================

#[derive(Args, Debug, Default, Clone)]
pub struct GenerateArgs {
    /// File stem for all artifacts
    #[arg(long, value_name = "NAME")]
    pub base_name: Option<String>,

    /// Subject organization (repeatable)
    #[arg(long = "org", value_name = "NAME")]
    pub organization_names: Vec<String>,

    /// DNS name for the certificate (repeatable)
    #[arg(long = "dns", value_name = "NAME")]
    pub dns_names: Vec<String>,

    /// Working directory for the artifacts
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Maximum number of archived files
    #[arg(long, value_name = "N")]
    pub archive_cap: Option<usize>,

    /// Certificate validity in days
    #[arg(long, value_name = "DAYS")]
    pub validity_days: Option<u32>,

    /// What to do when an archived file already has the same name
    #[arg(long, value_enum)]
    pub on_collision: Option<CollisionArg>,

    /// Leave the trust store alone
    #[arg(long)]
    pub skip_trust: bool,
}

impl GenerateArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut LifecycleConfig) {
        if let Some(base_name) = &self.base_name {
            config.base_name.clone_from(base_name);
        }
        if !self.organization_names.is_empty() {
            config.organization_names.clone_from(&self.organization_names);
        }
        if !self.dns_names.is_empty() {
            config.dns_names.clone_from(&self.dns_names);
        }
        if let Some(dir) = &self.dir {
            config.working_dir.clone_from(dir);
        }
        if let Some(cap) = self.archive_cap {
            config.archive_cap = cap;
        }
        if let Some(days) = self.validity_days {
            config.validity_days = days;
        }
        if let Some(policy) = self.on_collision {
            config.collision_policy = policy.into();
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionArg {
    /// Fail the run
    Reject,
    /// Archive as <stem>.<n>.<ext>
    Number,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Reject => Self::Reject,
            CollisionArg::Number => Self::Number,
        }
    }
}

// ============================================================================
// Inspect command
// ============================================================================

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// PEM certificate file
    pub file: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Serve command
// ============================================================================

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8443")]
    pub addr: SocketAddr,

    /// Certificate file (defaults to the embedded pair)
    #[arg(long, value_name = "FILE", requires = "key")]
    pub cert: Option<PathBuf>,

    /// Private key file
    #[arg(long, value_name = "FILE", requires = "cert")]
    pub key: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["localcert"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_generate_flags_override_config() {
        let cli = Cli::try_parse_from([
            "localcert",
            "generate",
            "--org",
            "Acme Dev",
            "--org",
            "Acme QA",
            "--dns",
            "dev.local",
            "--dir",
            "/tmp/certs",
            "--archive-cap",
            "5",
            "--on-collision",
            "reject",
            "--skip-trust",
        ])
        .unwrap();
        let Some(Commands::Generate(args)) = cli.command else {
            panic!("expected generate");
        };

        let mut config = LifecycleConfig::default();
        args.apply(&mut config);

        assert_eq!(config.organization_names, vec!["Acme Dev", "Acme QA"]);
        assert_eq!(config.dns_names, vec!["dev.local"]);
        assert_eq!(config.working_dir, PathBuf::from("/tmp/certs"));
        assert_eq!(config.archive_cap, 5);
        assert_eq!(config.validity_days, 365);
        assert_eq!(config.collision_policy, CollisionPolicy::Reject);
        assert!(args.skip_trust);
    }

    #[test]
    fn test_empty_generate_args_keep_config() {
        let mut config = LifecycleConfig::default();
        GenerateArgs::default().apply(&mut config);
        assert_eq!(config, LifecycleConfig::default());
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["localcert", "serve"]).unwrap();
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.addr, "127.0.0.1:8443".parse().unwrap());
        assert!(args.cert.is_none());
    }

    #[test]
    fn test_serve_cert_requires_key() {
        assert!(Cli::try_parse_from(["localcert", "serve", "--cert", "a.crt"]).is_err());
        assert!(
            Cli::try_parse_from(["localcert", "serve", "--cert", "a.crt", "--key", "a.key"]).is_ok()
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["localcert", "inspect", "a.crt", "--verbose", "--json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Inspect(InspectArgs { json: true, .. }))));
    }
}
