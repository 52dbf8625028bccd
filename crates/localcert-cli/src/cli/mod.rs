//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands, GenerateArgs};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let ctx = commands::Context {
        config_path: cli.config,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };

    match cli.command {
        Some(Commands::Generate(args)) => commands::generate::execute(&ctx, &args),
        Some(Commands::Inspect(args)) => commands::inspect::execute(&ctx, &args),
        Some(Commands::Serve(args)) => commands::serve::execute(&ctx, &args),
        None => commands::generate::execute(&ctx, &GenerateArgs::default()),
    }
}

/// `RUST_LOG` wins; otherwise info (debug with `--verbose`) for our crates.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "localcert=debug" } else { "localcert=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
