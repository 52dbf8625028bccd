//! Command implementations.

pub mod generate;
pub mod inspect;
pub mod serve;

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use localcert_core::LifecycleConfig;

/// Shared context for all commands.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Explicit `--config` file, if any
    pub config_path: Option<PathBuf>,

    /// Verbose output
    pub verbose: bool,

    /// Disable colors
    pub no_color: bool,
}

impl Context {
    /// Settings from `--config`, or the defaults when none was given.
    pub fn load_config(&self) -> anyhow::Result<LifecycleConfig> {
        let Some(path) = &self.config_path else {
            return Ok(LifecycleConfig::default());
        };
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }
        LifecycleConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    }
}
