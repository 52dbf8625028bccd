//! Windows current-user root store via PowerShell.
//!
//! Targets `Cert:\CurrentUser\Root`, which needs no elevation. The command
//! blocks until PowerShell exits; there is no timeout.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::TrustStoreInstaller;
use crate::error::{CertError, Result};

const STORE_LOCATION: &str = r"Cert:\CurrentUser\Root";

/// Runs `Import-Certificate` / `Remove-Item` through PowerShell.
#[derive(Debug, Clone)]
pub struct PowerShellTrustStore {
    program: String,
}

impl Default for PowerShellTrustStore {
    fn default() -> Self {
        Self::with_program("powershell")
    }
}

/// Failed command: exit status (or spawn error) and combined output.
struct CommandFailure {
    reason: String,
    output: String,
}

impl PowerShellTrustStore {
    /// Use a different executable, e.g. `pwsh`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Script removing every root whose subject contains `name` literally.
    pub fn removal_script(name: &str) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'; \
             $pattern = '*' + [WildcardPattern]::Escape({name}) + '*'; \
             Get-ChildItem -Path {STORE_LOCATION} | \
             Where-Object {{ $_.Subject -like $pattern }} | \
             ForEach-Object {{ Remove-Item -Path $_.PSPath -Force }}",
            name = quote(name),
        )
    }

    /// Script importing the certificate file at `path`.
    pub fn import_script(path: &Path) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'; \
             Import-Certificate -FilePath {path} -CertStoreLocation {STORE_LOCATION} | Out-Null",
            path = quote(&path.display().to_string()),
        )
    }

    fn run(&self, script: &str) -> std::result::Result<(), CommandFailure> {
        debug!(program = %self.program, script, "running trust-store command");
        let output = Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .map_err(|e| CommandFailure {
                reason: format!("failed to run {}: {e}", self.program),
                output: String::new(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(CommandFailure {
            reason: output.status.to_string(),
            output: combined.trim().to_string(),
        })
    }
}

impl TrustStoreInstaller for PowerShellTrustStore {
    fn name(&self) -> &'static str {
        "powershell"
    }

    fn remove(&self, subject_substrings: &[String]) -> Result<()> {
        for name in subject_substrings {
            self.run(&Self::removal_script(name))
                .map_err(|failure| CertError::TrustStoreRemoval {
                    name: name.clone(),
                    reason: if failure.output.is_empty() {
                        failure.reason
                    } else {
                        format!("{}, output: {}", failure.reason, failure.output)
                    },
                })?;
        }
        Ok(())
    }

    fn import(&self, path: &Path) -> Result<()> {
        self.run(&Self::import_script(path))
            .map_err(|failure| CertError::TrustStoreImport {
                path: path.to_path_buf(),
                reason: failure.reason,
                output: failure.output,
            })
    }
}

/// Single-quoted PowerShell literal; embedded quotes are doubled.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
