//! localcert - self-signed development certificates that stay trusted.

use anyhow::Result;

fn main() -> Result<()> {
    localcert_cli::run()
}
