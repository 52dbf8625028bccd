//! # localcert-cli
//!
//! Command-line front end for `localcert-core`.
//!
//! - `localcert generate`: run the certificate lifecycle (the default command)
//! - `localcert inspect <FILE>`: summarize a PEM certificate
//! - `localcert serve`: answer HTTPS requests with the current pair

pub mod cli;
pub mod embedded;

pub use cli::run;
