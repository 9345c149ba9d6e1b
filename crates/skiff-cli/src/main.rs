//! # skiff
//!
//! Pulls an image from a registry, unpacks it into a throwaway root, and
//! runs one command inside it under a fresh PID and mount namespace.
//! The command's output and exit code become skiff's own.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;
use skiff_common::constants::APP_NAME;

use crate::commands::Cli;

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    // stdout belongs to the command; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{APP_NAME}: {err:#}");
            ExitCode::from(output::failure_code(&err))
        }
    }
}
