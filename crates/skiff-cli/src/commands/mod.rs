//! CLI command definitions and dispatch.

pub mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use skiff_common::config::{RegistryEndpoints, SkiffConfig};
use skiff_common::constants::{DEFAULT_AUTH_SERVICE, DEFAULT_AUTH_URL, DEFAULT_REGISTRY_URL};

/// skiff: run a command inside a freshly pulled container image.
#[derive(Parser, Debug)]
#[command(name = "skiff", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the registry v2 API.
    #[arg(long, global = true, env = "SKIFF_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    pub registry_url: String,

    /// Token endpoint of the registry's auth service.
    #[arg(long, global = true, env = "SKIFF_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    pub auth_url: String,

    /// Service name requested from the auth endpoint.
    #[arg(long, global = true, env = "SKIFF_AUTH_SERVICE", default_value = DEFAULT_AUTH_SERVICE)]
    pub auth_service: String,

    /// Parent directory for the per-run scratch directory.
    #[arg(long, global = true, env = "SKIFF_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull an image and run a command inside it.
    Run(run::RunArgs),
}

impl Cli {
    /// Builds the run configuration from the global options.
    #[must_use]
    pub fn config(&self) -> SkiffConfig {
        SkiffConfig {
            registry: RegistryEndpoints {
                auth_url: self.auth_url.clone(),
                auth_service: self.auth_service.clone(),
                registry_url: self.registry_url.clone(),
            },
            scratch_base: self.scratch_dir.clone(),
            ..SkiffConfig::default()
        }
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command fails before the child's outcome is
/// known.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.config();
    match cli.command {
        Command::Run(args) => run::execute(args, config),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_point_at_docker_hub() {
        let cli = Cli::try_parse_from(["skiff", "run", "alpine", "true"]).expect("parse failed");
        let config = cli.config();
        assert_eq!(config.registry, RegistryEndpoints::default());
        assert!(config.scratch_base.is_none());
        assert!(config.isolation.mount_proc);
    }

    #[test]
    fn global_flags_override_endpoints() {
        let cli = Cli::try_parse_from([
            "skiff",
            "run",
            "--registry-url",
            "http://localhost:5000/v2",
            "--scratch-dir",
            "/var/tmp/skiff",
            "alpine",
            "true",
        ])
        .expect("parse failed");
        let config = cli.config();
        assert_eq!(config.registry.registry_url, "http://localhost:5000/v2");
        assert_eq!(config.scratch_base, Some(PathBuf::from("/var/tmp/skiff")));
    }

    #[test]
    fn missing_command_is_a_usage_error() {
        assert!(Cli::try_parse_from(["skiff", "run", "alpine"]).is_err());
    }

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        assert!(Cli::try_parse_from(["skiff", "pull", "alpine", "true"]).is_err());
    }
}
