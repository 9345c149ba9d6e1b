//! `skiff run`: pull an image and run one command inside it.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;
use skiff_common::config::SkiffConfig;
use skiff_common::types::ImageReference;
use skiff_runtime::engine::Engine;

use crate::output;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to run, as `name[:tag]` (tag defaults to `latest`).
    pub image: String,

    /// Command to run inside the image, followed by its arguments.
    ///
    /// Everything after the command is passed through untouched, including
    /// arguments that look like flags.
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,

    /// Do not mount a fresh `/proc` inside the root.
    #[arg(long)]
    pub no_mount_proc: bool,
}

/// Executes the `run` command and returns the child's exit code.
///
/// # Errors
///
/// Returns an error if any stage before the child's completion fails, or
/// if its output cannot be relayed.
pub fn execute(args: RunArgs, mut config: SkiffConfig) -> anyhow::Result<ExitCode> {
    if args.no_mount_proc {
        config.isolation.mount_proc = false;
    }
    let reference = ImageReference::parse(&args.image)?;
    let Some((command, command_args)) = args.command.split_first() else {
        anyhow::bail!("no command given");
    };
    tracing::debug!(image = %reference, command, args = ?command_args, "run requested");

    let engine = Engine::from_config(config)?;
    let result = engine.run(&reference, command, command_args)?;

    output::relay(&result, &mut io::stdout().lock(), &mut io::stderr().lock())
        .context("failed to relay command output")?;
    Ok(ExitCode::from(output::exit_byte(result.exit_code)))
}
