//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::domain::{ConfigError, PipelineError};
use crate::infra::config::YamlConfigFile;
use crate::output::OutputContext;

/// Provision a conda build image and build a recipe for every target Python
#[derive(Parser)]
#[command(
    name = "buildbox",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Pipeline configuration file (YAML); built-in defaults when omitted
    #[arg(long, global = true, env = "BUILDBOX_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision the build environment and build every target version
    Run(commands::run::RunArgs),

    /// Show the ordered steps without running them
    Plan,

    /// Print the equivalent Dockerfile
    Dockerfile,

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            config,
            command,
        } = self;
        let source = YamlConfigFile::new(config);
        match command {
            Command::Version => {
                commands::version::run(json);
                Ok(())
            }
            Command::Plan => {
                let ctx = OutputContext::new(no_color, quiet);
                commands::plan::run(&ctx, &source, json)
            }
            Command::Dockerfile => commands::dockerfile::run(&source),
            Command::Run(args) => {
                let ctx = OutputContext::new(no_color, quiet);
                commands::run::run(&ctx, &source, &args, json).await
            }
        }
    }
}

/// Machine-readable code for a failed command, used by `--json` errors.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if err.downcast_ref::<ConfigError>().is_some() {
        "config_invalid"
    } else if let Some(pipeline) = err.downcast_ref::<PipelineError>() {
        match pipeline {
            PipelineError::StepFailed { .. } => "step_failed",
            PipelineError::BuildCrashed { .. } => "build_crashed",
        }
    } else {
        "error"
    }
}
