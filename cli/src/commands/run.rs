//! `buildbox run` — provision the build environment and build every target.

use anyhow::Result;
use clap::Args;

use crate::application::ports::ConfigSource;
use crate::application::services::pipeline::{PipelineOptions, run_pipeline};
use crate::domain::error::describe_exit;
use crate::domain::{PipelineReport, build_plan};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::conda::CondaManager;
use crate::infra::fetch::HttpFetcher;
use crate::infra::fs::LocalFs;
use crate::infra::os_packages::SystemPackages;
use crate::output::json::format_value;
use crate::output::reporter::SilentReporter;
use crate::output::{OutputContext, TerminalReporter};

/// Arguments for the run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Build all target versions concurrently
    #[arg(long)]
    pub parallel: bool,
}

/// Run the full provisioning pipeline.
///
/// # Errors
///
/// Returns an error if the config is invalid or a fatal step fails. Build
/// failures are reported, not returned.
pub async fn run(
    ctx: &OutputContext,
    source: &impl ConfigSource,
    args: &RunArgs,
    json: bool,
) -> Result<()> {
    let config = source.load()?;
    let plan = build_plan(&config)?;
    let parallel_builds = args.parallel || config.parallel_builds;

    let os = SystemPackages::new(TokioCommandRunner, config.os_package_tool);
    let manager = CondaManager::new(TokioCommandRunner, config.manager_bin());

    if json {
        let opts = PipelineOptions {
            reporter: &SilentReporter,
            parallel_builds,
        };
        let report = run_pipeline(&os, &HttpFetcher, &manager, &LocalFs, &plan, opts).await?;
        println!("{}", format_value(&report)?);
        return Ok(());
    }

    ctx.header(&format!("provisioning on {}", plan.base_image));
    let reporter = TerminalReporter::new(ctx);
    let opts = PipelineOptions {
        reporter: &reporter,
        parallel_builds,
    };
    let report = run_pipeline(&os, &HttpFetcher, &manager, &LocalFs, &plan, opts).await?;
    print_summary(ctx, &report);
    Ok(())
}

fn print_summary(ctx: &OutputContext, report: &PipelineReport) {
    ctx.header("builds");
    for build in &report.builds {
        let status = if build.passed {
            "passed".to_string()
        } else {
            format!("failed ({})", describe_exit(build.exit_code))
        };
        ctx.kv(&format!("py{}", build.version), &status);
    }
    if let Some(sha) = &report.installer_sha256 {
        ctx.kv("installer sha256", sha);
    }
    let tolerated = report.tolerated_steps().count();
    if tolerated > 0 {
        ctx.warn(&format!("{tolerated} setup step(s) failed and were tolerated"));
    }
    ctx.success("image build complete");
}
