//! `buildbox plan` — show the ordered steps without running anything.

use anyhow::Result;
use owo_colors::OwoColorize as _;

use crate::application::ports::ConfigSource;
use crate::domain::{FailurePolicy, build_plan};
use crate::output::OutputContext;
use crate::output::json::format_value;

/// Print the provisioning plan.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or is invalid.
pub fn run(ctx: &OutputContext, source: &impl ConfigSource, json: bool) -> Result<()> {
    let config = source.load()?;
    let plan = build_plan(&config)?;

    if json {
        println!("{}", format_value(&plan)?);
        return Ok(());
    }

    println!("base image: {}", plan.base_image);
    for (i, step) in plan.steps.iter().enumerate() {
        let policy = match step.policy {
            FailurePolicy::Fatal => "fatal".style(ctx.styles.error).to_string(),
            FailurePolicy::Tolerated => "tolerated".style(ctx.styles.warning).to_string(),
        };
        println!("{:>3}. {} [{policy}]", i + 1, step.name);
        println!("     {}", step.action.shell_command().style(ctx.styles.dim));
    }
    Ok(())
}
