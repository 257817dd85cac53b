//! `buildbox dockerfile` — render the plan as a container build manifest.

use anyhow::Result;

use crate::application::ports::ConfigSource;
use crate::domain::{build_plan, dockerfile};

/// Print the Dockerfile equivalent of the configured pipeline.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or is invalid.
pub fn run(source: &impl ConfigSource) -> Result<()> {
    let config = source.load()?;
    let plan = build_plan(&config)?;
    print!("{}", dockerfile::render(&plan));
    Ok(())
}
