//! `OsPackages` adapter over the distribution package tool.

use std::process::Output;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, OsPackages};
use crate::domain::OsPackageTool;

/// Routes OS package operations through a `CommandRunner`.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct SystemPackages<R: CommandRunner> {
    runner: R,
    tool: OsPackageTool,
}

impl<R: CommandRunner> SystemPackages<R> {
    pub fn new(runner: R, tool: OsPackageTool) -> Self {
        Self { runner, tool }
    }
}

impl<R: CommandRunner> OsPackages for SystemPackages<R> {
    /// Refreshes the package index first when the tool needs it. A failed
    /// refresh is returned as is and the upgrade is skipped.
    async fn upgrade(&self) -> Result<Output> {
        if let Some(args) = self.tool.refresh_args() {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let out = self
                .runner
                .run(self.tool.program(), &args)
                .await
                .with_context(|| format!("{} update", self.tool.program()))?;
            if !out.status.success() {
                return Ok(out);
            }
        }
        let args = self.tool.upgrade_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run(self.tool.program(), &args)
            .await
            .with_context(|| format!("{} upgrade", self.tool.program()))
    }

    async fn install(&self, packages: &[String]) -> Result<Output> {
        let args = self.tool.install_args(packages);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run(self.tool.program(), &args)
            .await
            .with_context(|| format!("{} install", self.tool.program()))
    }
}
