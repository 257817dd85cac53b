//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;

use anyhow::Result;

use crate::domain::PipelineConfig;

// ── Value Types ───────────────────────────────────────────────────────────────

/// What the fetcher wrote to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedInstaller {
    /// Number of bytes written.
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the written bytes.
    pub sha256: String,
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned or awaited.
    /// A non-zero exit status is reported through `Output::status`.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
}

// ── Collaborator Ports ────────────────────────────────────────────────────────

/// The distribution package tool of the base image.
#[allow(async_fn_in_trait)]
pub trait OsPackages {
    /// Upgrade every installed OS package.
    async fn upgrade(&self) -> Result<Output>;
    /// Install the named OS packages.
    async fn install(&self, packages: &[String]) -> Result<Output>;
}

/// Downloads the package-manager installer.
#[allow(async_fn_in_trait)]
pub trait InstallerFetcher {
    /// Fetch `url` and write it to `dest`, replacing any existing file.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchedInstaller>;
}

/// The package/environment manager CLI (`conda`).
#[allow(async_fn_in_trait)]
pub trait PackageManager {
    /// Run the downloaded installer unattended into `prefix`.
    async fn bootstrap(&self, installer: &Path, prefix: &Path) -> Result<Output>;
    /// Update the manager itself.
    async fn self_update(&self) -> Result<Output>;
    /// Install extension packages into the manager's base environment.
    async fn install_extensions(&self, extensions: &[String]) -> Result<Output>;
    /// Build the recipe in `recipe_dir` for one Python version.
    async fn build(&self, version: &str, recipe_dir: &Path) -> Result<Output>;
}

/// Filesystem operations used to prepare the installer and stage the recipe.
pub trait StagingFs {
    /// Create a directory and any missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Copy `from` to `to` byte-for-byte, returning the number of bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;
    /// Add execute permission for owner, group and others.
    fn set_executable(&self, path: &Path) -> Result<()>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts where the pipeline configuration comes from.
pub trait ConfigSource {
    /// Load the configuration, falling back to defaults when none is named.
    fn load(&self) -> Result<PipelineConfig>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
