//! Domain types and validators for pipeline configuration.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_BASE_IMAGE: &str = "quay.io/pypa/manylinux1_x86_64";
pub const DEFAULT_OS_PACKAGES: &[&str] = &["gcc", "bzip2", "tar"];
pub const DEFAULT_INSTALLER_URL: &str =
    "https://repo.continuum.io/miniconda/Miniconda3-4.3.21-Linux-x86_64.sh";
pub const DEFAULT_INSTALLER_PATH: &str = "/miniconda.sh";
pub const DEFAULT_INSTALL_PREFIX: &str = "/miniconda";
pub const DEFAULT_EXTENSIONS: &[&str] = &["conda-build", "anaconda-client", "jinja2"];
pub const DEFAULT_RECIPE: &str = "meta.yaml";
pub const DEFAULT_STAGING_DIR: &str = "/recipe";
pub const DEFAULT_TARGET_VERSIONS: &[&str] = &["2.7", "3.3", "3.4", "3.5", "3.6"];

#[allow(clippy::expect_used)] // compile-time constant pattern
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+$").expect("valid version pattern"));

// ── OS package tool ──────────────────────────────────────────────────────────

/// Distribution package tool available in the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OsPackageTool {
    #[default]
    Yum,
    AptGet,
}

impl OsPackageTool {
    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Yum => "yum",
            Self::AptGet => "apt-get",
        }
    }

    /// Index refresh run before the upgrade. `yum` refreshes stale metadata
    /// on its own; `apt-get` does not.
    #[must_use]
    pub fn refresh_args(self) -> Option<Vec<String>> {
        match self {
            Self::Yum => None,
            Self::AptGet => Some(vec!["update".to_string()]),
        }
    }

    #[must_use]
    pub fn upgrade_args(self) -> Vec<String> {
        vec!["-y".to_string(), "upgrade".to_string()]
    }

    #[must_use]
    pub fn install_args(self, packages: &[String]) -> Vec<String> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(packages.iter().cloned());
        args
    }
}

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level pipeline configuration, usually read from `buildbox.yaml`.
///
/// Every field has a default, so an empty document describes the stock
/// Miniconda + ObsPy build image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Base image tag the container manifest starts `FROM`.
    pub base_image: String,
    pub os_package_tool: OsPackageTool,
    /// Native toolchain packages (compiler, archive utilities).
    pub os_packages: Vec<String>,
    pub installer_url: String,
    /// Where the downloaded installer is written.
    pub installer_path: PathBuf,
    /// Installation root of the package manager.
    pub install_prefix: PathBuf,
    /// Extensions installed into the manager after self-update.
    pub extensions: Vec<String>,
    /// Externally authored recipe file, copied verbatim.
    pub recipe: PathBuf,
    pub staging_dir: PathBuf,
    /// Python versions to build, in build order.
    pub target_versions: Vec<String>,
    /// Run the per-version builds concurrently.
    pub parallel_builds: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            os_package_tool: OsPackageTool::default(),
            os_packages: to_strings(DEFAULT_OS_PACKAGES),
            installer_url: DEFAULT_INSTALLER_URL.to_string(),
            installer_path: PathBuf::from(DEFAULT_INSTALLER_PATH),
            install_prefix: PathBuf::from(DEFAULT_INSTALL_PREFIX),
            extensions: to_strings(DEFAULT_EXTENSIONS),
            recipe: PathBuf::from(DEFAULT_RECIPE),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            target_versions: to_strings(DEFAULT_TARGET_VERSIONS),
            parallel_builds: false,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl PipelineConfig {
    /// Path of the manager executable inside the install prefix.
    #[must_use]
    pub fn manager_bin(&self) -> PathBuf {
        self.install_prefix.join("bin").join("conda")
    }

    /// Destination of the recipe inside the staging directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the recipe path has no file name component.
    pub fn staged_recipe(&self) -> Result<PathBuf, ConfigError> {
        let name = self
            .recipe
            .file_name()
            .ok_or_else(|| ConfigError::InvalidRecipe(self.recipe.display().to_string()))?;
        Ok(self.staging_dir.join(name))
    }

    /// Validate every field that later steps depend on.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.os_packages.is_empty() {
            return Err(ConfigError::EmptyList("os_packages"));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::EmptyList("extensions"));
        }
        if !self.installer_url.starts_with("https://") {
            return Err(ConfigError::InsecureInstallerUrl(self.installer_url.clone()));
        }
        require_absolute("installer_path", &self.installer_path)?;
        require_absolute("install_prefix", &self.install_prefix)?;
        require_absolute("staging_dir", &self.staging_dir)?;
        self.staged_recipe()?;
        validate_target_versions(&self.target_versions)
    }
}

fn require_absolute(field: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::RelativePath {
            field,
            path: path.display().to_string(),
        })
    }
}

/// Validates the target version list: non-empty, `MAJOR.MINOR`, no repeats.
///
/// # Errors
///
/// Returns an error describing the first offending entry.
pub fn validate_target_versions(versions: &[String]) -> Result<(), ConfigError> {
    if versions.is_empty() {
        return Err(ConfigError::NoTargetVersions);
    }
    let mut seen = HashSet::new();
    for version in versions {
        if !VERSION_RE.is_match(version) {
            return Err(ConfigError::InvalidVersion(version.clone()));
        }
        if !seen.insert(version.as_str()) {
            return Err(ConfigError::DuplicateVersion(version.clone()));
        }
    }
    Ok(())
}
