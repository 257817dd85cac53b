//! The ordered provisioning plan derived from a `PipelineConfig`.
//!
//! A plan is pure data: each `Step` names one external operation and its
//! failure policy. Executing it is the job of
//! `application::services::pipeline`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::config::{OsPackageTool, PipelineConfig};
use crate::domain::error::ConfigError;

/// What happens to the pipeline when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole pipeline.
    Fatal,
    /// Record the failure and carry on.
    Tolerated,
}

/// One external operation performed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    UpgradeOsPackages {
        tool: OsPackageTool,
    },
    InstallOsPackages {
        tool: OsPackageTool,
        packages: Vec<String>,
    },
    DownloadInstaller {
        url: String,
        dest: PathBuf,
    },
    MakeExecutable {
        path: PathBuf,
    },
    RunInstaller {
        installer: PathBuf,
        prefix: PathBuf,
    },
    UpdateManager {
        manager: PathBuf,
    },
    InstallExtensions {
        manager: PathBuf,
        extensions: Vec<String>,
    },
    CreateStagingDir {
        path: PathBuf,
    },
    StageRecipe {
        source: PathBuf,
        dest: PathBuf,
    },
    Build {
        manager: PathBuf,
        version: String,
        recipe_dir: PathBuf,
    },
}

impl StepAction {
    /// OS upgrades and per-version builds are tolerated; everything else is fatal.
    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        match self {
            Self::UpgradeOsPackages { .. } | Self::Build { .. } => FailurePolicy::Tolerated,
            _ => FailurePolicy::Fatal,
        }
    }

    #[must_use]
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build { .. })
    }

    /// The shell command equivalent to this step.
    #[must_use]
    pub fn shell_command(&self) -> String {
        let (program, args): (String, Vec<String>) = match self {
            Self::UpgradeOsPackages { tool } => {
                let upgrade = command_line(tool.program(), &tool.upgrade_args());
                return match tool.refresh_args() {
                    Some(refresh) => {
                        format!("{} && {upgrade}", command_line(tool.program(), &refresh))
                    }
                    None => upgrade,
                };
            }
            Self::InstallOsPackages { tool, packages } => {
                (tool.program().to_string(), tool.install_args(packages))
            }
            Self::DownloadInstaller { url, dest } => (
                "curl".to_string(),
                vec!["-fsSL".to_string(), "-o".to_string(), display(dest), url.clone()],
            ),
            Self::MakeExecutable { path } => {
                ("chmod".to_string(), vec!["+x".to_string(), display(path)])
            }
            Self::RunInstaller { installer, prefix } => {
                (display(installer), installer_args(prefix))
            }
            Self::UpdateManager { manager } => (display(manager), manager_update_args()),
            Self::InstallExtensions {
                manager,
                extensions,
            } => (display(manager), manager_install_args(extensions)),
            Self::CreateStagingDir { path } => {
                ("mkdir".to_string(), vec!["-p".to_string(), display(path)])
            }
            Self::StageRecipe { source, dest } => {
                ("cp".to_string(), vec![display(source), display(dest)])
            }
            Self::Build {
                manager,
                version,
                recipe_dir,
            } => (display(manager), manager_build_args(version, recipe_dir)),
        };
        command_line(&program, &args)
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A named step with its failure policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub name: String,
    pub policy: FailurePolicy,
    pub action: StepAction,
}

impl Step {
    fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            policy: action.policy(),
            action,
        }
    }
}

/// Ordered steps plus the base image they run on top of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub base_image: String,
    pub steps: Vec<Step>,
}

impl Plan {
    /// Steps that run once before any build.
    pub fn setup_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| !s.action.is_build())
    }

    /// Per-version build steps, in configured version order.
    pub fn build_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.action.is_build())
    }
}

/// Derive the provisioning plan from a validated configuration.
///
/// # Errors
///
/// Returns an error if the configuration fails validation.
pub fn build_plan(config: &PipelineConfig) -> Result<Plan, ConfigError> {
    config.validate()?;
    let tool = config.os_package_tool;
    let manager = config.manager_bin();

    let mut steps = vec![
        Step::new("upgrade-os-packages", StepAction::UpgradeOsPackages { tool }),
        Step::new(
            "install-os-packages",
            StepAction::InstallOsPackages {
                tool,
                packages: config.os_packages.clone(),
            },
        ),
        Step::new(
            "download-installer",
            StepAction::DownloadInstaller {
                url: config.installer_url.clone(),
                dest: config.installer_path.clone(),
            },
        ),
        Step::new(
            "make-installer-executable",
            StepAction::MakeExecutable {
                path: config.installer_path.clone(),
            },
        ),
        Step::new(
            "run-installer",
            StepAction::RunInstaller {
                installer: config.installer_path.clone(),
                prefix: config.install_prefix.clone(),
            },
        ),
        Step::new(
            "update-manager",
            StepAction::UpdateManager {
                manager: manager.clone(),
            },
        ),
        Step::new(
            "install-extensions",
            StepAction::InstallExtensions {
                manager: manager.clone(),
                extensions: config.extensions.clone(),
            },
        ),
        Step::new(
            "create-staging-dir",
            StepAction::CreateStagingDir {
                path: config.staging_dir.clone(),
            },
        ),
        Step::new(
            "stage-recipe",
            StepAction::StageRecipe {
                source: config.recipe.clone(),
                dest: config.staged_recipe()?,
            },
        ),
    ];

    steps.extend(config.target_versions.iter().map(|version| {
        Step::new(
            format!("build-py{version}"),
            StepAction::Build {
                manager: manager.clone(),
                version: version.clone(),
                recipe_dir: config.staging_dir.clone(),
            },
        )
    }));

    Ok(Plan {
        base_image: config.base_image.clone(),
        steps,
    })
}

// ── Argument builders shared with the infra adapters ─────────────────────────

/// Batch-mode installer arguments: no prompts, install into `prefix`.
#[must_use]
pub fn installer_args(prefix: &Path) -> Vec<String> {
    vec!["-b".to_string(), "-p".to_string(), display(prefix)]
}

#[must_use]
pub fn manager_update_args() -> Vec<String> {
    vec!["update".to_string(), "--yes".to_string(), "conda".to_string()]
}

#[must_use]
pub fn manager_install_args(extensions: &[String]) -> Vec<String> {
    let mut args = vec!["install".to_string(), "--yes".to_string()];
    args.extend(extensions.iter().cloned());
    args
}

#[must_use]
pub fn manager_build_args(version: &str, recipe_dir: &Path) -> Vec<String> {
    vec![
        "build".to_string(),
        "--python".to_string(),
        version.to_string(),
        display(recipe_dir),
    ]
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// True when `word` needs no quoting in a shell or Dockerfile line.
#[must_use]
pub fn is_plain_word(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@%,".contains(c))
}

/// Single-quote a word for POSIX sh when it contains anything unusual.
#[must_use]
pub fn shell_quote(word: &str) -> String {
    if is_plain_word(word) {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
