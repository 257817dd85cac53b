//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while validating a `PipelineConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No target versions configured. Add at least one to `target_versions`.")]
    NoTargetVersions,

    #[error("Invalid target version '{0}': expected MAJOR.MINOR, e.g. 3.6")]
    InvalidVersion(String),

    #[error("Target version '{0}' is listed more than once.")]
    DuplicateVersion(String),

    #[error("Installer URL must use https: {0}")]
    InsecureInstallerUrl(String),

    #[error("{field} must be an absolute path: {path}")]
    RelativePath { field: &'static str, path: String },

    #[error("{0} must not be empty.")]
    EmptyList(&'static str),

    #[error("Recipe path has no file name: {0}")]
    InvalidRecipe(String),
}

// ── Pipeline errors ───────────────────────────────────────────────────────────

/// Fatal pipeline failures. Tolerated failures never become one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step '{step}' failed ({}){}", exit_label(.code), stderr_suffix(.stderr))]
    StepFailed {
        step: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("build for Python {version} could not be launched: {cause}")]
    BuildCrashed { version: String, cause: String },
}

/// Render an exit code for humans; `None` means the process died from a signal.
#[must_use]
pub fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
}

#[allow(clippy::ref_option)] // field reference handed over by the `#[error]` attribute
fn exit_label(code: &Option<i32>) -> String {
    describe_exit(*code)
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
