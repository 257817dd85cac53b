//! Application service — provisioning pipeline use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use std::path::Path;
use std::process::Output;

use anyhow::{Context, Result};
use futures_util::future::join_all;

use crate::application::ports::{
    InstallerFetcher, OsPackages, PackageManager, ProgressReporter, StagingFs,
};
use crate::domain::error::describe_exit;
use crate::domain::{
    BuildRecord, FailurePolicy, PipelineError, PipelineReport, Plan, Step, StepAction,
    StepOutcome, StepRecord,
};

/// Lines of stderr kept when a fatal step fails.
const STDERR_TAIL_LINES: usize = 20;

pub struct PipelineOptions<'a, R: ProgressReporter> {
    pub reporter: &'a R,
    /// Fan the per-version builds out concurrently instead of one by one.
    pub parallel_builds: bool,
}

/// Execute `plan` against the injected collaborators.
///
/// Setup steps run strictly in order. A fatal failure aborts at once and no
/// later step runs. Tolerated failures (OS upgrade, a build exiting non-zero)
/// are recorded in the report and the pipeline carries on. Only a build that
/// cannot be launched at all is fatal.
///
/// # Errors
///
/// Returns an error on the first fatal step failure.
pub async fn run_pipeline(
    os: &impl OsPackages,
    fetcher: &impl InstallerFetcher,
    manager: &impl PackageManager,
    fs: &impl StagingFs,
    plan: &Plan,
    opts: PipelineOptions<'_, impl ProgressReporter>,
) -> Result<PipelineReport> {
    let PipelineOptions {
        reporter,
        parallel_builds,
    } = opts;
    let mut report = PipelineReport::new(&plan.base_image);

    for step in plan.setup_steps() {
        reporter.step(&format!("{}...", summary(&step.action)));
        tracing::debug!(step = %step.name, command = %step.action.shell_command(), "running step");
        let outcome = run_setup_step(os, fetcher, manager, fs, step, &mut report).await?;
        if let StepOutcome::Tolerated {
            reason,
            stderr_tail,
            ..
        } = &outcome
        {
            tracing::warn!(step = %step.name, %reason, stderr = ?stderr_tail, "tolerated step failure");
            reporter.warn(&with_tail(
                format!("{} failed ({reason}), continuing", step.name),
                stderr_tail.as_deref(),
            ));
        }
        report.steps.push(StepRecord {
            name: step.name.clone(),
            policy: step.policy,
            outcome,
        });
    }
    reporter.success("build environment ready");

    let builds: Vec<(&str, &Path)> = plan
        .build_steps()
        .filter_map(|step| match &step.action {
            StepAction::Build {
                version,
                recipe_dir,
                ..
            } => Some((version.as_str(), recipe_dir.as_path())),
            _ => None,
        })
        .collect();

    report.builds = if parallel_builds {
        build_concurrently(manager, reporter, &builds).await?
    } else {
        build_sequentially(manager, reporter, &builds).await?
    };

    let failed = report.failed_builds().count();
    if failed == 0 {
        reporter.success(&format!("all {} builds passed", report.builds.len()));
    } else {
        reporter.warn(&format!(
            "{failed} of {} builds failed; image build still succeeds",
            report.builds.len()
        ));
    }
    Ok(report)
}

async fn run_setup_step(
    os: &impl OsPackages,
    fetcher: &impl InstallerFetcher,
    manager: &impl PackageManager,
    fs: &impl StagingFs,
    step: &Step,
    report: &mut PipelineReport,
) -> Result<StepOutcome> {
    match &step.action {
        StepAction::UpgradeOsPackages { .. } => settle(step, os.upgrade().await),
        StepAction::InstallOsPackages { packages, .. } => settle(step, os.install(packages).await),
        StepAction::DownloadInstaller { url, dest } => {
            let fetched = fetcher
                .fetch(url, dest)
                .await
                .with_context(|| format!("step '{}': downloading {url}", step.name))?;
            // No checksum is published alongside the installer; the digest is
            // recorded for audit only.
            tracing::info!(
                bytes = fetched.bytes,
                sha256 = %fetched.sha256,
                "installer downloaded without integrity verification"
            );
            report.installer_sha256 = Some(fetched.sha256);
            Ok(StepOutcome::Passed)
        }
        StepAction::MakeExecutable { path } => {
            fs.set_executable(path)
                .with_context(|| format!("step '{}'", step.name))?;
            Ok(StepOutcome::Passed)
        }
        StepAction::RunInstaller { installer, prefix } => {
            settle(step, manager.bootstrap(installer, prefix).await)
        }
        StepAction::UpdateManager { .. } => settle(step, manager.self_update().await),
        StepAction::InstallExtensions { extensions, .. } => {
            settle(step, manager.install_extensions(extensions).await)
        }
        StepAction::CreateStagingDir { path } => {
            fs.create_dir_all(path)
                .with_context(|| format!("step '{}'", step.name))?;
            Ok(StepOutcome::Passed)
        }
        StepAction::StageRecipe { source, dest } => {
            let bytes = fs
                .copy(source, dest)
                .with_context(|| format!("step '{}'", step.name))?;
            tracing::debug!(bytes, dest = %dest.display(), "recipe staged");
            Ok(StepOutcome::Passed)
        }
        StepAction::Build { .. } => {
            anyhow::bail!("build step '{}' cannot run as a setup step", step.name)
        }
    }
}

/// Apply a step's failure policy to the result of an external command.
fn settle(step: &Step, result: Result<Output>) -> Result<StepOutcome> {
    match (step.policy, result) {
        (_, Ok(out)) if out.status.success() => Ok(StepOutcome::Passed),
        (FailurePolicy::Tolerated, Ok(out)) => Ok(StepOutcome::Tolerated {
            exit_code: out.status.code(),
            reason: describe_exit(out.status.code()),
            stderr_tail: failure_tail(&out.stderr),
        }),
        (FailurePolicy::Tolerated, Err(e)) => Ok(StepOutcome::Tolerated {
            exit_code: None,
            reason: format!("{e:#}"),
            stderr_tail: None,
        }),
        (FailurePolicy::Fatal, Ok(out)) => Err(PipelineError::StepFailed {
            step: step.name.clone(),
            code: out.status.code(),
            stderr: stderr_tail(&out.stderr),
        }
        .into()),
        (FailurePolicy::Fatal, Err(e)) => Err(e.context(format!("step '{}'", step.name))),
    }
}

async fn run_build(
    manager: &impl PackageManager,
    version: &str,
    recipe_dir: &Path,
) -> Result<BuildRecord, PipelineError> {
    match manager.build(version, recipe_dir).await {
        Ok(out) => {
            let passed = out.status.success();
            Ok(BuildRecord {
                version: version.to_string(),
                passed,
                exit_code: out.status.code(),
                stderr_tail: if passed {
                    None
                } else {
                    failure_tail(&out.stderr)
                },
            })
        }
        Err(e) => Err(PipelineError::BuildCrashed {
            version: version.to_string(),
            cause: format!("{e:#}"),
        }),
    }
}

async fn build_sequentially(
    manager: &impl PackageManager,
    reporter: &impl ProgressReporter,
    builds: &[(&str, &Path)],
) -> Result<Vec<BuildRecord>> {
    let mut records = Vec::with_capacity(builds.len());
    for &(version, recipe_dir) in builds {
        reporter.step(&format!("building for Python {version}..."));
        let record = run_build(manager, version, recipe_dir).await?;
        report_build(reporter, &record);
        records.push(record);
    }
    Ok(records)
}

/// Every build runs to completion even if another one crashes; the first
/// crash (in version order) is returned afterwards.
async fn build_concurrently(
    manager: &impl PackageManager,
    reporter: &impl ProgressReporter,
    builds: &[(&str, &Path)],
) -> Result<Vec<BuildRecord>> {
    let versions: Vec<&str> = builds.iter().map(|(v, _)| *v).collect();
    reporter.step(&format!(
        "building for Python {} concurrently...",
        versions.join(", ")
    ));

    let results = join_all(
        builds
            .iter()
            .map(|&(version, recipe_dir)| run_build(manager, version, recipe_dir)),
    )
    .await;

    let mut records = Vec::with_capacity(results.len());
    let mut crash = None;
    for result in results {
        match result {
            Ok(record) => {
                report_build(reporter, &record);
                records.push(record);
            }
            Err(e) => {
                crash.get_or_insert(e);
            }
        }
    }
    match crash {
        Some(e) => Err(e.into()),
        None => Ok(records),
    }
}

fn report_build(reporter: &impl ProgressReporter, record: &BuildRecord) {
    if record.passed {
        reporter.success(&format!("Python {} build passed", record.version));
    } else {
        tracing::warn!(
            version = %record.version,
            exit_code = ?record.exit_code,
            stderr = ?record.stderr_tail,
            "build failed"
        );
        reporter.warn(&with_tail(
            format!(
                "Python {} build failed ({}), continuing",
                record.version,
                describe_exit(record.exit_code)
            ),
            record.stderr_tail.as_deref(),
        ));
    }
}

fn summary(action: &StepAction) -> String {
    match action {
        StepAction::UpgradeOsPackages { .. } => "upgrading OS packages".to_string(),
        StepAction::InstallOsPackages { packages, .. } => {
            format!("installing OS packages ({})", packages.join(", "))
        }
        StepAction::DownloadInstaller { url, .. } => format!("downloading {url}"),
        StepAction::MakeExecutable { path } => format!("marking {} executable", path.display()),
        StepAction::RunInstaller { prefix, .. } => {
            format!("installing package manager into {}", prefix.display())
        }
        StepAction::UpdateManager { .. } => "updating package manager".to_string(),
        StepAction::InstallExtensions { extensions, .. } => {
            format!("installing extensions ({})", extensions.join(", "))
        }
        StepAction::CreateStagingDir { path } => format!("creating {}", path.display()),
        StepAction::StageRecipe { source, dest } => {
            format!("staging {} at {}", source.display(), dest.display())
        }
        StepAction::Build { version, .. } => format!("building for Python {version}"),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// `stderr_tail`, or `None` when the process wrote nothing useful.
fn failure_tail(stderr: &[u8]) -> Option<String> {
    let tail = stderr_tail(stderr);
    (!tail.trim().is_empty()).then_some(tail)
}

/// Append an indented stderr excerpt below a warning line.
fn with_tail(message: String, tail: Option<&str>) -> String {
    match tail {
        Some(tail) => tail.lines().fold(message, |mut out, line| {
            out.push_str("\n      ");
            out.push_str(line);
            out
        }),
        None => message,
    }
}
