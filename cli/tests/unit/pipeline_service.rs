//! Unit tests for the `run_pipeline` service using `FakeHost` collaborators.

#![allow(clippy::expect_used)]

use std::collections::HashSet;

use anyhow::Result;
use buildbox_cli::application::services::pipeline::{PipelineOptions, run_pipeline};
use buildbox_cli::domain::{
    FailurePolicy, PipelineConfig, PipelineError, PipelineReport, StepOutcome, build_plan,
};

use crate::mocks::{FakeHost, RecordingReporter, Script};

const VERSIONS: [&str; 5] = ["2.7", "3.3", "3.4", "3.5", "3.6"];

async fn run_with(
    host: &FakeHost,
    reporter: &RecordingReporter,
    parallel_builds: bool,
) -> Result<PipelineReport> {
    let plan = build_plan(&PipelineConfig::default()).expect("default plan");
    run_pipeline(
        host,
        host,
        host,
        host,
        &plan,
        PipelineOptions {
            reporter,
            parallel_builds,
        },
    )
    .await
}

async fn run_script(script: Script) -> (FakeHost, Result<PipelineReport>) {
    let host = FakeHost::new(script);
    let reporter = RecordingReporter::default();
    let result = run_with(&host, &reporter, false).await;
    (host, result)
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_all_steps_run_in_required_order() {
    let (host, result) = run_script(Script::default()).await;
    result.expect("pipeline succeeds");
    assert_eq!(
        host.calls(),
        [
            "os.upgrade",
            "os.install gcc bzip2 tar",
            "fetch https://repo.continuum.io/miniconda/Miniconda3-4.3.21-Linux-x86_64.sh /miniconda.sh",
            "fs.chmod /miniconda.sh",
            "manager.bootstrap /miniconda.sh /miniconda",
            "manager.update",
            "manager.install conda-build anaconda-client jinja2",
            "fs.mkdir /recipe",
            "fs.copy meta.yaml /recipe/meta.yaml",
            "manager.build 2.7 /recipe",
            "manager.build 3.3 /recipe",
            "manager.build 3.4 /recipe",
            "manager.build 3.5 /recipe",
            "manager.build 3.6 /recipe",
        ]
    );
}

#[tokio::test]
async fn test_each_version_built_exactly_once_against_staged_recipe() {
    let (host, result) = run_script(Script::default()).await;
    result.expect("pipeline succeeds");
    let builds = host.calls_starting_with("manager.build");
    assert_eq!(builds.len(), VERSIONS.len());
    for version in VERSIONS {
        let expected = format!("manager.build {version} /recipe");
        assert_eq!(
            builds.iter().filter(|c| **c == expected).count(),
            1,
            "version {version} should be built once"
        );
    }
}

#[tokio::test]
async fn test_report_records_every_step_and_build() {
    let (_, result) = run_script(Script::default()).await;
    let report = result.expect("pipeline succeeds");
    assert_eq!(report.base_image, "quay.io/pypa/manylinux1_x86_64");
    assert_eq!(report.steps.len(), 9);
    assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Passed));
    assert_eq!(report.builds.len(), 5);
    assert!(report.builds.iter().all(|b| b.passed && b.exit_code == Some(0)));
    assert_eq!(report.installer_sha256, Some("ab".repeat(32)));
}

// ── Tolerated failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_build_does_not_stop_remaining_builds() {
    let (host, result) = run_script(Script::failing_builds(&["3.3"], 1)).await;
    let report = result.expect("pipeline still succeeds");
    assert_eq!(host.calls_starting_with("manager.build").len(), 5);
    let failed: Vec<&str> = report.failed_builds().map(|b| b.version.as_str()).collect();
    assert_eq!(failed, ["3.3"]);
    assert_eq!(report.builds[1].exit_code, Some(1));
}

#[tokio::test]
async fn test_failed_build_keeps_stderr_in_report_and_warning() {
    let host = FakeHost::new(Script::failing_builds(&["3.3"], 1));
    let reporter = RecordingReporter::default();
    let report = run_with(&host, &reporter, false).await.expect("succeeds");
    let failed = report.failed_builds().next().expect("one failed build");
    assert_eq!(failed.stderr_tail.as_deref(), Some("simulated failure"));
    assert!(report.builds.iter().filter(|b| b.passed).all(|b| b.stderr_tail.is_none()));
    assert!(
        reporter
            .warnings()
            .iter()
            .any(|w| w.starts_with("Python 3.3 build failed") && w.contains("simulated failure"))
    );
}

#[tokio::test]
async fn test_failed_build_stderr_survives_json_report() {
    let (_, result) = run_script(Script::failing_builds(&["3.6"], 1)).await;
    let report = result.expect("succeeds");
    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["builds"][4]["stderr_tail"], "simulated failure");
    assert!(json["builds"][0].get("stderr_tail").is_none());
}

#[tokio::test]
async fn test_every_build_failing_still_succeeds() {
    let (_, result) = run_script(Script::failing_builds(&VERSIONS, 1)).await;
    let report = result.expect("image build is still successful");
    assert_eq!(report.failed_builds().count(), 5);
}

#[tokio::test]
async fn test_failed_upgrade_still_installs_packages() {
    let script = Script {
        upgrade_code: 1,
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    let report = result.expect("upgrade failure is tolerated");
    let calls = host.calls();
    assert_eq!(calls[0], "os.upgrade");
    assert_eq!(calls[1], "os.install gcc bzip2 tar");
    assert_eq!(report.steps[0].policy, FailurePolicy::Tolerated);
    assert_eq!(
        report.steps[0].outcome,
        StepOutcome::Tolerated {
            exit_code: Some(1),
            reason: "exit code 1".to_string(),
            stderr_tail: Some("simulated failure".to_string()),
        }
    );
    assert_eq!(report.tolerated_steps().count(), 1);
}

#[tokio::test]
async fn test_upgrade_tool_missing_is_tolerated() {
    let script = Script {
        upgrade_spawn_fails: true,
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    let report = result.expect("upgrade spawn failure is tolerated");
    assert!(matches!(
        report.steps[0].outcome,
        StepOutcome::Tolerated { exit_code: None, .. }
    ));
    assert_eq!(host.calls_starting_with("manager.build").len(), 5);
}

#[tokio::test]
async fn test_tolerated_failures_are_reported_as_warnings() {
    let host = FakeHost::new(Script {
        upgrade_code: 100,
        ..Script::failing_builds(&["3.6"], 2)
    });
    let reporter = RecordingReporter::default();
    run_with(&host, &reporter, false).await.expect("succeeds");
    let warnings = reporter.warnings();
    assert!(warnings.iter().any(|w| w.contains("upgrade-os-packages failed")));
    assert!(warnings.iter().any(|w| w.contains("Python 3.6 build failed (exit code 2)")));
    assert!(warnings.iter().any(|w| w.contains("1 of 5 builds failed")));
}

// ── Fatal failures ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_package_install_aborts_before_download() {
    let script = Script {
        install_code: 1,
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    let err = result.expect_err("install failure is fatal");
    assert_eq!(host.calls(), ["os.upgrade", "os.install gcc bzip2 tar"]);
    assert!(host.calls_starting_with("fetch").is_empty());
    let pipeline = err.downcast_ref::<PipelineError>().expect("typed error");
    assert!(matches!(
        pipeline,
        PipelineError::StepFailed { step, code: Some(1), .. } if step == "install-os-packages"
    ));
}

#[tokio::test]
async fn test_failed_download_aborts_before_chmod() {
    let script = Script {
        fetch_fails: true,
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    let err = result.expect_err("download failure is fatal");
    assert!(format!("{err:#}").contains("connection refused"));
    assert!(host.calls_starting_with("fs.chmod").is_empty());
}

#[tokio::test]
async fn test_failed_self_update_aborts_before_extensions() {
    let script = Script {
        update_code: 3,
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    let err = result.expect_err("update failure is fatal");
    assert!(err.to_string().contains("update-manager"));
    assert_eq!(host.calls().last().map(String::as_str), Some("manager.update"));
}

#[tokio::test]
async fn test_failed_staging_aborts_before_any_build() {
    let script = Script {
        copy_fails: true,
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    result.expect_err("staging failure is fatal");
    assert!(host.calls_starting_with("manager.build").is_empty());
}

#[tokio::test]
async fn test_fatal_stderr_is_carried_in_error() {
    let script = Script {
        extensions_code: 1,
        ..Script::default()
    };
    let (_, result) = run_script(script).await;
    let err = result.expect_err("fatal");
    assert!(err.to_string().contains("simulated failure"));
}

#[tokio::test]
async fn test_build_that_cannot_launch_is_fatal_in_sequential_mode() {
    let script = Script {
        build_crashes: HashSet::from(["3.4".to_string()]),
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    let err = result.expect_err("crash is fatal");
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::BuildCrashed { version, .. }) if version == "3.4"
    ));
    assert_eq!(host.calls_starting_with("manager.build").len(), 3);
}

#[cfg(unix)]
#[tokio::test]
async fn test_build_killed_by_signal_is_tolerated() {
    let script = Script {
        build_killed: HashSet::from(["3.5".to_string()]),
        ..Script::default()
    };
    let (host, result) = run_script(script).await;
    let report = result.expect("signal death is a tolerated build failure");
    assert_eq!(host.calls_starting_with("manager.build").len(), 5);
    let killed = &report.builds[3];
    assert!(!killed.passed);
    assert_eq!(killed.exit_code, None);
    assert_eq!(killed.stderr_tail.as_deref(), Some("Killed"));
}

// ── Parallel builds ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parallel_builds_report_each_version_independently() {
    let host = FakeHost::new(Script::failing_builds(&["2.7", "3.5"], 1));
    let reporter = RecordingReporter::default();
    let report = run_with(&host, &reporter, true).await.expect("succeeds");
    let versions: Vec<&str> = report.builds.iter().map(|b| b.version.as_str()).collect();
    assert_eq!(versions, VERSIONS);
    let passed: Vec<bool> = report.builds.iter().map(|b| b.passed).collect();
    assert_eq!(passed, [false, true, true, false, true]);
}

#[tokio::test]
async fn test_parallel_crash_still_runs_every_build() {
    let host = FakeHost::new(Script {
        build_crashes: HashSet::from(["2.7".to_string()]),
        ..Script::default()
    });
    let reporter = RecordingReporter::default();
    let err = run_with(&host, &reporter, true)
        .await
        .expect_err("crash is fatal");
    assert_eq!(host.calls_starting_with("manager.build").len(), 5);
    assert!(err.to_string().contains("Python 2.7"));
}
