//! Pipeline run report: what ran, what was tolerated, how each build ended.

use serde::{Deserialize, Serialize};

use crate::domain::plan::FailurePolicy;

/// Result of a single setup step that did not abort the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    /// The step failed but its policy is `Tolerated`.
    Tolerated {
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        reason: String,
        /// Last lines of the step's stderr, when it produced any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stderr_tail: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub policy: FailurePolicy,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Outcome of one `build --python <version>` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub version: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Last lines of the build's stderr; kept for failed builds only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
}

/// Report of a pipeline run that reached the end.
///
/// A report only exists for runs without fatal errors, so every report
/// describes a successful image build, even when all builds failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub base_image: String,
    /// SHA-256 of the downloaded installer, for audit. Never verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_sha256: Option<String>,
    pub steps: Vec<StepRecord>,
    pub builds: Vec<BuildRecord>,
}

impl PipelineReport {
    #[must_use]
    pub fn new(base_image: &str) -> Self {
        Self {
            base_image: base_image.to_string(),
            installer_sha256: None,
            steps: Vec::new(),
            builds: Vec::new(),
        }
    }

    pub fn failed_builds(&self) -> impl Iterator<Item = &BuildRecord> {
        self.builds.iter().filter(|b| !b.passed)
    }

    pub fn tolerated_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Tolerated { .. }))
    }
}

/// Lowercase hex encoding of a digest.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
