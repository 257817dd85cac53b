//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod dockerfile;
pub mod error;
pub mod plan;
pub mod report;

pub use config::{OsPackageTool, PipelineConfig, validate_target_versions};
pub use error::{ConfigError, PipelineError};
pub use plan::{FailurePolicy, Plan, Step, StepAction, build_plan};
pub use report::{BuildRecord, PipelineReport, StepOutcome, StepRecord};
