//! Renders a plan as an equivalent container build manifest.

use std::fmt::Write as _;

use crate::domain::plan::{FailurePolicy, Plan, StepAction, is_plain_word};

/// Render `plan` as a Dockerfile.
///
/// Tolerated steps get `|| true`; recipe staging becomes a `COPY` so the
/// recipe is taken from the build context.
#[must_use]
pub fn render(plan: &Plan) -> String {
    let mut out = format!("FROM {}\n", plan.base_image);
    for step in &plan.steps {
        let line = match &step.action {
            StepAction::StageRecipe { source, dest } => {
                copy_line(&source.display().to_string(), &dest.display().to_string())
            }
            action => match step.policy {
                FailurePolicy::Fatal => format!("RUN {}", action.shell_command()),
                FailurePolicy::Tolerated => format!("RUN {} || true", action.shell_command()),
            },
        };
        let _ = writeln!(out, "{line}");
    }
    out
}

/// `COPY` does not understand shell quoting, so paths that need it use the
/// JSON exec form.
fn copy_line(source: &str, dest: &str) -> String {
    if is_plain_word(source) && is_plain_word(dest) {
        return format!("COPY {source} {dest}");
    }
    match serde_json::to_string(&[source, dest]) {
        Ok(args) => format!("COPY {args}"),
        Err(_) => format!("COPY {source} {dest}"),
    }
}
