use semver::Version;
use serde::Serialize;
use storefront_core::{Operation, Severity};
use storefront_selection::SelectionModel;

/// Computes what applying the current selection would do.
pub trait ChangePlanner {
    fn compute_change_plan(&self, model: &SelectionModel) -> PlanResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub id: String,
    pub name: String,
    pub operation: Operation,
    pub version: Version,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanResult {
    pub severity: Severity,
    pub details: Vec<String>,
    pub steps: Vec<PlanStep>,
}

impl PlanResult {
    pub fn cancelled(detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Cancel,
            details: vec![detail.into()],
            steps: Vec::new(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            details: vec![detail.into()],
            steps: Vec::new(),
        }
    }

    /// True when the steps may be carried out, possibly with warnings.
    pub fn can_proceed(&self) -> bool {
        matches!(self.severity, Severity::Ok | Severity::Warning)
    }

    /// Line-oriented preview: a header, one line per step, one per detail.
    pub fn preview_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "plan severity={} steps={} details={}",
            self.severity.as_str(),
            self.steps.len(),
            self.details.len()
        )];
        for step in &self.steps {
            let mut line = format!(
                "step operation={} id={} version={}",
                step.operation.verb(),
                step.id,
                step.version
            );
            if !step.features.is_empty() {
                line.push_str(&format!(" features={}", step.features.join(",")));
            }
            lines.push(line);
        }
        for detail in &self.details {
            lines.push(format!("detail {detail}"));
        }
        lines
    }
}
