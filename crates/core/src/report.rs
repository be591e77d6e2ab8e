//! Run report
//!
//! Outcome of a lifecycle run, stage by stage and step by step. Serialized
//! as camelCase JSON by `lifeline run --output json`.

use crate::resolver::AppHandle;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a stage or step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    /// Not reached because an earlier step failed
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub name: String,
    pub status: Status,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    /// 1-based position in the script
    pub index: usize,
    pub name: String,
    pub status: Status,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
}

/// The step that aborted the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub stage: String,
    pub step: String,
    /// Failure class, see `LifelineError::kind`
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stages: Vec<StageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    /// Last resolved app handle, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_handle: Option<AppHandle>,
    /// Set when quitting the browser session failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_error: Option<String>,
}

impl RunReport {
    pub fn count(&self, status: Status) -> usize {
        self.stages
            .iter()
            .flat_map(|stage| stage.steps.iter())
            .filter(|step| step.status == status)
            .count()
    }

    pub fn total_steps(&self) -> usize {
        self.stages.iter().map(|stage| stage.steps.len()).sum()
    }
}
