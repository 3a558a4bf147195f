//! Per-run outcome reports.
//!
//! A run returns `Ok` whenever no fatal step failed. Callers inspect the
//! [`RunReport`] to find out whether anything was skipped or failed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{error::BackupError, snapshot::Snapshot, steps::StepPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    /// Every item succeeded
    Ok,
    /// The step ran but some items failed
    Partial,
    /// The step itself failed
    Failed,
}

/// Result of one executed step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub policy: StepPolicy,
    pub status: StepStatus,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Item counts produced by a step that ran to completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl StepTally {
    pub fn ok(succeeded: usize) -> Self {
        Self {
            succeeded,
            failed: 0,
        }
    }

    /// Tally of a list of item outcomes
    pub fn of(items: &[ItemOutcome]) -> Self {
        let succeeded = items
            .iter()
            .filter(|item| item.status == ItemStatus::Succeeded)
            .count();
        Self {
            succeeded,
            failed: items.len() - succeeded,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn record(&mut self, step: &str, policy: StepPolicy, tally: StepTally) {
        let status = if tally.failed == 0 {
            StepStatus::Ok
        } else {
            StepStatus::Partial
        };
        self.steps.push(StepReport {
            step: step.to_string(),
            policy,
            status,
            succeeded: tally.succeeded,
            failed: tally.failed,
            error: None,
        });
    }

    pub fn record_failure(&mut self, step: &str, policy: StepPolicy, err: &BackupError) {
        self.steps.push(StepReport {
            step: step.to_string(),
            policy,
            status: StepStatus::Failed,
            succeeded: 0,
            failed: 0,
            error: Some(err.to_string()),
        });
    }

    pub fn step(&self, step: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// Items that succeeded in `step`; zero if the step did not run.
    pub fn succeeded(&self, step: &str) -> usize {
        self.step(step).map_or(0, |s| s.succeeded)
    }

    /// Items that failed in `step`; zero if the step did not run.
    pub fn failed(&self, step: &str) -> usize {
        self.step(step).map_or(0, |s| s.failed)
    }

    /// True if any fatal or degraded step failed or had failed items.
    /// Failures of optional steps do not count.
    pub fn is_degraded(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.status != StepStatus::Ok && s.policy != StepPolicy::Optional)
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for s in &self.steps {
            write!(f, "{:<18} {:<8} ok={} failed={}", s.step, s.status, s.succeeded, s.failed)?;
            if let Some(err) = &s.error {
                write!(f, " error: {err}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    Failed,
    /// Not attempted, e.g. a schedule whose dataset is missing in the target
    Skipped,
}

/// Outcome of one artifact export or import, or one schedule update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Name the item had in the source
    pub name: String,
    /// Artifact file or dataset name used in the destination. For a
    /// schedule, the id of the dataset it was applied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_name: Option<String>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(name: impl Into<String>, final_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            final_name,
            status: ItemStatus::Succeeded,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, final_name: Option<String>, error: impl ToString) -> Self {
        Self {
            name: name.into(),
            final_name,
            status: ItemStatus::Failed,
            error: Some(error.to_string()),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            final_name: None,
            status: ItemStatus::Skipped,
            error: Some(reason.into()),
        }
    }
}

/// Result of a backup run that reached the persist step
#[derive(Debug, Clone, Serialize)]
pub struct BackupOutcome {
    #[serde(skip)]
    pub snapshot: Snapshot,
    pub workspace_id: String,
    pub workspace_name: String,
    pub location: PathBuf,
    pub report: RunReport,
    pub exports: Vec<ItemOutcome>,
}

/// Result of a restore run that completed its fatal steps
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub snapshot_location: PathBuf,
    pub source_workspace_id: String,
    pub target_workspace_id: String,
    pub report: RunReport,
    pub imports: Vec<ItemOutcome>,
    pub schedules: Vec<ItemOutcome>,
}

/// One workspace of a backup-all run
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceBackupResult {
    pub workspace_id: String,
    pub workspace_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupAllOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub workspaces: Vec<WorkspaceBackupResult>,
}
