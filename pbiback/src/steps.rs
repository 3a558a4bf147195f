//! Ordered step tables for backup and restore runs.
//!
//! Each step carries a [`StepPolicy`]. When a step fails,
//! [`StepPolicy::apply`] logs the failure at the policy's severity and
//! decides whether the run aborts.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::BackupError;

/// What a step failure means for the run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepPolicy {
    /// The run aborts and returns the error
    Fatal,
    /// The run continues with this step's output missing or partial
    Degraded,
    /// The run continues; the failure is expected for some principals
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Continue,
    Abort,
}

impl StepPolicy {
    /// Logs a failed step and decides whether the run continues.
    pub fn apply(self, step: &str, err: &BackupError) -> StepDecision {
        match self {
            Self::Fatal => {
                error!(step, error = %err, "step failed, aborting run");
                StepDecision::Abort
            }
            Self::Degraded => {
                warn!(step, error = %err, "step failed, continuing with reduced output");
                StepDecision::Continue
            }
            Self::Optional => {
                debug!(step, error = %err, "optional step failed");
                StepDecision::Continue
            }
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackupStep {
    Settings,
    Reports,
    Datasets,
    Dataflows,
    Dashboards,
    Apps,
    RefreshSchedules,
    ExportArtifacts,
    Persist,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RestoreStep {
    LoadSnapshot,
    ImportArtifacts,
    RestoreSchedules,
}

/// One row of a step table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStep<S> {
    pub step: S,
    pub policy: StepPolicy,
}

const fn planned<S>(step: S, policy: StepPolicy) -> PlannedStep<S> {
    PlannedStep { step, policy }
}

/// Backup steps, in execution order. Refresh schedules are fetched per
/// dataset, so they follow the dataset listing.
pub const BACKUP_PLAN: &[PlannedStep<BackupStep>] = &[
    planned(BackupStep::Settings, StepPolicy::Fatal),
    planned(BackupStep::Reports, StepPolicy::Degraded),
    planned(BackupStep::Datasets, StepPolicy::Degraded),
    planned(BackupStep::Dataflows, StepPolicy::Degraded),
    planned(BackupStep::Dashboards, StepPolicy::Degraded),
    planned(BackupStep::Apps, StepPolicy::Optional),
    planned(BackupStep::RefreshSchedules, StepPolicy::Degraded),
    planned(BackupStep::ExportArtifacts, StepPolicy::Degraded),
    planned(BackupStep::Persist, StepPolicy::Fatal),
];

/// Restore steps, in execution order. Artifact recovery comes before
/// configuration recovery, and only the former can fail the run.
pub const RESTORE_PLAN: &[PlannedStep<RestoreStep>] = &[
    planned(RestoreStep::LoadSnapshot, StepPolicy::Fatal),
    planned(RestoreStep::ImportArtifacts, StepPolicy::Fatal),
    planned(RestoreStep::RestoreSchedules, StepPolicy::Degraded),
];
