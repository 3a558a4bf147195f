//! The captured state of one workspace at one point in time.

use chrono::{DateTime, Utc};
use pbi::prelude::*;
use serde::{Deserialize, Serialize};

/// Everything a backup run captured for one workspace.
///
/// Written once by the backup orchestrator and only read afterwards.
/// Every element of every collection belongs to `workspace_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Capture time; also names the snapshot directory
    pub timestamp: DateTime<Utc>,
    pub workspace_id: String,
    #[serde(default)]
    pub workspace_name: String,
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub dataflows: Vec<Dataflow>,
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
    #[serde(default)]
    pub apps: Vec<App>,
    #[serde(default)]
    pub refresh_schedules: Vec<RefreshSchedule>,
    #[serde(default)]
    pub workspace_settings: WorkspaceSettings,
}

/// Number of items per collection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub reports: usize,
    pub datasets: usize,
    pub dataflows: usize,
    pub dashboards: usize,
    pub apps: usize,
    pub refresh_schedules: usize,
}

impl Snapshot {
    /// Empty snapshot of `workspace_id` taken at `timestamp`.
    pub fn new(workspace_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            workspace_id: workspace_id.into(),
            workspace_name: String::new(),
            reports: Vec::new(),
            datasets: Vec::new(),
            dataflows: Vec::new(),
            dashboards: Vec::new(),
            apps: Vec::new(),
            refresh_schedules: Vec::new(),
            workspace_settings: WorkspaceSettings::default(),
        }
    }

    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            reports: self.reports.len(),
            datasets: self.datasets.len(),
            dataflows: self.dataflows.len(),
            dashboards: self.dashboards.len(),
            apps: self.apps.len(),
            refresh_schedules: self.refresh_schedules.len(),
        }
    }
}

impl std::fmt::Display for SnapshotCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reports={} datasets={} dataflows={} dashboards={} apps={} schedules={}",
            self.reports,
            self.datasets,
            self.dataflows,
            self.dashboards,
            self.apps,
            self.refresh_schedules
        )
    }
}
