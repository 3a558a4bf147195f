//! Backup orchestration.

use std::{collections::HashSet, path::PathBuf};

use chrono::Utc;
use pbi::prelude::*;
use snafu::prelude::*;
use tracing::{debug, error, info, warn};

use crate::{
    Result,
    api::WorkspaceApi,
    artifact::{PBIX_DIR, artifact_file_stem, case_distinct_stem, write_artifact},
    error::*,
    locks::WorkspaceLocks,
    reconcile::NameReconciler,
    report::{
        BackupAllOutcome, BackupOutcome, ItemOutcome, RunReport, StepTally, WorkspaceBackupResult,
    },
    snapshot::Snapshot,
    steps::{BACKUP_PLAN, BackupStep, StepDecision},
    store::FsSnapshotStore,
};

/// Runs backups and restores against one API and one snapshot store.
///
/// Steps within a run execute sequentially. Independent runs may share an
/// orchestrator; runs on the same workspace are rejected while one is in
/// flight (see [`WorkspaceLocks`]).
#[derive(Debug)]
pub struct Orchestrator<A> {
    pub(crate) api: A,
    pub(crate) store: FsSnapshotStore,
    pub(crate) locks: WorkspaceLocks,
}

/// Working state of one backup run
struct BackupRun {
    snapshot: Snapshot,
    run_dir: PathBuf,
    exports: Vec<ItemOutcome>,
}

impl<A: WorkspaceApi> Orchestrator<A> {
    pub fn new(api: A, store: FsSnapshotStore) -> Self {
        Self {
            api,
            store,
            locks: WorkspaceLocks::new(),
        }
    }

    /// Shares a lock registry with other orchestrators.
    pub fn with_locks(self, locks: WorkspaceLocks) -> Self {
        Self { locks, ..self }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &FsSnapshotStore {
        &self.store
    }

    pub fn locks(&self) -> &WorkspaceLocks {
        &self.locks
    }

    /// Backs up one workspace into a new snapshot.
    ///
    /// Succeeds as long as the workspace settings were fetched and the
    /// snapshot was persisted; inspect [`BackupOutcome::report`] for
    /// collections or artifacts that could not be captured.
    ///
    /// # Errors
    /// - [`BackupError::WorkspaceBusy`] if another run holds the workspace
    /// - [`BackupError::WorkspaceSettings`] if the workspace cannot be read
    /// - [`BackupError::SnapshotSave`] (or `SnapshotExists`, `Io`, `Json`) if persisting fails
    pub async fn run_backup(&self, workspace_id: &str) -> Result<BackupOutcome> {
        let _guard = self.locks.try_acquire(workspace_id)?;
        // one timestamp names the run directory and stamps the snapshot
        let started = Utc::now();
        info!(workspace_id, %started, "backup started");

        let mut run = BackupRun {
            snapshot: Snapshot::new(workspace_id, started),
            run_dir: self.store.run_dir(workspace_id, started),
            exports: Vec::new(),
        };
        let mut report = RunReport::default();

        for planned in BACKUP_PLAN {
            let step: &'static str = planned.step.into();
            match self.backup_step(planned.step, &mut run).await {
                Ok(tally) => report.record(step, planned.policy, tally),
                Err(err) => {
                    report.record_failure(step, planned.policy, &err);
                    if planned.policy.apply(step, &err) == StepDecision::Abort {
                        return Err(err);
                    }
                }
            }
        }

        info!(
            workspace_id,
            path = %run.run_dir.display(),
            counts = %run.snapshot.counts(),
            degraded = report.is_degraded(),
            "backup finished"
        );
        Ok(BackupOutcome {
            workspace_id: run.snapshot.workspace_id.clone(),
            workspace_name: run.snapshot.workspace_name.clone(),
            snapshot: run.snapshot,
            location: run.run_dir,
            report,
            exports: run.exports,
        })
    }

    async fn backup_step(&self, step: BackupStep, run: &mut BackupRun) -> Result<StepTally> {
        let ws = run.snapshot.workspace_id.clone();
        let ws = ws.as_str();
        let snapshot = &mut run.snapshot;
        match step {
            BackupStep::Settings => {
                let settings = self
                    .api
                    .get_workspace_settings(ws)
                    .await
                    .context(WorkspaceSettingsSnafu { workspace_id: ws })?;
                snapshot.workspace_name.clone_from(&settings.name);
                snapshot.workspace_settings = settings;
                Ok(StepTally::ok(1))
            }
            BackupStep::Reports => {
                snapshot.reports = self.api.list_reports(ws).await.context(FetchSnafu {
                    resource: "reports",
                    workspace_id: ws,
                })?;
                Ok(StepTally::ok(snapshot.reports.len()))
            }
            BackupStep::Datasets => {
                snapshot.datasets = self.api.list_datasets(ws).await.context(FetchSnafu {
                    resource: "datasets",
                    workspace_id: ws,
                })?;
                Ok(StepTally::ok(snapshot.datasets.len()))
            }
            BackupStep::Dataflows => {
                snapshot.dataflows = self.api.list_dataflows(ws).await.context(FetchSnafu {
                    resource: "dataflows",
                    workspace_id: ws,
                })?;
                Ok(StepTally::ok(snapshot.dataflows.len()))
            }
            BackupStep::Dashboards => {
                snapshot.dashboards = self.api.list_dashboards(ws).await.context(FetchSnafu {
                    resource: "dashboards",
                    workspace_id: ws,
                })?;
                Ok(StepTally::ok(snapshot.dashboards.len()))
            }
            BackupStep::Apps => {
                let apps = self.api.list_apps().await.context(FetchSnafu {
                    resource: "apps",
                    workspace_id: ws,
                })?;
                snapshot.apps = apps.into_iter().filter(|app| app.belongs_to(ws)).collect();
                Ok(StepTally::ok(snapshot.apps.len()))
            }
            BackupStep::RefreshSchedules => Ok(self.fetch_schedules(snapshot).await),
            BackupStep::ExportArtifacts => self.export_artifacts(run).await,
            BackupStep::Persist => {
                let dir = self.store.save(&run.snapshot)?;
                run.run_dir = dir;
                Ok(StepTally::ok(1))
            }
        }
    }

    /// One attempt per dataset. A dataset without a schedule is omitted and
    /// a failed fetch is counted; neither is an error.
    async fn fetch_schedules(&self, snapshot: &mut Snapshot) -> StepTally {
        let ws = snapshot.workspace_id.as_str();
        let mut schedules = Vec::new();
        let mut failed = 0;
        for dataset in &snapshot.datasets {
            match self.api.get_refresh_schedule(ws, &dataset.id).await {
                Ok(Some(schedule)) => schedules.push(RefreshSchedule {
                    dataset_id: dataset.id.clone(),
                    dataset_name: dataset.name.clone(),
                    schedule,
                }),
                Ok(None) => {
                    debug!(dataset = %dataset.name, "no refresh schedule configured");
                }
                Err(err) => {
                    debug!(dataset = %dataset.name, error = %err, "refresh schedule fetch failed");
                    failed += 1;
                }
            }
        }
        let tally = StepTally {
            succeeded: schedules.len(),
            failed,
        };
        snapshot.refresh_schedules = schedules;
        tally
    }

    /// Exports one artifact per report into the run directory.
    async fn export_artifacts(&self, run: &mut BackupRun) -> Result<StepTally> {
        let ws = run.snapshot.workspace_id.as_str();
        if run.snapshot.reports.is_empty() {
            return Ok(StepTally::default());
        }
        let dir = self.store.create_run_dir(ws, run.snapshot.timestamp)?;
        let pbix_dir = dir.join(PBIX_DIR);
        // stems are unique without regard to case; only exact duplicate
        // names fall through to a suffix
        let mut stems = NameReconciler::ignore_case();
        let mut seen: HashSet<&str> = HashSet::new();
        for report in &run.snapshot.reports {
            let mut candidate = artifact_file_stem(&report.name);
            if stems.is_taken(&candidate)
                && !seen.contains(report.name.as_str())
                && let Some(escaped) = case_distinct_stem(&candidate, |s| stems.is_taken(s))
            {
                candidate = escaped;
            }
            seen.insert(report.name.as_str());
            let stem = stems.reconcile(&candidate);
            let file_name = format!("{stem}.pbix");
            let outcome = match self.api.export_report(ws, &report.id).await {
                Ok(content) => match write_artifact(&pbix_dir, &stem, &content) {
                    Ok(_) => {
                        debug!(report = %report.name, file = %file_name, "report exported");
                        ItemOutcome::succeeded(&report.name, Some(file_name))
                    }
                    Err(err) => {
                        error!(report = %report.name, error = %err, "writing artifact failed");
                        ItemOutcome::failed(&report.name, Some(file_name), err)
                    }
                },
                Err(err) => {
                    warn!(report = %report.name, error = %err, "report export failed");
                    ItemOutcome::failed(&report.name, None, err)
                }
            };
            run.exports.push(outcome);
        }
        Ok(StepTally::of(&run.exports))
    }

    /// Backs up every workspace the caller can see, one after another.
    /// A fatal error in one workspace does not stop the others.
    ///
    /// # Errors
    /// - [`BackupError::ListWorkspaces`] if the workspaces cannot be listed
    pub async fn run_backup_all(&self) -> Result<BackupAllOutcome> {
        let workspaces = self.api.list_workspaces().await.context(ListWorkspacesSnafu)?;
        info!(count = workspaces.len(), "backing up all workspaces");
        let mut outcome = BackupAllOutcome::default();
        for workspace in workspaces {
            let result = match self.run_backup(&workspace.id).await {
                Ok(backup) => {
                    outcome.succeeded += 1;
                    WorkspaceBackupResult {
                        workspace_id: workspace.id,
                        workspace_name: workspace.name,
                        location: Some(backup.location),
                        degraded: backup.report.is_degraded(),
                        error: None,
                    }
                }
                Err(err) => {
                    error!(workspace_id = %workspace.id, error = %err, "workspace backup failed");
                    outcome.failed += 1;
                    WorkspaceBackupResult {
                        workspace_id: workspace.id,
                        workspace_name: workspace.name,
                        location: None,
                        degraded: true,
                        error: Some(err.to_string()),
                    }
                }
            };
            outcome.workspaces.push(result);
        }
        Ok(outcome)
    }
}
