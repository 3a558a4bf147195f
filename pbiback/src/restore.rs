//! Restore orchestration.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    Orchestrator, Result,
    api::WorkspaceApi,
    artifact::{desired_name, list_artifacts},
    error::*,
    reconcile::NameReconciler,
    report::{ItemOutcome, RestoreOutcome, RunReport, StepTally},
    snapshot::Snapshot,
    steps::{RESTORE_PLAN, RestoreStep, StepDecision},
    store::FsSnapshotStore,
};

/// Working state of one restore run
struct RestoreRun<'a> {
    target: &'a str,
    location: &'a Path,
    /// snapshot directory resolved from `location` once it has loaded
    dir: PathBuf,
    snapshot: Option<Snapshot>,
    imports: Vec<ItemOutcome>,
    schedules: Vec<ItemOutcome>,
}

impl<A: WorkspaceApi> Orchestrator<A> {
    /// Restores a snapshot into `target_workspace_id`.
    ///
    /// Each artifact becomes a new dataset whose name is made unique against
    /// the datasets already in the target. Refresh schedules are then
    /// re-applied by dataset name. Schedule restoration never fails the run.
    ///
    /// # Errors
    /// - [`BackupError::WorkspaceBusy`] if another run holds the target
    /// - [`BackupError::InvalidLocation`], [`BackupError::SnapshotLoad`] or
    ///   [`BackupError::Json`] if the snapshot cannot be loaded
    /// - [`BackupError::ListArtifacts`] if the artifact directory cannot be read
    /// - [`BackupError::ListTargetDatasets`] if existing target datasets cannot be listed
    pub async fn run_restore(
        &self,
        target_workspace_id: &str,
        location: &Path,
    ) -> Result<RestoreOutcome> {
        let _guard = self.locks.try_acquire(target_workspace_id)?;
        info!(target_workspace_id, location = %location.display(), "restore started");

        let mut run = RestoreRun {
            target: target_workspace_id,
            location,
            dir: location.to_path_buf(),
            snapshot: None,
            imports: Vec::new(),
            schedules: Vec::new(),
        };
        let mut report = RunReport::default();

        for planned in RESTORE_PLAN {
            let step: &'static str = planned.step.into();
            match self.restore_step(planned.step, &mut run).await {
                Ok(tally) => report.record(step, planned.policy, tally),
                Err(err) => {
                    report.record_failure(step, planned.policy, &err);
                    if planned.policy.apply(step, &err) == StepDecision::Abort {
                        return Err(err);
                    }
                    if planned.step == RestoreStep::RestoreSchedules {
                        warn!(target_workspace_id, "continuing without refresh schedules");
                    }
                }
            }
        }

        info!(
            target_workspace_id,
            imported = report.succeeded("import_artifacts"),
            schedules = report.succeeded("restore_schedules"),
            degraded = report.is_degraded(),
            "restore finished"
        );
        Ok(RestoreOutcome {
            snapshot_location: location.to_path_buf(),
            source_workspace_id: run
                .snapshot
                .map(|s| s.workspace_id)
                .unwrap_or_default(),
            target_workspace_id: target_workspace_id.to_string(),
            report,
            imports: run.imports,
            schedules: run.schedules,
        })
    }

    async fn restore_step(&self, step: RestoreStep, run: &mut RestoreRun<'_>) -> Result<StepTally> {
        match step {
            RestoreStep::LoadSnapshot => {
                let snapshot = self.store.load(run.location)?;
                run.dir = FsSnapshotStore::snapshot_dir(run.location);
                run.snapshot = Some(snapshot);
                Ok(StepTally::ok(1))
            }
            RestoreStep::ImportArtifacts => self.import_artifacts(run).await,
            RestoreStep::RestoreSchedules => self.restore_schedules(run).await,
        }
    }

    /// Imports every artifact file of the snapshot. Individual failures are
    /// counted; only listing failures abort.
    async fn import_artifacts(&self, run: &mut RestoreRun<'_>) -> Result<StepTally> {
        let artifacts = list_artifacts(&run.dir).context(ListArtifactsSnafu { path: &run.dir })?;
        let existing = self
            .api
            .list_datasets(run.target)
            .await
            .context(ListTargetDatasetsSnafu {
                workspace_id: run.target,
            })?;
        let mut names = NameReconciler::with_existing(existing.iter().map(|d| d.name.as_str()));
        debug!(
            artifacts = artifacts.len(),
            existing = existing.len(),
            "importing artifacts"
        );

        for path in &artifacts {
            let desired = desired_name(path);
            let final_name = names.reconcile(&desired);
            let outcome = match self.api.import_artifact(run.target, path, &final_name).await {
                Ok(()) => {
                    debug!(dataset = %final_name, file = %path.display(), "artifact imported");
                    ItemOutcome::succeeded(desired, Some(final_name))
                }
                Err(err) => {
                    warn!(dataset = %final_name, file = %path.display(), error = %err, "artifact import failed");
                    ItemOutcome::failed(desired, Some(final_name), err)
                }
            };
            run.imports.push(outcome);
        }
        Ok(StepTally::of(&run.imports))
    }

    /// Re-targets each captured schedule onto the dataset that now carries
    /// its dataset name. A renamed or missing dataset is skipped and counted.
    async fn restore_schedules(&self, run: &mut RestoreRun<'_>) -> Result<StepTally> {
        let Some(snapshot) = run.snapshot.as_ref() else {
            return Ok(StepTally::default());
        };
        if snapshot.refresh_schedules.is_empty() {
            return Ok(StepTally::default());
        }
        let current = self
            .api
            .list_datasets(run.target)
            .await
            .context(ListTargetDatasetsSnafu {
                workspace_id: run.target,
            })?;
        // with duplicate names in the target, the first listed dataset gets the schedule
        let mut by_name: HashMap<&str, &str> = HashMap::new();
        for dataset in &current {
            by_name
                .entry(dataset.name.as_str())
                .or_insert(dataset.id.as_str());
        }

        for schedule in &snapshot.refresh_schedules {
            let name = schedule.dataset_name.as_str();
            let outcome = match by_name.get(name) {
                None => {
                    warn!(dataset = name, "no dataset with this name in target, schedule skipped");
                    ItemOutcome::skipped(name, "dataset not found in target workspace")
                }
                Some(&dataset_id) => match self
                    .api
                    .update_refresh_schedule(run.target, dataset_id, &schedule.schedule)
                    .await
                {
                    Ok(()) => {
                        debug!(dataset = name, dataset_id, "refresh schedule restored");
                        ItemOutcome::succeeded(name, Some(dataset_id.to_string()))
                    }
                    Err(err) => {
                        warn!(dataset = name, error = %err, "refresh schedule update failed");
                        ItemOutcome::failed(name, Some(dataset_id.to_string()), err)
                    }
                },
            };
            run.schedules.push(outcome);
        }
        Ok(StepTally::of(&run.schedules))
    }
}
