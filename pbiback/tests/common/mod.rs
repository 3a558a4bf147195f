//! In-memory workspace API used by the orchestration tests.
#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use parking_lot::Mutex;
use pbi::prelude::*;
use pbiback::{
    Orchestrator,
    api::WorkspaceApi,
    store::{COMPLETE_BACKUP_FILE, FsSnapshotStore},
};
use serde_json::{Value, json};

#[derive(Debug, Default, Clone)]
pub struct FakeWorkspace {
    pub name: String,
    pub reports: Vec<Report>,
    pub datasets: Vec<Dataset>,
    pub dataflows: Vec<Dataflow>,
    pub dashboards: Vec<Dashboard>,
    /// dataset id -> schedule
    pub schedules: HashMap<String, Value>,
    /// report id -> exported bytes
    pub exports: HashMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub workspaces: BTreeMap<String, FakeWorkspace>,
    pub apps: Vec<App>,
    /// operation names that fail, e.g. "list_reports"
    pub failing_ops: HashSet<String>,
    /// operation name -> number of calls that succeed before it starts failing
    pub failing_after: HashMap<String, usize>,
    /// report ids whose export fails
    pub failing_exports: HashSet<String>,
    /// dataset names whose import fails
    pub failing_imports: HashSet<String>,
    /// (workspace, dataset name) per import call, in order
    pub imports: Vec<(String, String)>,
    /// (workspace, dataset id, schedule) per update call
    pub schedule_updates: Vec<(String, String, Value)>,
    /// number of calls per operation
    pub calls: HashMap<String, usize>,
    /// workspace snapshot directory whose run directories get a directory
    /// named like the completion file on every export, so persisting fails
    pub block_completion_in: Option<PathBuf>,
    next_id: usize,
}

#[derive(Debug, Default)]
pub struct FakeApi {
    pub state: Mutex<FakeState>,
}

pub fn report(id: &str, name: &str, dataset_id: &str) -> Report {
    Report {
        id: id.into(),
        name: name.into(),
        dataset_id: dataset_id.into(),
        embed_url: String::new(),
        web_url: String::new(),
        report_type: None,
    }
}

pub fn dataset(id: &str, name: &str) -> Dataset {
    Dataset {
        id: id.into(),
        name: name.into(),
        configured_by: None,
        is_refreshable: true,
        is_effective_identity_required: false,
        is_effective_identity_roles_required: false,
    }
}

pub fn schedule(day: &str) -> Value {
    json!({ "days": [day], "times": ["07:00"], "enabled": true, "localTimeZoneId": "UTC" })
}

fn failure(op: &str) -> PbiError {
    PbiError::ApiError {
        code: 500,
        method: "GET".into(),
        url: op.into(),
        message: "injected failure".into(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workspace(&self, id: &str, workspace: FakeWorkspace) {
        self.state.lock().workspaces.insert(id.into(), workspace);
    }

    /// Source workspace with one dataset and report per name, each dataset
    /// scheduled on a different day.
    pub fn add_source_workspace(&self, id: &str, report_names: &[&str]) {
        let mut ws = FakeWorkspace {
            name: format!("Workspace {id}"),
            ..FakeWorkspace::default()
        };
        for (idx, name) in report_names.iter().enumerate() {
            let ds_id = format!("{id}-d{idx}");
            let rp_id = format!("{id}-r{idx}");
            ws.datasets.push(dataset(&ds_id, name));
            ws.reports.push(report(&rp_id, name, &ds_id));
            ws.schedules
                .insert(ds_id, schedule(&format!("Day{idx}")));
            ws.exports
                .insert(rp_id, format!("pbix:{name}:{idx}").into_bytes());
        }
        self.add_workspace(id, ws);
    }

    pub fn fail(&self, op: &str) {
        self.state.lock().failing_ops.insert(op.into());
    }

    /// The first `n` calls of `op` succeed, later ones fail.
    pub fn fail_after(&self, op: &str, n: usize) {
        self.state.lock().failing_after.insert(op.into(), n);
    }

    pub fn fail_export(&self, report_id: &str) {
        self.state.lock().failing_exports.insert(report_id.into());
    }

    pub fn block_snapshot_completion(&self, workspace_dir: &Path) {
        self.state.lock().block_completion_in = Some(workspace_dir.to_path_buf());
    }

    pub fn fail_import(&self, dataset_name: &str) {
        self.state.lock().failing_imports.insert(dataset_name.into());
    }

    pub fn dataset_names(&self, workspace_id: &str) -> Vec<String> {
        self.state
            .lock()
            .workspaces
            .get(workspace_id)
            .map(|ws| ws.datasets.iter().map(|d| d.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn imports(&self) -> Vec<(String, String)> {
        self.state.lock().imports.clone()
    }

    pub fn schedule_updates(&self) -> Vec<(String, String, Value)> {
        self.state.lock().schedule_updates.clone()
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().calls.get(op).copied().unwrap_or(0)
    }

    fn enter(&self, op: &str) -> pbi::Result<()> {
        let mut state = self.state.lock();
        let count = {
            let calls = state.calls.entry(op.into()).or_default();
            *calls += 1;
            *calls
        };
        let exhausted = state.failing_after.get(op).is_some_and(|&n| count > n);
        if exhausted || state.failing_ops.contains(op) {
            return Err(failure(op));
        }
        Ok(())
    }

    fn with_workspace<T>(
        &self,
        workspace_id: &str,
        f: impl FnOnce(&mut FakeWorkspace) -> T,
    ) -> pbi::Result<T> {
        let mut state = self.state.lock();
        let ws = state
            .workspaces
            .get_mut(workspace_id)
            .ok_or_else(|| PbiError::NotFound {
                obj_type: "Workspace".into(),
                key: workspace_id.into(),
            })?;
        Ok(f(ws))
    }
}

impl WorkspaceApi for FakeApi {
    async fn list_workspaces(&self) -> pbi::Result<Vec<Workspace>> {
        self.enter("list_workspaces")?;
        Ok(self
            .state
            .lock()
            .workspaces
            .iter()
            .map(|(id, ws)| Workspace {
                id: id.clone(),
                name: ws.name.clone(),
                workspace_type: Some("Workspace".into()),
                is_read_only: false,
                is_on_dedicated_capacity: false,
            })
            .collect())
    }

    async fn get_workspace_settings(&self, workspace_id: &str) -> pbi::Result<WorkspaceSettings> {
        self.enter("get_workspace_settings")?;
        self.with_workspace(workspace_id, |ws| WorkspaceSettings {
            id: workspace_id.into(),
            name: ws.name.clone(),
            workspace_type: Some("Workspace".into()),
            ..WorkspaceSettings::default()
        })
    }

    async fn list_reports(&self, workspace_id: &str) -> pbi::Result<Vec<Report>> {
        self.enter("list_reports")?;
        self.with_workspace(workspace_id, |ws| ws.reports.clone())
    }

    async fn list_datasets(&self, workspace_id: &str) -> pbi::Result<Vec<Dataset>> {
        self.enter("list_datasets")?;
        self.with_workspace(workspace_id, |ws| ws.datasets.clone())
    }

    async fn list_dataflows(&self, workspace_id: &str) -> pbi::Result<Vec<Dataflow>> {
        self.enter("list_dataflows")?;
        self.with_workspace(workspace_id, |ws| ws.dataflows.clone())
    }

    async fn list_dashboards(&self, workspace_id: &str) -> pbi::Result<Vec<Dashboard>> {
        self.enter("list_dashboards")?;
        self.with_workspace(workspace_id, |ws| ws.dashboards.clone())
    }

    async fn list_apps(&self) -> pbi::Result<Vec<App>> {
        self.enter("list_apps")?;
        Ok(self.state.lock().apps.clone())
    }

    async fn get_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
    ) -> pbi::Result<Option<Value>> {
        self.enter("get_refresh_schedule")?;
        self.with_workspace(workspace_id, |ws| ws.schedules.get(dataset_id).cloned())
    }

    async fn update_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
        schedule: &Value,
    ) -> pbi::Result<()> {
        self.enter("update_refresh_schedule")?;
        self.with_workspace(workspace_id, |ws| {
            ws.schedules.insert(dataset_id.into(), schedule.clone());
        })?;
        self.state.lock().schedule_updates.push((
            workspace_id.into(),
            dataset_id.into(),
            schedule.clone(),
        ));
        Ok(())
    }

    async fn export_report(&self, workspace_id: &str, report_id: &str) -> pbi::Result<Bytes> {
        self.enter("export_report")?;
        let blocked = self.state.lock().block_completion_in.clone();
        if let Some(dir) = blocked {
            for entry in std::fs::read_dir(&dir).expect("workspace dir").flatten() {
                let _ = std::fs::create_dir(entry.path().join(COMPLETE_BACKUP_FILE));
            }
        }
        if self.state.lock().failing_exports.contains(report_id) {
            return Err(failure("export_report"));
        }
        self.with_workspace(workspace_id, |ws| ws.exports.get(report_id).cloned())?
            .map(Bytes::from)
            .ok_or_else(|| PbiError::NotFound {
                obj_type: "Report".into(),
                key: report_id.into(),
            })
    }

    async fn import_artifact(
        &self,
        workspace_id: &str,
        path: &Path,
        dataset_name: &str,
    ) -> pbi::Result<()> {
        self.enter("import_artifact")?;
        let content = std::fs::read(path).map_err(|source| PbiError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let mut state = self.state.lock();
        state
            .imports
            .push((workspace_id.into(), dataset_name.into()));
        if state.failing_imports.contains(dataset_name) {
            return Err(failure("import_artifact"));
        }
        state.next_id += 1;
        let id = format!("{workspace_id}-imported-{}", state.next_id);
        let ws = state
            .workspaces
            .get_mut(workspace_id)
            .ok_or_else(|| PbiError::NotFound {
                obj_type: "Workspace".into(),
                key: workspace_id.into(),
            })?;
        ws.datasets.push(dataset(&id, dataset_name));
        ws.exports.insert(format!("{id}-report"), content);
        Ok(())
    }
}

/// Orchestrator over a fresh store in a temporary directory.
pub fn orchestrator(api: FakeApi) -> (Orchestrator<FakeApi>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = FsSnapshotStore::new(tmp.path().join("backups"));
    (Orchestrator::new(api, store), tmp)
}
