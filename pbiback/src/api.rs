//! The remote calls a backup or restore run makes.
//!
//! [`WorkspaceApi`] is implemented for [`PbiClient`]; tests substitute an
//! in-memory implementation. Every call may fail with a transport, auth or
//! server error. The orchestrators treat those uniformly as "fetch failed"
//! and decide the consequence from the step policy.

use std::path::Path;

use bytes::Bytes;
use pbi::prelude::*;
use serde_json::Value;

#[allow(async_fn_in_trait)]
pub trait WorkspaceApi {
    async fn list_workspaces(&self) -> pbi::Result<Vec<Workspace>>;

    async fn get_workspace_settings(&self, workspace_id: &str) -> pbi::Result<WorkspaceSettings>;

    async fn list_reports(&self, workspace_id: &str) -> pbi::Result<Vec<Report>>;

    async fn list_datasets(&self, workspace_id: &str) -> pbi::Result<Vec<Dataset>>;

    async fn list_dataflows(&self, workspace_id: &str) -> pbi::Result<Vec<Dataflow>>;

    async fn list_dashboards(&self, workspace_id: &str) -> pbi::Result<Vec<Dashboard>>;

    /// Apps visible to the caller, across all workspaces.
    async fn list_apps(&self) -> pbi::Result<Vec<App>>;

    /// `Ok(None)` means the dataset has no schedule configured.
    async fn get_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
    ) -> pbi::Result<Option<Value>>;

    async fn update_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
        schedule: &Value,
    ) -> pbi::Result<()>;

    /// Binary export of a report.
    async fn export_report(&self, workspace_id: &str, report_id: &str) -> pbi::Result<Bytes>;

    /// Uploads an artifact as a new dataset named `dataset_name`.
    async fn import_artifact(
        &self,
        workspace_id: &str,
        path: &Path,
        dataset_name: &str,
    ) -> pbi::Result<()>;
}

impl WorkspaceApi for PbiClient {
    async fn list_workspaces(&self) -> pbi::Result<Vec<Workspace>> {
        Self::list_workspaces(self).await
    }

    async fn get_workspace_settings(&self, workspace_id: &str) -> pbi::Result<WorkspaceSettings> {
        Self::get_workspace_settings(self, workspace_id).await
    }

    async fn list_reports(&self, workspace_id: &str) -> pbi::Result<Vec<Report>> {
        Self::list_reports(self, workspace_id).await
    }

    async fn list_datasets(&self, workspace_id: &str) -> pbi::Result<Vec<Dataset>> {
        Self::list_datasets(self, workspace_id).await
    }

    async fn list_dataflows(&self, workspace_id: &str) -> pbi::Result<Vec<Dataflow>> {
        Self::list_dataflows(self, workspace_id).await
    }

    async fn list_dashboards(&self, workspace_id: &str) -> pbi::Result<Vec<Dashboard>> {
        Self::list_dashboards(self, workspace_id).await
    }

    async fn list_apps(&self) -> pbi::Result<Vec<App>> {
        Self::list_apps(self).await
    }

    async fn get_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
    ) -> pbi::Result<Option<Value>> {
        Self::get_refresh_schedule(self, workspace_id, dataset_id).await
    }

    async fn update_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
        schedule: &Value,
    ) -> pbi::Result<()> {
        Self::update_refresh_schedule(self, workspace_id, dataset_id, schedule).await
    }

    async fn export_report(&self, workspace_id: &str, report_id: &str) -> pbi::Result<Bytes> {
        Self::export_report(self, workspace_id, report_id).await
    }

    async fn import_artifact(
        &self,
        workspace_id: &str,
        path: &Path,
        dataset_name: &str,
    ) -> pbi::Result<()> {
        self.import_pbix(workspace_id, path, dataset_name, NameConflict::Abort)
            .await
            .map(|_| ())
    }
}
