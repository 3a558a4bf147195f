//! # Workspaces
//!
//! Workspaces (called "groups" in the REST paths) are the containers that
//! hold reports, datasets, dataflows and dashboards.
//!
//! ## Workspace methods on PbiClient
//!
//! - [list_workspaces](PbiClient::list_workspaces) - workspaces the principal can access
//! - [get_workspace_settings](PbiClient::get_workspace_settings) - one workspace's settings
//! - [create_workspace](PbiClient::create_workspace) - create a new workspace

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    Result,
    odata::{ODataList, Record},
    prelude::*,
};

/// Workspace as returned by the list endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub workspace_type: Option<String>,

    #[serde(default)]
    pub is_read_only: bool,

    #[serde(default)]
    pub is_on_dedicated_capacity: bool,
}

impl Record for Workspace {
    const KIND: &'static str = "Workspace";

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Workspace identity and configuration captured in a snapshot.
///
/// Fields the client does not model are kept in `extra` so nothing the
/// server reported is lost.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub workspace_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default)]
    pub is_read_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_id: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CreateWorkspaceBody<'a> {
    name: &'a str,
}

impl PbiClient {
    /// Lists the workspaces the authenticated principal can access.
    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let list: ODataList<Workspace> = self.client.get_request("/groups").await?;
        Ok(list.into_valid())
    }

    /// Retrieves a workspace's identity and settings.
    ///
    /// # Errors
    /// - [`PbiError::NotFound`] if the workspace doesn't exist
    /// - [`PbiError::Validation`] if the response describes a different workspace
    pub async fn get_workspace_settings(&self, workspace_id: &str) -> Result<WorkspaceSettings> {
        let mut settings: WorkspaceSettings = self
            .client
            .get_request(&format!("/groups/{workspace_id}"))
            .await?;
        if settings.id.is_empty() {
            // some tenants omit the id on single-group reads
            settings.id = workspace_id.to_string();
        }
        ensure!(
            settings.id.eq_ignore_ascii_case(workspace_id),
            ValidationSnafu {
                message: format!(
                    "workspace settings id {} does not match requested {workspace_id}",
                    settings.id
                )
            }
        );
        Ok(settings)
    }

    /// Creates a new workspace.
    ///
    /// # Errors
    /// - [`PbiError::Validation`] if `name` is empty or the server rejects it
    pub async fn create_workspace(&self, name: &str) -> Result<Workspace> {
        ensure!(
            !name.trim().is_empty(),
            ValidationSnafu {
                message: "workspace name is empty"
            }
        );
        self.client
            .post_request("/groups", &CreateWorkspaceBody { name })
            .await
    }
}
