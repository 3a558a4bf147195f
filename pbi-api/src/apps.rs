//! # Apps
//!
//! Apps are listed tenant-wide for the calling principal. Service principals
//! often lack permission to call this endpoint at all.
//!
//! - [list_apps](PbiClient::list_apps) - installed apps visible to the principal

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    odata::{ODataList, Record},
    prelude::*,
};

/// Installed app metadata
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Workspace the app was published from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_id: String,
}

impl Record for App {
    const KIND: &'static str = "App";

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl App {
    /// True if the app was published from `workspace_id`.
    pub fn belongs_to(&self, workspace_id: &str) -> bool {
        self.workspace_id.eq_ignore_ascii_case(workspace_id)
    }
}

impl PbiClient {
    /// Lists the apps visible to the principal (all workspaces).
    pub async fn list_apps(&self) -> Result<Vec<App>> {
        let list: ODataList<App> = self.client.get_request("/apps").await?;
        Ok(list.into_valid())
    }
}
