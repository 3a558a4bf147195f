//! # Dashboards
//!
//! - [list_dashboards](PbiClient::list_dashboards) - dashboards in a workspace

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    odata::{ODataList, Record},
    prelude::*,
};

/// Dashboard metadata
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub is_read_only: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub embed_url: String,
}

impl Record for Dashboard {
    const KIND: &'static str = "Dashboard";

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl PbiClient {
    /// Lists the dashboards in a workspace.
    pub async fn list_dashboards(&self, workspace_id: &str) -> Result<Vec<Dashboard>> {
        let list: ODataList<Dashboard> = self
            .client
            .get_request(&format!("/groups/{workspace_id}/dashboards"))
            .await?;
        Ok(list.into_valid())
    }
}
