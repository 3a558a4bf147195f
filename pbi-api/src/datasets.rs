//! # Datasets
//!
//! - [list_datasets](PbiClient::list_datasets) - datasets in a workspace

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    odata::{ODataList, Record},
    prelude::*,
};

/// Dataset metadata
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_by: Option<String>,

    #[serde(default)]
    pub is_refreshable: bool,

    #[serde(default)]
    pub is_effective_identity_required: bool,

    #[serde(default)]
    pub is_effective_identity_roles_required: bool,
}

impl Record for Dataset {
    const KIND: &'static str = "Dataset";

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl PbiClient {
    /// Lists the datasets in a workspace.
    pub async fn list_datasets(&self, workspace_id: &str) -> Result<Vec<Dataset>> {
        let list: ODataList<Dataset> = self
            .client
            .get_request(&format!("/groups/{workspace_id}/datasets"))
            .await?;
        Ok(list.into_valid())
    }
}
