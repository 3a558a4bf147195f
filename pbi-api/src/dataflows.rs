//! # Dataflows
//!
//! - [list_dataflows](PbiClient::list_dataflows) - dataflows in a workspace

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    odata::{ODataList, Record},
    prelude::*,
};

/// Dataflow metadata. Dataflows are identified by `objectId`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Dataflow {
    #[serde(default)]
    pub object_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_by: Option<String>,
}

impl Record for Dataflow {
    const KIND: &'static str = "Dataflow";

    fn record_id(&self) -> &str {
        &self.object_id
    }
}

impl PbiClient {
    /// Lists the dataflows in a workspace.
    pub async fn list_dataflows(&self, workspace_id: &str) -> Result<Vec<Dataflow>> {
        let list: ODataList<Dataflow> = self
            .client
            .get_request(&format!("/groups/{workspace_id}/dataflows"))
            .await?;
        Ok(list.into_valid())
    }
}
