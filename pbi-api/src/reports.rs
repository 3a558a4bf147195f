//! # Reports
//!
//! - [list_reports](PbiClient::list_reports) - reports in a workspace
//! - [export_report](PbiClient::export_report) - download a report as a PBIX file

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Result,
    odata::{ODataList, Record},
    prelude::*,
};

/// Report metadata
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub id: String,

    /// Display name. Also used to name the exported artifact.
    #[serde(default)]
    pub name: String,

    /// Dataset the report is bound to
    #[serde(default)]
    pub dataset_id: String,

    #[serde(default)]
    pub embed_url: String,

    #[serde(default)]
    pub web_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
}

impl Record for Report {
    const KIND: &'static str = "Report";

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl PbiClient {
    /// Lists the reports in a workspace.
    pub async fn list_reports(&self, workspace_id: &str) -> Result<Vec<Report>> {
        let list: ODataList<Report> = self
            .client
            .get_request(&format!("/groups/{workspace_id}/reports"))
            .await?;
        Ok(list.into_valid())
    }

    /// Exports a report as a PBIX file and returns its bytes.
    ///
    /// The whole body is buffered before returning, so a transport failure
    /// part way through yields an error and no partial content.
    ///
    /// # Errors
    /// - [`PbiError::ApiError`] if the report cannot be exported (for example,
    ///   reports built on live connections or with incremental refresh)
    pub async fn export_report(&self, workspace_id: &str, report_id: &str) -> Result<Bytes> {
        let body = self
            .client
            .get_bytes(&format!("/groups/{workspace_id}/reports/{report_id}/Export"))
            .await?;
        debug!(report_id, bytes = body.len(), "report exported");
        Ok(body)
    }
}
