//! # Imports
//!
//! Uploads a PBIX file into a workspace, creating a dataset and its report.
//!
//! - [import_pbix](PbiClient::import_pbix) - upload a PBIX file from disk
//! - [import_pbix_bytes](PbiClient::import_pbix_bytes) - upload PBIX content already in memory

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::{debug, info};

use crate::{Result, http_client::deserialize_json, prelude::*};

/// What the service does when a dataset with the requested display name
/// already exists in the target workspace.
#[derive(
    Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "PascalCase")]
pub enum NameConflict {
    /// Fail the import
    #[default]
    Abort,
    /// Replace the existing dataset and report
    Overwrite,
    /// Create a second dataset with the same name
    Ignore,
    /// Generate a unique name
    GenerateUniqueName,
}

/// Acknowledgement of an accepted import (http 200 or 202).
///
/// The import runs asynchronously on the service; the id can be used to
/// poll its progress.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportAccepted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PbiClient {
    /// Uploads a PBIX file as a new dataset named `display_name`.
    ///
    /// # Errors
    /// - [`PbiError::File`] if the file cannot be read
    /// - [`PbiError::Validation`] if `display_name` is empty or the service rejects the upload
    pub async fn import_pbix(
        &self,
        workspace_id: &str,
        path: &Path,
        display_name: &str,
        conflict: NameConflict,
    ) -> Result<ImportAccepted> {
        let content = std::fs::read(path).context(FileSnafu { path })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload.pbix".to_string(), |n| n.to_string_lossy().to_string());
        self.import_pbix_bytes(workspace_id, Bytes::from(content), &file_name, display_name, conflict)
            .await
    }

    /// Uploads PBIX content as a new dataset named `display_name`.
    pub async fn import_pbix_bytes(
        &self,
        workspace_id: &str,
        content: Bytes,
        file_name: &str,
        display_name: &str,
        conflict: NameConflict,
    ) -> Result<ImportAccepted> {
        ensure!(
            !display_name.trim().is_empty(),
            ValidationSnafu {
                message: "dataset display name is empty"
            }
        );
        let size = content.len();
        let part = Part::stream_with_length(content, size as u64)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| PbiError::Other {
                message: format!("invalid mime type: {e}"),
            })?;
        let form = Form::new().part("file", part);
        let query = vec![
            ("datasetDisplayName".to_string(), display_name.to_string()),
            ("nameConflict".to_string(), conflict.to_string()),
        ];
        debug!(workspace_id, display_name, bytes = size, "uploading pbix");
        let body = self
            .client
            .post_multipart(&format!("/groups/{workspace_id}/imports"), query, form)
            .await?;
        let accepted = if body.iter().all(u8::is_ascii_whitespace) {
            ImportAccepted::default()
        } else {
            deserialize_json(&body)?
        };
        info!(workspace_id, display_name, import_id = ?accepted.id, "import accepted");
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn name_conflict_wire_names() {
        assert_eq!(NameConflict::Abort.to_string(), "Abort");
        assert_eq!(
            NameConflict::GenerateUniqueName.to_string(),
            "GenerateUniqueName"
        );
        assert_eq!(
            NameConflict::from_str("Overwrite").unwrap(),
            NameConflict::Overwrite
        );
        assert_eq!(NameConflict::default(), NameConflict::Abort);
    }
}
