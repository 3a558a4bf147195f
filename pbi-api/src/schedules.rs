//! # Refresh schedules
//!
//! The schedule configuration is kept as an opaque JSON value: it is read
//! from one dataset and written back, unmodified, to another.
//!
//! - [get_refresh_schedule](PbiClient::get_refresh_schedule) - read a dataset's schedule
//! - [update_refresh_schedule](PbiClient::update_refresh_schedule) - apply a schedule to a dataset

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, prelude::*};

/// A dataset's refresh schedule as captured in a backup.
///
/// The dataset *name* is recorded alongside the id because ids are minted
/// anew when the dataset is imported elsewhere.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSchedule {
    pub dataset_id: String,
    pub dataset_name: String,
    pub schedule: Value,
}

/// PATCH body wrapper expected by the update endpoint
#[derive(Serialize)]
struct UpdateScheduleBody<'a> {
    value: &'a Value,
}

/// Server-managed fields that the update endpoint rejects.
const READ_ONLY_FIELDS: &[&str] = &["@odata.context"];

fn update_payload(schedule: &Value) -> Value {
    match schedule {
        Value::Object(map) => {
            let mut map = map.clone();
            for key in READ_ONLY_FIELDS {
                map.remove(*key);
            }
            Value::Object(map)
        }
        other => other.clone(),
    }
}

impl PbiClient {
    /// Returns the refresh schedule of a dataset, or `None` if the dataset has
    /// no schedule configured (http 404).
    pub async fn get_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
    ) -> Result<Option<Value>> {
        self.client
            .get_optional(&format!(
                "/groups/{workspace_id}/datasets/{dataset_id}/refreshSchedule"
            ))
            .await
    }

    /// Applies a schedule configuration, as returned by
    /// [`get_refresh_schedule`](Self::get_refresh_schedule), to a dataset.
    pub async fn update_refresh_schedule(
        &self,
        workspace_id: &str,
        dataset_id: &str,
        schedule: &Value,
    ) -> Result<()> {
        let payload = update_payload(schedule);
        self.client
            .patch_request(
                &format!("/groups/{workspace_id}/datasets/{dataset_id}/refreshSchedule"),
                &UpdateScheduleBody { value: &payload },
            )
            .await
    }
}
