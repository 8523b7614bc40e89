use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single dataset item. Actor output has no fixed schema, so items stay
/// as open JSON objects.
pub type DatasetItem = serde_json::Map<String, serde_json::Value>;

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Metadata of an actor run, as returned by the run endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunData {
    pub id: String,
    #[serde(rename = "actId", default)]
    pub act_id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "defaultKeyValueStoreId", default)]
    pub default_key_value_store_id: String,
    #[serde(rename = "startedAt", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt", default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Run statuses after which the platform makes no further progress.
pub const TERMINAL_STATUSES: [&str; 4] = ["SUCCEEDED", "FAILED", "ABORTED", "TIMED-OUT"];

impl RunData {
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUSES.contains(&self.status.as_str())
    }

    pub fn succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }
}
