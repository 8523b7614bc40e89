use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::input::SearchRequest;

pub const SUMMARY_KEY: &str = "SUMMARY";
pub const ERROR_KEY: &str = "ERROR";
pub const INPUT_KEY: &str = "INPUT";

pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";
pub const STATUS_FAILED: &str = "FAILED";

/// Provenance block attached to every stored result record under `_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub search_keyword: String,
    pub search_type: String,
    pub results_type: String,
    pub item_index: usize,
    #[serde(with = "iso_millis")]
    pub scraped_at: DateTime<Utc>,
    pub original_actor: String,
}

/// Stored under `SUMMARY` when a run succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub search_keyword: String,
    pub search_type: String,
    pub results_type: String,
    pub search_limit: u32,
    pub results_limit: u32,
    pub total_items: usize,
    #[serde(with = "iso_millis")]
    pub scraped_at: DateTime<Utc>,
    pub original_run_id: String,
    pub status: String,
}

impl RunSummary {
    pub fn succeeded(
        request: &SearchRequest,
        total_items: usize,
        run_id: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            search_keyword: request.keyword.clone(),
            search_type: request.search_type.clone(),
            results_type: request.results_type.clone(),
            search_limit: request.search_limit,
            results_limit: request.results_limit,
            total_items,
            scraped_at: at,
            original_run_id: run_id.to_string(),
            status: STATUS_SUCCEEDED.to_string(),
        }
    }
}

/// Stored under `ERROR` when a run fails after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    pub search_keyword: String,
    pub search_type: String,
    pub results_type: String,
    #[serde(with = "iso_millis")]
    pub error_at: DateTime<Utc>,
    pub status: String,
}

impl ErrorRecord {
    pub fn failed(request: &SearchRequest, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            search_keyword: request.keyword.clone(),
            search_type: request.search_type.clone(),
            results_type: request.results_type.clone(),
            error_at: at,
            status: STATUS_FAILED.to_string(),
        }
    }
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn summary_serializes_with_camel_case_keys() {
        let mut request = SearchRequest::new("coffee");
        request.search_type = "hashtag".into();
        request.results_limit = 5;

        let summary = RunSummary::succeeded(&request, 5, "run1", at());
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "searchKeyword": "coffee",
                "searchType": "hashtag",
                "resultsType": "posts",
                "searchLimit": 10,
                "resultsLimit": 5,
                "totalItems": 5,
                "scrapedAt": "2024-03-01T10:00:00.000Z",
                "originalRunId": "run1",
                "status": "SUCCEEDED"
            })
        );
    }

    #[test]
    fn error_record_shape() {
        let record = ErrorRecord::failed(&SearchRequest::new("coffee"), "boom", at());
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "message": "boom",
                "searchKeyword": "coffee",
                "searchType": "place",
                "resultsType": "posts",
                "errorAt": "2024-03-01T10:00:00.000Z",
                "status": "FAILED"
            })
        );
    }

    #[test]
    fn timestamps_parse_back() {
        let summary = RunSummary::succeeded(&SearchRequest::new("x"), 0, "r", at());
        let value = serde_json::to_value(&summary).unwrap();
        let back: RunSummary = serde_json::from_value(value).unwrap();
        assert_eq!(back.scraped_at, at());
    }
}
