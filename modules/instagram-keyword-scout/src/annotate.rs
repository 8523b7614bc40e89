use apify_client::DatasetItem;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::input::SearchRequest;
use crate::records::ResultMetadata;

pub const METADATA_KEY: &str = "_metadata";

/// Copy `record` and tag it with provenance metadata. Records that are not
/// JSON objects are wrapped as `{ "value": record }` first.
pub fn annotate(
    record: &Value,
    index: usize,
    request: &SearchRequest,
    actor_id: &str,
    at: DateTime<Utc>,
) -> Result<DatasetItem> {
    let mut out = match record {
        Value::Object(fields) => fields.clone(),
        other => {
            let mut wrapped = DatasetItem::new();
            wrapped.insert("value".into(), other.clone());
            wrapped
        }
    };

    let metadata = ResultMetadata {
        search_keyword: request.keyword.clone(),
        search_type: request.search_type.clone(),
        results_type: request.results_type.clone(),
        item_index: index,
        scraped_at: at,
        original_actor: actor_id.to_string(),
    };
    out.insert(METADATA_KEY.into(), serde_json::to_value(metadata)?);
    Ok(out)
}

/// Annotate a whole batch in delivery order. Each item gets its own
/// timestamp, clamped so the sequence never goes backwards.
pub fn annotate_all(
    records: &[Value],
    request: &SearchRequest,
    actor_id: &str,
) -> Result<Vec<DatasetItem>> {
    let mut last: Option<DateTime<Utc>> = None;
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let now = Utc::now();
            let at = last.map_or(now, |prev| prev.max(now));
            last = Some(at);
            annotate(record, index, request, actor_id, at)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const ACTOR: &str = "apify/instagram-search-scraper";

    #[test]
    fn metadata_attached_without_touching_fields() {
        let request = SearchRequest::new("coffee");
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let record = json!({ "url": "https://instagram.com/p/a", "likesCount": 12 });

        let out = annotate(&record, 3, &request, ACTOR, at).unwrap();

        assert_eq!(out["url"], "https://instagram.com/p/a");
        assert_eq!(out["likesCount"], 12);
        assert_eq!(
            out[METADATA_KEY],
            json!({
                "searchKeyword": "coffee",
                "searchType": "place",
                "resultsType": "posts",
                "itemIndex": 3,
                "scrapedAt": "2024-03-01T10:00:00.000Z",
                "originalActor": ACTOR
            })
        );
        // input left as-is
        assert!(record.get(METADATA_KEY).is_none());
    }

    #[test]
    fn existing_metadata_key_is_replaced() {
        let request = SearchRequest::new("coffee");
        let record = json!({ "_metadata": "stale" });
        let out = annotate(&record, 0, &request, ACTOR, Utc::now()).unwrap();
        assert_eq!(out[METADATA_KEY]["searchKeyword"], "coffee");
    }

    #[test]
    fn scalar_records_are_wrapped() {
        let request = SearchRequest::new("coffee");
        let out = annotate(&json!("plain"), 0, &request, ACTOR, Utc::now()).unwrap();
        assert_eq!(out["value"], "plain");
        assert_eq!(out[METADATA_KEY]["itemIndex"], 0);
    }

    #[test]
    fn batch_indexes_follow_delivery_order() {
        let request = SearchRequest::new("coffee");
        let records: Vec<Value> = (0..4).map(|i| json!({ "n": i })).collect();

        let out = annotate_all(&records, &request, ACTOR).unwrap();

        assert_eq!(out.len(), 4);
        for (i, item) in out.iter().enumerate() {
            assert_eq!(item["n"], i);
            assert_eq!(item[METADATA_KEY]["itemIndex"], i);
        }

        let stamps: Vec<String> = out
            .iter()
            .map(|item| item[METADATA_KEY]["scrapedAt"].as_str().unwrap().to_string())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn empty_batch() {
        let out = annotate_all(&[], &SearchRequest::new("coffee"), ACTOR).unwrap();
        assert!(out.is_empty());
    }
}
