//! File exports of a finished run: a JSON document, a flattened CSV table,
//! and a plain-text summary for the terminal.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use apify_client::DatasetItem;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::orchestrator::RunOutcome;
use crate::records::iso_millis;

/// How many field names of the first record the summary lists.
const SAMPLE_FIELDS: usize = 10;

/// `instagram_<keyword>_<YYYYmmdd_HHMMSS>`. Keyword characters outside
/// `[A-Za-z0-9_-]` become `_`, so the stem is always a single file name.
pub fn file_stem(keyword: &str, at: DateTime<Utc>) -> String {
    let keyword: String = keyword
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("instagram_{}_{}", keyword, at.format("%Y%m%d_%H%M%S"))
}

/// Write `{ metadata, data }` as pretty JSON. Returns the written path.
pub fn write_json(outcome: &RunOutcome, dir: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.json"));
    let doc = serde_json::json!({
        "metadata": outcome.summary,
        "data": outcome.records,
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&doc)?)?;
    tracing::info!(path = %path.display(), "Data saved to JSON");
    Ok(path)
}

/// Write the records as CSV with nested objects flattened to dotted columns.
/// Returns `None` without touching the disk when there are no records.
pub fn write_csv(outcome: &RunOutcome, dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    if outcome.records.is_empty() {
        tracing::warn!("No data to save to CSV");
        return Ok(None);
    }

    let rows: Vec<Vec<(String, String)>> = outcome.records.iter().map(flatten).collect();

    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        for (key, _) in row {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&columns)?;
    for row in &rows {
        let cells = columns.iter().map(|col| {
            row.iter()
                .find(|(key, _)| key == col)
                .map(|(_, v)| v.as_str())
                .unwrap_or("")
        });
        writer.write_record(cells)?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), rows = rows.len(), "Data saved to CSV");
    Ok(Some(path))
}

/// Flatten one record into (column, cell) pairs in key order.
pub fn flatten(record: &DatasetItem) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into(record, "", &mut out);
    out
}

fn flatten_into(fields: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in fields {
        let column = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(nested, &column, out),
            Value::Null => out.push((column, String::new())),
            Value::String(s) => out.push((column, s.clone())),
            other => out.push((column, other.to_string())),
        }
    }
}

/// Human-readable digest of a run.
pub fn render_summary(outcome: &RunOutcome) -> String {
    let summary = &outcome.summary;
    let rule = "=".repeat(50);
    let mut out = String::new();

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "SCRAPING SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Keyword: {}", summary.search_keyword);
    let _ = writeln!(out, "Search Type: {}", summary.search_type);
    let _ = writeln!(out, "Results Type: {}", summary.results_type);
    let _ = writeln!(out, "Total Items: {}", summary.total_items);
    let _ = writeln!(out, "Scraped At: {}", iso_millis::format(&summary.scraped_at));
    let _ = writeln!(out, "Run ID: {}", summary.original_run_id);

    if let Some(first) = outcome.records.first() {
        let _ = writeln!(out, "\nSample Data Fields:");
        for key in first.keys().take(SAMPLE_FIELDS) {
            let _ = writeln!(out, "   - {key}");
        }
        if first.len() > SAMPLE_FIELDS {
            let _ = writeln!(out, "   ... and {} more fields", first.len() - SAMPLE_FIELDS);
        }
    }
    let _ = write!(out, "{rule}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::input::SearchRequest;
    use crate::records::RunSummary;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 9).unwrap()
    }

    fn outcome(records: Vec<Value>) -> RunOutcome {
        let request = SearchRequest::new("koh phangan best coffee");
        let records: Vec<DatasetItem> = records
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        RunOutcome {
            summary: RunSummary::succeeded(&request, records.len(), "run1", at()),
            request,
            records,
        }
    }

    #[test]
    fn stem_uses_keyword_and_timestamp() {
        assert_eq!(
            file_stem("koh phangan best coffee", at()),
            "instagram_koh_phangan_best_coffee_20240301_100509"
        );
    }

    #[test]
    fn stem_keeps_path_separators_out() {
        assert_eq!(
            file_stem("coffee/tea", at()),
            "instagram_coffee_tea_20240301_100509"
        );
        assert_eq!(
            file_stem("../../escape", at()),
            "instagram_______escape_20240301_100509"
        );
        assert_eq!(file_stem("café #1", at()), "instagram_caf___1_20240301_100509");
    }

    #[test]
    fn keyword_with_slash_exports_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stem = file_stem("coffee/tea", at());

        let path = write_json(&outcome(vec![json!({ "a": 1 })]), dir.path(), &stem).unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
    }

    #[test]
    fn flatten_nests_with_dots_and_encodes_arrays() {
        let record = json!({
            "url": "u",
            "likes": 4,
            "owner": { "username": "cafe", "meta": { "verified": true } },
            "hashtags": ["a", "b"],
            "caption": null
        });
        let flat = flatten(record.as_object().unwrap());
        assert_eq!(
            flat,
            vec![
                ("caption".to_string(), String::new()),
                ("hashtags".to_string(), r#"["a","b"]"#.to_string()),
                ("likes".to_string(), "4".to_string()),
                ("owner.meta.verified".to_string(), "true".to_string()),
                ("owner.username".to_string(), "cafe".to_string()),
                ("url".to_string(), "u".to_string()),
            ]
        );
    }

    #[test]
    fn summary_lists_first_fields() {
        let fields: Map<String, Value> = (0..12).map(|i| (format!("f{i:02}"), json!(i))).collect();
        let text = render_summary(&outcome(vec![Value::Object(fields)]));
        assert!(text.contains("Keyword: koh phangan best coffee"));
        assert!(text.contains("Total Items: 1"));
        assert!(text.contains("   - f00"));
        assert!(text.contains("   - f09"));
        assert!(!text.contains("   - f10"));
        assert!(text.contains("... and 2 more fields"));
    }

    #[test]
    fn summary_without_records_has_no_sample() {
        let text = render_summary(&outcome(vec![]));
        assert!(text.contains("Total Items: 0"));
        assert!(!text.contains("Sample Data Fields"));
    }
}
