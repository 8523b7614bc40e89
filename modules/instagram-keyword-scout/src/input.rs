use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, ScoutError};

pub const DEFAULT_SEARCH_TYPE: &str = "place";
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const DEFAULT_RESULTS_TYPE: &str = "posts";
pub const DEFAULT_RESULTS_LIMIT: u32 = 100;

/// A validated keyword search, built once from the run input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub keyword: String,
    /// "place", "profile" or "hashtag"; passed through unchecked.
    pub search_type: String,
    pub search_limit: u32,
    /// "posts" or "profiles"; passed through unchecked.
    pub results_type: String,
    pub results_limit: u32,
    /// Proxy options, merged verbatim into the remote payload.
    pub proxy_config: Map<String, Value>,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            search_type: DEFAULT_SEARCH_TYPE.to_string(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            results_type: DEFAULT_RESULTS_TYPE.to_string(),
            results_limit: DEFAULT_RESULTS_LIMIT,
            proxy_config: Map::new(),
        }
    }

    /// Validate raw run input and apply defaults.
    ///
    /// `search` must be a non-empty string. Optional fields that are absent
    /// or `null` take their defaults.
    pub fn from_input(input: &Value) -> Result<Self> {
        let fields = input
            .as_object()
            .ok_or_else(|| ScoutError::InvalidInput("input must be a JSON object".into()))?;

        let keyword = match present(fields, "search") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) | None => {
                return Err(ScoutError::InvalidInput("Search keyword is required".into()))
            }
            Some(_) => {
                return Err(ScoutError::InvalidInput(
                    "field `search` must be a string".into(),
                ))
            }
        };

        let mut request = Self::new(keyword);

        if let Some(v) = string_field(fields, "searchType")? {
            request.search_type = v;
        }
        if let Some(v) = limit_field(fields, "searchLimit")? {
            request.search_limit = v;
        }
        if let Some(v) = string_field(fields, "resultsType")? {
            request.results_type = v;
        }
        if let Some(v) = limit_field(fields, "resultsLimit")? {
            request.results_limit = v;
        }
        match present(fields, "proxy") {
            None => {}
            Some(Value::Object(proxy)) => request.proxy_config = proxy.clone(),
            Some(_) => {
                return Err(ScoutError::InvalidInput(
                    "field `proxy` must be an object".into(),
                ))
            }
        }

        Ok(request)
    }

    /// Input for the remote search scraper. Proxy keys are merged at the top
    /// level and win over same-named search fields.
    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("search".into(), Value::String(self.keyword.clone()));
        payload.insert("searchType".into(), Value::String(self.search_type.clone()));
        payload.insert("searchLimit".into(), Value::from(self.search_limit));
        payload.insert("resultsType".into(), Value::String(self.results_type.clone()));
        payload.insert("resultsLimit".into(), Value::from(self.results_limit));
        for (key, value) in &self.proxy_config {
            payload.insert(key.clone(), value.clone());
        }
        Value::Object(payload)
    }
}

fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match present(fields, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ScoutError::InvalidInput(format!(
            "field `{key}` must be a string"
        ))),
    }
}

fn limit_field(fields: &Map<String, Value>, key: &str) -> Result<Option<u32>> {
    match present(fields, key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                ScoutError::InvalidInput(format!("field `{key}` must be a non-negative integer"))
            }),
    }
}
