pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{DatasetItem, RunData, TERMINAL_STATUSES};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";

/// Long-poll window passed as `waitForFinish`. The platform caps it at 60s.
const WAIT_FOR_FINISH_SECS: u32 = 60;

/// Dataset pushes are rejected above 9 MB; stay below with headroom.
const MAX_PUSH_BYTES: usize = 8 * 1024 * 1024;

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    max_push_bytes: usize,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_push_bytes: MAX_PUSH_BYTES,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Cap on the JSON body of a single dataset push.
    pub fn with_max_push_bytes(mut self, max_push_bytes: usize) -> Self {
        self.max_push_bytes = max_push_bytes.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start an actor run. Returns immediately with run metadata.
    ///
    /// `actor_id` is either a raw actor ID or an `owner/name` pair.
    pub async fn start_run<I: Serialize + ?Sized>(
        &self,
        actor_id: &str,
        input: &I,
    ) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, encode_actor_id(actor_id));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        tracing::debug!(actor_id, run_id = %api_resp.data.id, "Actor run started");
        Ok(api_resp.data)
    }

    /// Fetch run metadata, waiting up to `wait_secs` for it to finish.
    pub async fn get_run(&self, run_id: &str, wait_secs: u32) -> Result<RunData> {
        let url = format!(
            "{}/actor-runs/{}?waitForFinish={}",
            self.base_url, run_id, wait_secs
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run reaches a terminal status. Uses `waitForFinish=60` for
    /// efficient long-polling. The run is returned whatever the terminal
    /// status is; callers decide what a non-success outcome means.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let run = self.get_run(run_id, WAIT_FOR_FINISH_SECS).await?;
            if run.is_terminal() {
                tracing::debug!(run_id, status = %run.status, "Run finished");
                return Ok(run);
            }
            tracing::debug!(run_id, status = %run.status, "Run still in progress");
        }
    }

    /// Start a run and block until it finishes.
    pub async fn call_actor<I: Serialize + ?Sized>(
        &self,
        actor_id: &str,
        input: &I,
    ) -> Result<RunData> {
        let run = self.start_run(actor_id, input).await?;
        tracing::info!(actor_id, run_id = %run.id, "Apify run started, polling for completion");
        self.wait_for_run(&run.id).await
    }

    /// Ask the platform to abort a run.
    pub async fn abort_run(&self, run_id: &str) -> Result<RunData> {
        let url = format!("{}/actor-runs/{}/abort", self.base_url, run_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!(
            "{}/datasets/{}/items?format=json&clean=false",
            self.base_url, dataset_id
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Append items to a dataset, in order. Batches whose JSON body would
    /// exceed the request size limit go out as several requests.
    pub async fn push_dataset_items<T: Serialize>(
        &self,
        dataset_id: &str,
        items: &[T],
    ) -> Result<()> {
        let url = format!("{}/datasets/{}/items", self.base_url, dataset_id);
        let chunks = chunk_json_array(items, self.max_push_bytes)?;
        let requests = chunks.len();

        for body in chunks {
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            check_status(resp).await?;
        }

        tracing::debug!(dataset_id, count = items.len(), requests, "Pushed dataset items");
        Ok(())
    }

    /// Store a JSON record in a key-value store, replacing any previous value.
    pub async fn set_record<T: Serialize + ?Sized>(
        &self,
        store_id: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let url = format!("{}/key-value-stores/{}/records/{}", self.base_url, store_id, key);
        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(value)
            .send()
            .await?;

        check_status(resp).await?;
        Ok(())
    }

    /// Read a JSON record from a key-value store. Missing records yield `None`.
    pub async fn get_record(&self, store_id: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let url = format!("{}/key-value-stores/{}/records/{}", self.base_url, store_id, key);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = check_status(resp).await?;
        let value: serde_json::Value = resp.json().await?;
        Ok(Some(value))
    }
}

/// `owner/name` becomes `owner~name` in API paths.
fn encode_actor_id(actor_id: &str) -> String {
    actor_id.replace('/', "~")
}

/// Serialize `items` into JSON array bodies of at most `max_bytes` each,
/// preserving order. An item that alone exceeds the cap gets its own body.
fn chunk_json_array<T: Serialize>(items: &[T], max_bytes: usize) -> Result<Vec<Vec<u8>>> {
    let mut chunks = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for item in items {
        let encoded = serde_json::to_vec(item)?;
        // `[`/`,` before the item plus the closing `]`
        if !current.is_empty() && current.len() + encoded.len() + 2 > max_bytes {
            current.push(b']');
            chunks.push(std::mem::take(&mut current));
        }
        current.push(if current.is_empty() { b'[' } else { b',' });
        current.extend_from_slice(&encoded);
    }

    if current.is_empty() {
        chunks.push(b"[]".to_vec());
    } else {
        current.push(b']');
        chunks.push(current);
    }
    Ok(chunks)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApifyError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_names_are_tilde_encoded() {
        assert_eq!(
            encode_actor_id("apify/instagram-search-scraper"),
            "apify~instagram-search-scraper"
        );
        assert_eq!(encode_actor_id("nH2AHrwxeTRJoN5hX"), "nH2AHrwxeTRJoN5hX");
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let client = ApifyClient::new("t".into()).with_base_url("http://127.0.0.1:9000/v2/");
        assert_eq!(client.base_url(), "http://127.0.0.1:9000/v2");
    }

    #[test]
    fn small_batches_are_one_body() {
        let items = vec![serde_json::json!({ "a": 1 }), serde_json::json!({ "a": 2 })];
        let chunks = chunk_json_array(&items, MAX_PUSH_BYTES).unwrap();
        assert_eq!(chunks, vec![br#"[{"a":1},{"a":2}]"#.to_vec()]);
    }

    #[test]
    fn large_batches_split_in_order_under_cap() {
        let items: Vec<serde_json::Value> = (0..50)
            .map(|i| serde_json::json!({ "n": i, "pad": "x".repeat(40) }))
            .collect();
        let chunks = chunk_json_array(&items, 300).unwrap();
        assert!(chunks.len() > 1);

        let mut seen = Vec::new();
        for chunk in &chunks {
            assert!(chunk.len() <= 300, "chunk of {} bytes", chunk.len());
            let part: Vec<serde_json::Value> = serde_json::from_slice(chunk).unwrap();
            seen.extend(part);
        }
        assert_eq!(seen, items);
    }

    #[test]
    fn oversized_item_goes_alone() {
        let items = vec![
            serde_json::json!("small"),
            serde_json::json!("y".repeat(100)),
            serde_json::json!("small"),
        ];
        let chunks = chunk_json_array(&items, 20).unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn empty_batch_is_empty_array() {
        let chunks = chunk_json_array::<serde_json::Value>(&[], 100).unwrap();
        assert_eq!(chunks, vec![b"[]".to_vec()]);
    }

    #[test]
    fn default_base_url() {
        let client = ApifyClient::new("t".into());
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }
}
