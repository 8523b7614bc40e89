// Test doubles for the two run boundaries:
// - MockJobService (RemoteJobService): scripted terminal status and output
// - MemoryStorage (RunStorage): in-memory key-value store plus dataset
//
// Both record every call so tests can assert on what crossed the boundary.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use apify_client::{ApifyError, DatasetItem};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, ScoutError};
use crate::job::{JobStatus, RemoteJobHandle, RemoteJobService};
use crate::sink::RunStorage;

// ---------------------------------------------------------------------------
// MockJobService
// ---------------------------------------------------------------------------

/// Scripted remote job service. Every started job finishes with the
/// configured status and yields the configured records.
/// Builder pattern: `.finishing_with()`, `.with_records()`, `.failing_fetch()`.
pub struct MockJobService {
    status: JobStatus,
    records: Vec<Value>,
    fetch_error: Option<String>,
    start_error: Option<String>,
    wait_delay: Option<Duration>,
    runs_started: Mutex<u32>,
    payloads: Mutex<Vec<(String, Value)>>,
    aborted: Mutex<Vec<String>>,
    fetches: Mutex<u32>,
}

impl MockJobService {
    pub fn new() -> Self {
        Self {
            status: JobStatus::Succeeded,
            records: Vec::new(),
            fetch_error: None,
            start_error: None,
            wait_delay: None,
            runs_started: Mutex::new(0),
            payloads: Mutex::new(Vec::new()),
            aborted: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }

    pub fn finishing_with(mut self, status: &str) -> Self {
        self.status = JobStatus::parse(status);
        self
    }

    pub fn with_records(mut self, records: Vec<Value>) -> Self {
        self.records = records;
        self
    }

    pub fn failing_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    pub fn failing_fetch(mut self, message: &str) -> Self {
        self.fetch_error = Some(message.to_string());
        self
    }

    /// Make `wait` take this long before reporting the terminal status.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.wait_delay = Some(delay);
        self
    }

    /// (actor id, payload) for every submitted job.
    pub fn payloads(&self) -> Vec<(String, Value)> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn aborted(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

impl Default for MockJobService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteJobService for MockJobService {
    async fn start(&self, actor_id: &str, payload: &Value) -> Result<RemoteJobHandle> {
        self.payloads
            .lock()
            .unwrap()
            .push((actor_id.to_string(), payload.clone()));
        if let Some(message) = &self.start_error {
            return Err(ApifyError::Network(message.clone()).into());
        }
        let n = {
            let mut started = self.runs_started.lock().unwrap();
            *started += 1;
            *started
        };
        Ok(RemoteJobHandle {
            id: format!("mock-run-{n}"),
            status: JobStatus::Ready,
            dataset_id: format!("mock-dataset-{n}"),
        })
    }

    async fn wait(&self, job: &RemoteJobHandle) -> Result<RemoteJobHandle> {
        if let Some(delay) = self.wait_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RemoteJobHandle {
            status: self.status.clone(),
            ..job.clone()
        })
    }

    async fn abort(&self, job_id: &str) -> Result<()> {
        self.aborted.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn list_output_records(&self, _job: &RemoteJobHandle) -> Result<Vec<Value>> {
        *self.fetches.lock().unwrap() += 1;
        match &self.fetch_error {
            Some(message) => Err(ApifyError::Network(message.clone()).into()),
            None => Ok(self.records.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-memory RunStorage. `.failing_push()` makes dataset writes fail.
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
    records: Mutex<Vec<DatasetItem>>,
    fail_push: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            records: Mutex::new(Vec::new()),
            fail_push: false,
        }
    }

    pub fn with_value(self, key: &str, value: Value) -> Self {
        self.values.lock().unwrap().insert(key.to_string(), value);
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn records(&self) -> Vec<DatasetItem> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStorage for MemoryStorage {
    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.value(key))
    }

    async fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn push_records(&self, records: &[DatasetItem]) -> Result<()> {
        if self.fail_push {
            return Err(ScoutError::Storage("dataset unavailable".into()));
        }
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}
