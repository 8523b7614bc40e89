// Remote job boundary.
//
// RemoteJobService hides the job-execution platform behind four calls so the
// orchestrator can run against ApifyJobService in production and
// MockJobService in tests.

use std::fmt;

use apify_client::{ApifyClient, RunData};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Delegated actor that performs the actual Instagram search.
pub const INSTAGRAM_SEARCH_SCRAPER: &str = "apify/instagram-search-scraper";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Ready,
    Running,
    Succeeded,
    Failed,
    TimingOut,
    TimedOut,
    Aborting,
    Aborted,
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "READY" => JobStatus::Ready,
            "RUNNING" => JobStatus::Running,
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" => JobStatus::Failed,
            "TIMING-OUT" => JobStatus::TimingOut,
            "TIMED-OUT" => JobStatus::TimedOut,
            "ABORTING" => JobStatus::Aborting,
            "ABORTED" => JobStatus::Aborted,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Ready => "READY",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::TimingOut => "TIMING-OUT",
            JobStatus::TimedOut => "TIMED-OUT",
            JobStatus::Aborting => "ABORTING",
            JobStatus::Aborted => "ABORTED",
            JobStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Aborted
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote job as last observed. Owned by the remote service; only read here.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteJobHandle {
    pub id: String,
    pub status: JobStatus,
    /// Collection holding the job's output records.
    pub dataset_id: String,
}

impl From<RunData> for RemoteJobHandle {
    fn from(run: RunData) -> Self {
        Self {
            status: JobStatus::parse(&run.status),
            id: run.id,
            dataset_id: run.default_dataset_id,
        }
    }
}

#[async_trait]
pub trait RemoteJobService: Send + Sync {
    /// Submit a job. Returns as soon as the service has accepted it.
    async fn start(&self, actor_id: &str, payload: &Value) -> Result<RemoteJobHandle>;

    /// Block until the job reaches a terminal state.
    async fn wait(&self, job: &RemoteJobHandle) -> Result<RemoteJobHandle>;

    /// Ask the service to stop a job.
    async fn abort(&self, job_id: &str) -> Result<()>;

    /// Output records of a finished job, in delivery order.
    async fn list_output_records(&self, job: &RemoteJobHandle) -> Result<Vec<Value>>;

    /// Submit a job and block until it reaches a terminal state.
    async fn invoke(&self, actor_id: &str, payload: &Value) -> Result<RemoteJobHandle> {
        let job = self.start(actor_id, payload).await?;
        self.wait(&job).await
    }
}

/// RemoteJobService backed by the Apify platform.
pub struct ApifyJobService {
    client: ApifyClient,
}

impl ApifyJobService {
    pub fn new(client: ApifyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteJobService for ApifyJobService {
    async fn start(&self, actor_id: &str, payload: &Value) -> Result<RemoteJobHandle> {
        let run = self.client.start_run(actor_id, payload).await?;
        tracing::info!(actor_id, run_id = %run.id, "Apify run started, polling for completion");
        Ok(run.into())
    }

    async fn wait(&self, job: &RemoteJobHandle) -> Result<RemoteJobHandle> {
        let run = self.client.wait_for_run(&job.id).await?;
        tracing::info!(
            run_id = %run.id,
            status = %run.status,
            dataset_id = %run.default_dataset_id,
            "Run finished"
        );
        Ok(run.into())
    }

    async fn abort(&self, job_id: &str) -> Result<()> {
        let run = self.client.abort_run(job_id).await?;
        tracing::warn!(run_id = %run.id, status = %run.status, "Requested run abort");
        Ok(())
    }

    async fn list_output_records(&self, job: &RemoteJobHandle) -> Result<Vec<Value>> {
        let items: Vec<Value> = self.client.get_dataset_items(&job.dataset_id).await?;
        tracing::info!(count = items.len(), dataset_id = %job.dataset_id, "Fetched dataset items");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_known_and_unknown() {
        for raw in ["READY", "RUNNING", "SUCCEEDED", "FAILED", "TIMED-OUT", "ABORTED", "WEIRD"] {
            assert_eq!(JobStatus::parse(raw).as_str(), raw);
        }
        assert_eq!(JobStatus::parse("WEIRD"), JobStatus::Other("WEIRD".into()));
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
        assert!(JobStatus::Aborted.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Aborting.is_terminal());
        assert!(!JobStatus::Other("X".into()).is_terminal());
    }

    #[test]
    fn handle_from_run_data() {
        let run: RunData = serde_json::from_value(serde_json::json!({
            "id": "run1", "status": "FAILED", "defaultDatasetId": "ds1"
        }))
        .unwrap();
        let handle = RemoteJobHandle::from(run);
        assert_eq!(handle.id, "run1");
        assert_eq!(handle.status, JobStatus::Failed);
        assert_eq!(handle.dataset_id, "ds1");
    }
}
