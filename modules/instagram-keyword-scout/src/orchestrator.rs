use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use apify_client::DatasetItem;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::annotate::annotate_all;
use crate::error::{Result, ScoutError};
use crate::input::SearchRequest;
use crate::job::{JobStatus, RemoteJobHandle, RemoteJobService, INSTAGRAM_SEARCH_SCRAPER};
use crate::records::{ErrorRecord, RunSummary, ERROR_KEY, SUMMARY_KEY};
use crate::sink::RunStorage;

/// Where a run currently is. Runs move strictly forward; any failure after
/// validation goes through `PersistingFailure` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Validating,
    Invoking,
    Fetching,
    Transforming,
    PersistingSuccess,
    Done,
    PersistingFailure,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Validating => "validating",
            RunPhase::Invoking => "invoking",
            RunPhase::Fetching => "fetching",
            RunPhase::Transforming => "transforming",
            RunPhase::PersistingSuccess => "persisting_success",
            RunPhase::Done => "done",
            RunPhase::PersistingFailure => "persisting_failure",
            RunPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub request: SearchRequest,
    pub summary: RunSummary,
    pub records: Vec<DatasetItem>,
}

/// Drives one keyword search: validate, delegate to the remote scraper,
/// annotate what comes back, store it.
pub struct Orchestrator {
    jobs: Arc<dyn RemoteJobService>,
    storage: Arc<dyn RunStorage>,
    actor_id: String,
    run_timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    pub fn new(jobs: Arc<dyn RemoteJobService>, storage: Arc<dyn RunStorage>) -> Self {
        Self {
            jobs,
            storage,
            actor_id: INSTAGRAM_SEARCH_SCRAPER.to_string(),
            run_timeout: None,
            cancel: None,
        }
    }

    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    /// Give up on the remote job (and abort it) after `timeout`.
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Abort the remote job and fail the run once `true` is sent on the
    /// channel.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run against the `INPUT` record of the configured storage.
    pub async fn run_from_storage(&self) -> Result<RunOutcome> {
        let input = self
            .storage
            .get_value(crate::records::INPUT_KEY)
            .await?
            .unwrap_or(Value::Null);
        self.run(&input).await
    }

    /// Execute a run for raw input.
    ///
    /// Invalid input fails before anything is sent or stored. Failures while
    /// invoking, fetching or transforming store an `ERROR` record and are then
    /// returned. Failures while storing the results are returned as-is.
    pub async fn run(&self, input: &Value) -> Result<RunOutcome> {
        debug!(phase = %RunPhase::Validating, "Run phase");
        let request = SearchRequest::from_input(input)?;

        info!(keyword = %request.keyword, "Starting Instagram keyword search");
        info!(
            search_type = %request.search_type,
            results_type = %request.results_type,
            search_limit = request.search_limit,
            results_limit = request.results_limit,
            "Search parameters"
        );

        let (job, records) = match self.execute(&request).await {
            Ok(done) => done,
            Err(err) => {
                error!(
                    keyword = %request.keyword,
                    error = %err,
                    "Error during Instagram keyword scraping"
                );
                self.persist_failure(&request, &err).await;
                debug!(phase = %RunPhase::Failed, "Run phase");
                return Err(err);
            }
        };

        debug!(phase = %RunPhase::PersistingSuccess, "Run phase");
        self.storage.push_records(&records).await?;

        let summary = RunSummary::succeeded(&request, records.len(), &job.id, Utc::now());
        self.storage
            .set_value(SUMMARY_KEY, &serde_json::to_value(&summary)?)
            .await?;

        debug!(phase = %RunPhase::Done, "Run phase");
        info!(
            keyword = %request.keyword,
            total_items = summary.total_items,
            run_id = %job.id,
            "Instagram keyword scraping completed successfully"
        );

        Ok(RunOutcome {
            request,
            summary,
            records,
        })
    }

    async fn execute(
        &self,
        request: &SearchRequest,
    ) -> Result<(RemoteJobHandle, Vec<DatasetItem>)> {
        debug!(phase = %RunPhase::Invoking, actor_id = %self.actor_id, "Run phase");
        let payload = request.payload();
        let job = if self.run_timeout.is_none() && self.cancel.is_none() {
            self.jobs.invoke(&self.actor_id, &payload).await?
        } else {
            self.invoke_guarded(&payload).await?
        };

        if job.status != JobStatus::Succeeded {
            return Err(ScoutError::RemoteJobFailed {
                status: job.status.to_string(),
            });
        }
        info!(run_id = %job.id, "Instagram scraper completed successfully");

        debug!(phase = %RunPhase::Fetching, dataset_id = %job.dataset_id, "Run phase");
        let items = self.jobs.list_output_records(&job).await?;
        info!(count = items.len(), "Retrieved items");

        debug!(phase = %RunPhase::Transforming, "Run phase");
        let records = annotate_all(&items, request, &self.actor_id)?;

        Ok((job, records))
    }

    /// Start the job and wait for it, aborting it if the timeout elapses or
    /// the run is cancelled first.
    async fn invoke_guarded(&self, payload: &Value) -> Result<RemoteJobHandle> {
        let job = self.jobs.start(&self.actor_id, payload).await?;
        let limit = self.run_timeout;
        let deadline = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            finished = self.jobs.wait(&job) => finished,
            _ = deadline => {
                let after = limit.unwrap_or_default();
                warn!(
                    run_id = %job.id,
                    timeout_secs = after.as_secs(),
                    "Remote job timed out, aborting"
                );
                self.abort(&job).await;
                Err(ScoutError::Timeout { run_id: job.id.clone(), after })
            }
            _ = cancelled(self.cancel.clone()) => {
                warn!(run_id = %job.id, "Run cancelled, aborting remote job");
                self.abort(&job).await;
                Err(ScoutError::Cancelled { run_id: job.id.clone() })
            }
        }
    }

    async fn abort(&self, job: &RemoteJobHandle) {
        if let Err(e) = self.jobs.abort(&job.id).await {
            warn!(run_id = %job.id, error = %e, "Failed to abort remote job");
        }
    }

    async fn persist_failure(&self, request: &SearchRequest, err: &ScoutError) {
        debug!(phase = %RunPhase::PersistingFailure, "Run phase");
        let record = ErrorRecord::failed(request, err.to_string(), Utc::now());
        let stored = match serde_json::to_value(&record) {
            Ok(value) => self.storage.set_value(ERROR_KEY, &value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            error!(error = %e, "Failed to store error record");
        }
    }
}

/// Resolves once `true` has been sent. Never resolves without a channel or
/// if the sender goes away first.
async fn cancelled(cancel: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = cancel {
        let signalled = rx.wait_for(|cancel| *cancel).await.is_ok();
        if signalled {
            return;
        }
    }
    std::future::pending::<()>().await
}
