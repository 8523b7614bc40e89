pub mod annotate;
pub mod config;
pub mod error;
pub mod export;
pub mod input;
pub mod job;
pub mod orchestrator;
pub mod records;
pub mod sink;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{Result, ScoutError};
pub use input::SearchRequest;
pub use job::{ApifyJobService, JobStatus, RemoteJobHandle, RemoteJobService};
pub use orchestrator::{Orchestrator, RunOutcome, RunPhase};
pub use records::{ErrorRecord, ResultMetadata, RunSummary};
pub use sink::{ApifyStorage, LocalStorage, RunStorage};
