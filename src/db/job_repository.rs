use async_trait::async_trait;
use std::time::Duration;

use crate::db::error::Result;
use crate::db::models::{Job, JobStatus, TransitionOutcome};

/// Persistence for job records, keyed by `job.<id>`
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a newly submitted job
    async fn create(&self, job: &Job) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Job>>;

    /// Compare-and-set the status of a job.
    ///
    /// Writes `to` (plus whatever `outcome` carries) only if the stored status is
    /// still `from`. Returns `Ok(false)` when another writer got there first,
    /// `StoreError::InvalidTransition` when `from -> to` is not a forward step of the
    /// lifecycle and `StoreError::JobNotFound` when the id is unknown.
    async fn transition(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        outcome: TransitionOutcome,
    ) -> Result<bool>;
}

/// FIFO channel of job ids between the submission service and the worker
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, id: &str) -> Result<()>;

    /// Pop the oldest id, waiting up to `wait` for one to arrive
    async fn dequeue(&self, wait: Duration) -> Result<Option<String>>;
}
