use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::analysis::{self, chart::ChartError, parse_year, Rendered};
use crate::db::models::{Job, JobStatus, TransitionOutcome};
use crate::db::{StoreError, Stores};

/// Why a claimed job could not produce its chart
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Range bound '{0}' is not a year")]
    InvalidBound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chart(#[from] ChartError),
}

/// The single consumer of the job queue
pub struct JobWorker {
    stores: Stores,
    poll_interval: Duration,
}

impl JobWorker {
    /// Create a new JobWorker instance
    ///
    /// `poll_interval` bounds each blocking dequeue, and so how long a shutdown
    /// request can go unnoticed.
    pub fn new(stores: Stores, poll_interval: Duration) -> Self {
        Self {
            stores,
            poll_interval,
        }
    }

    /// Pull job ids one at a time until shutdown is signalled
    ///
    /// # Architecture
    /// - Waits on the queue for at most `poll_interval` per attempt
    /// - Runs each job to completion before dequeuing the next, so at most one
    ///   job is `in_progress` at a time
    /// - Checks the shutdown channel between jobs; a running job is always finished
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Worker started");

        loop {
            if *shutdown_rx.borrow() {
                info!("Worker received shutdown signal, stopping");
                break;
            }

            match self.stores.queue.dequeue(self.poll_interval).await {
                Ok(Some(id)) => {
                    info!("Worker dequeued job {}", id);
                    match self.process(&id).await {
                        Ok(Some(status)) => info!("Job {} finished: status={}", id, status),
                        Ok(None) => {}
                        Err(e) => error!("Job {} could not be processed: {}", id, e),
                    }
                }
                Ok(None) => debug!("Worker found no jobs available"),
                Err(e) => {
                    error!("Worker failed to read the queue: {:?}", e);
                    tokio::select! {
                        _ = sleep(Duration::from_secs(1)) => {}
                        _ = shutdown_rx.changed() => {}
                    }
                }
            }
        }
    }

    /// Drive one job through `submitted -> in_progress -> complete | failed`
    ///
    /// # Returns
    /// - `Ok(Some(status))` - the terminal status written for the job
    /// - `Ok(None)` - the job was no longer `submitted`, so it was left alone
    /// - `Err(StoreError::JobNotFound)` - the id is not in the job store
    pub async fn process(&self, id: &str) -> Result<Option<JobStatus>, StoreError> {
        let job = self
            .stores
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;

        let claimed = self
            .stores
            .jobs
            .transition(
                id,
                JobStatus::Submitted,
                JobStatus::InProgress,
                TransitionOutcome::default(),
            )
            .await?;
        if !claimed {
            warn!("Job {} is {}, not submitted; skipping", id, job.status);
            return Ok(None);
        }

        let (status, outcome) = match self.execute(&job).await {
            Ok(Rendered { image, skipped }) => {
                if skipped > 0 {
                    warn!("Job {} skipped {} malformed records", id, skipped);
                }
                (JobStatus::Complete, TransitionOutcome::completed(image, skipped))
            }
            Err(e) => {
                warn!("Job {} failed: {}", id, e);
                (JobStatus::Failed, TransitionOutcome::failed(e.to_string()))
            }
        };

        let applied = self
            .stores
            .jobs
            .transition(id, JobStatus::InProgress, status, outcome)
            .await?;
        if !applied {
            warn!("Job {} changed while in progress; result discarded", id);
            return Ok(None);
        }
        Ok(Some(status))
    }

    async fn execute(&self, job: &Job) -> Result<Rendered, PipelineError> {
        let start = parse_year(&job.start)
            .ok_or_else(|| PipelineError::InvalidBound(job.start.clone()))?;
        let end =
            parse_year(&job.end).ok_or_else(|| PipelineError::InvalidBound(job.end.clone()))?;

        let records = self.stores.records.all().await?;
        debug!("Job {} scanning {} records", job.id, records.len());

        Ok(analysis::co2_trend_chart(&records, start, end)?)
    }
}
