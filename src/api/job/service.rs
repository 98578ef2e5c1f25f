use tracing::{debug, info};

use super::dto::StatusResponse;
use crate::api::error::ServiceError;
use crate::db::models::{Job, JobStatus};
use crate::db::Stores;

/// Job submission and lookup
pub struct JobService {
    stores: Stores,
}

impl JobService {
    /// Create a new JobService instance
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Submit a job for the worker
    ///
    /// # Business Logic
    /// - Creates a `submitted` job with a fresh id
    /// - Persists it, then pushes only its id onto the queue
    /// - Returns the full record
    pub async fn submit(&self, start: String, end: String) -> Result<Job, ServiceError> {
        let job = Job::new(start, end);
        self.stores.jobs.create(&job).await?;
        self.stores.queue.enqueue(&job.id).await?;

        info!(
            "Service: Job {} submitted for range {}..{}",
            job.id, job.start, job.end
        );
        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> Result<Job, ServiceError> {
        self.stores
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Job {} not found", id)))
    }

    pub async fn get_status(&self, id: &str) -> Result<StatusResponse, ServiceError> {
        Ok(self.get_job(id).await?.into())
    }

    /// Rendered chart of a completed job
    ///
    /// # Returns
    /// - `Err(ServiceError::NotFound)` for unknown jobs and for jobs that are not
    ///   `complete` yet (or never will be)
    pub async fn get_artifact(&self, id: &str) -> Result<Vec<u8>, ServiceError> {
        let job = self.get_job(id).await?;
        match (job.status, job.image) {
            (JobStatus::Complete, Some(image)) => Ok(image),
            (status, _) => {
                debug!("Artifact requested for job {} in state {}", id, status);
                Err(ServiceError::NotFound(format!(
                    "Image for job {} not found (job is {})",
                    id, status
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TransitionOutcome;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_persists_then_enqueues() {
        let stores = Stores::in_memory();
        let service = JobService::new(stores.clone());

        let job = service.submit("1975".into(), "1980".into()).await.unwrap();

        assert_eq!(job.status, JobStatus::Submitted);
        let stored = stores.jobs.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored, job);
        let queued = stores.queue.dequeue(Duration::from_millis(10)).await.unwrap();
        assert_eq!(queued.as_deref(), Some(job.id.as_str()));
    }

    #[tokio::test]
    async fn test_status_reads_are_idempotent() {
        let service = JobService::new(Stores::in_memory());
        let job = service.submit("1975".into(), "1980".into()).await.unwrap();

        let first = service.get_status(&job.id).await.unwrap();
        let second = service.get_status(&job.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status, JobStatus::Submitted);
    }

    #[tokio::test]
    async fn test_artifact_missing_until_complete() {
        let stores = Stores::in_memory();
        let service = JobService::new(stores.clone());
        let job = service.submit("1975".into(), "1980".into()).await.unwrap();

        assert!(matches!(
            service.get_artifact(&job.id).await,
            Err(ServiceError::NotFound(_))
        ));

        stores
            .jobs
            .transition(&job.id, JobStatus::Submitted, JobStatus::InProgress, TransitionOutcome::default())
            .await
            .unwrap();
        assert!(service.get_artifact(&job.id).await.is_err());

        stores
            .jobs
            .transition(
                &job.id,
                JobStatus::InProgress,
                JobStatus::Complete,
                TransitionOutcome::completed(b"<svg/>".to_vec(), 0),
            )
            .await
            .unwrap();
        assert_eq!(service.get_artifact(&job.id).await.unwrap(), b"<svg/>".to_vec());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let service = JobService::new(Stores::in_memory());
        assert!(matches!(
            service.get_status("missing").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
