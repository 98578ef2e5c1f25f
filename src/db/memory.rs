//! In-process backend, used when no Redis URL is configured and by the tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::{timeout_at, Instant};

use crate::db::error::{Result, StoreError};
use crate::db::job_repository::{JobQueue, JobRepository};
use crate::db::models::{job_key, Job, JobStatus, TransitionOutcome, VehicleRecord};
use crate::db::record_repository::{ImageRepository, RecordRepository};

#[derive(Default)]
pub struct MemoryRecords {
    records: RwLock<BTreeMap<String, VehicleRecord>>,
}

#[async_trait]
impl RecordRepository for MemoryRecords {
    async fn replace_all(&self, records: Vec<VehicleRecord>) -> Result<usize> {
        let mut guard = self.records.write().await;
        guard.clear();
        for record in records {
            guard.insert(record.key(), record);
        }
        Ok(guard.len())
    }

    async fn all(&self) -> Result<Vec<VehicleRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.records.read().await.is_empty())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJobs {
    jobs: RwLock<HashMap<String, Job>>,
}

#[async_trait]
impl JobRepository for MemoryJobs {
    async fn create(&self, job: &Job) -> Result<()> {
        self.jobs.write().await.insert(job_key(&job.id), job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&job_key(id)).cloned())
    }

    async fn transition(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        outcome: TransitionOutcome,
    ) -> Result<bool> {
        Job::check_transition(id, from, to)?;

        let mut guard = self.jobs.write().await;
        let job = guard
            .get_mut(&job_key(id))
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;

        if job.status != from {
            return Ok(false);
        }

        job.status = to;
        if outcome.image.is_some() {
            job.image = outcome.image;
        }
        if outcome.error.is_some() {
            job.error = outcome.error;
        }
        if outcome.skipped_records.is_some() {
            job.skipped_records = outcome.skipped_records;
        }
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    ids: Mutex<VecDeque<String>>,
    notify: Notify,
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, id: &str) -> Result<()> {
        self.ids.lock().await.push_back(id.to_string());
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(id) = self.ids.lock().await.pop_front() {
                return Ok(Some(id));
            }
            // notify_one leaves a permit behind, so an enqueue racing this check is not lost
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                return Ok(self.ids.lock().await.pop_front());
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryImages {
    images: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ImageRepository for MemoryImages {
    async fn put(&self, name: &str, image: Vec<u8>) -> Result<()> {
        self.images.write().await.insert(name.to_string(), image);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.images.read().await.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.images.write().await.remove(name).is_some())
    }
}
