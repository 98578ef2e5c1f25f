use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use auto_trends::api::job::JobService;
use auto_trends::db::error::Result;
use auto_trends::db::job_repository::JobRepository;
use auto_trends::db::memory::MemoryJobs;
use auto_trends::db::models::{Job, JobStatus, TransitionOutcome};
use auto_trends::db::Stores;
use auto_trends::worker::JobWorker;

/// Job store that remembers every status change applied, in order
#[derive(Default)]
struct RecordingJobs {
    inner: MemoryJobs,
    applied: Mutex<Vec<(String, JobStatus)>>,
}

impl RecordingJobs {
    fn applied(&self) -> Vec<(String, JobStatus)> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRepository for RecordingJobs {
    async fn create(&self, job: &Job) -> Result<()> {
        self.applied
            .lock()
            .unwrap()
            .push((job.id.clone(), job.status));
        self.inner.create(job).await
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        self.inner.get(id).await
    }

    async fn transition(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        outcome: TransitionOutcome,
    ) -> Result<bool> {
        let applied = self.inner.transition(id, from, to, outcome).await?;
        if applied {
            self.applied.lock().unwrap().push((id.to_string(), to));
        }
        Ok(applied)
    }
}

fn recording_stores() -> (Stores, Arc<RecordingJobs>) {
    let jobs = Arc::new(RecordingJobs::default());
    let mut stores = Stores::in_memory();
    stores.jobs = jobs.clone();
    (stores, jobs)
}

async fn wait_for(stores: &Stores, id: &str, status: JobStatus) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(job) = stores.jobs.get(id).await.unwrap() {
                if job.status == status {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach expected status");
}

#[tokio::test]
async fn test_status_sequence_is_exact() {
    let (stores, jobs) = recording_stores();
    let service = JobService::new(stores.clone());
    let (tx, rx) = watch::channel(false);

    let job = service.submit("1975".into(), "1980".into()).await.unwrap();
    assert_eq!(
        service.get_status(&job.id).await.unwrap().status,
        JobStatus::Submitted
    );

    let worker = JobWorker::new(stores.clone(), Duration::from_millis(20));
    let handle = tokio::spawn(async move { worker.run(rx).await });

    wait_for(&stores, &job.id, JobStatus::Complete).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let statuses: Vec<JobStatus> = jobs
        .applied()
        .into_iter()
        .filter(|(id, _)| id == &job.id)
        .map(|(_, status)| status)
        .collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Submitted, JobStatus::InProgress, JobStatus::Complete]
    );
    assert!(!service.get_artifact(&job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_worker_runs_jobs_in_submission_order() {
    let (stores, jobs) = recording_stores();
    let service = JobService::new(stores.clone());

    let first = service.submit("1975".into(), "1980".into()).await.unwrap();
    let second = service.submit("1990".into(), "2000".into()).await.unwrap();

    let (tx, rx) = watch::channel(false);
    let worker = JobWorker::new(stores.clone(), Duration::from_millis(20));
    let handle = tokio::spawn(async move { worker.run(rx).await });

    wait_for(&stores, &second.id, JobStatus::Complete).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let transitions: Vec<(String, JobStatus)> = jobs
        .applied()
        .into_iter()
        .filter(|(_, status)| *status != JobStatus::Submitted)
        .collect();
    assert_eq!(
        transitions,
        vec![
            (first.id.clone(), JobStatus::InProgress),
            (first.id.clone(), JobStatus::Complete),
            (second.id.clone(), JobStatus::InProgress),
            (second.id.clone(), JobStatus::Complete),
        ]
    );
}

#[tokio::test]
async fn test_failed_job_does_not_block_the_queue() {
    let stores = Stores::in_memory();
    let service = JobService::new(stores.clone());

    let bad = service.submit("yesterday".into(), "1980".into()).await.unwrap();
    let good = service.submit("1975".into(), "1980".into()).await.unwrap();

    let (tx, rx) = watch::channel(false);
    let worker = JobWorker::new(stores.clone(), Duration::from_millis(20));
    let handle = tokio::spawn(async move { worker.run(rx).await });

    wait_for(&stores, &good.id, JobStatus::Complete).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let status = service.get_status(&bad.id).await.unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert!(status.error.is_some());
    assert!(service.get_artifact(&bad.id).await.is_err());
}
