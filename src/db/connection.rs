use std::sync::Arc;
use tracing::{info, warn};

use crate::db::error::Result;
use crate::db::job_repository::{JobQueue, JobRepository};
use crate::db::memory::{MemoryImages, MemoryJobs, MemoryQueue, MemoryRecords};
use crate::db::record_repository::{ImageRepository, RecordRepository};
use crate::db::redis_store::{
    connect_db, RedisImages, RedisJobs, RedisQueue, RedisRecords, IMAGES_DB, JOBS_DB, QUEUE_DB,
    RECORDS_DB,
};

/// Handles to every namespace, built once at startup and handed to each component
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn RecordRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub queue: Arc<dyn JobQueue>,
    pub images: Arc<dyn ImageRepository>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(MemoryRecords::default()),
            jobs: Arc::new(MemoryJobs::default()),
            queue: Arc::new(MemoryQueue::default()),
            images: Arc::new(MemoryImages::default()),
        }
    }

    /// Drop this handle, returning how many other clones still hold the connections.
    ///
    /// Connections close only once the last clone is gone.
    pub fn close(self) -> usize {
        let others = Arc::strong_count(&self.records) - 1;
        drop(self);
        if others == 0 {
            info!("Store connections released");
        } else {
            warn!("Store handle dropped, {} other holders keep the connections open", others);
        }
        others
    }
}

/// Connect every namespace to Redis, or fall back to process-local storage
///
/// # Parameters
/// - `redis_url`: e.g. `redis://127.0.0.1:6379`; the database index in the URL is
///   ignored, each namespace uses its own logical database
pub async fn get_connection(redis_url: Option<&str>) -> Result<Stores> {
    let Some(url) = redis_url else {
        warn!("REDIS_URL not set, using in-memory stores (state is lost on restart)");
        return Ok(Stores::in_memory());
    };

    let records = RedisRecords::new(connect_db(url, RECORDS_DB).await?);
    let images = RedisImages::new(connect_db(url, IMAGES_DB).await?);
    let queue = RedisQueue::new(
        connect_db(url, QUEUE_DB).await?,
        connect_db(url, QUEUE_DB).await?,
    );
    let jobs = RedisJobs::new(connect_db(url, JOBS_DB).await?);

    info!("Connected to redis databases {}-{}", RECORDS_DB, JOBS_DB);
    Ok(Stores {
        records: Arc::new(records),
        jobs: Arc::new(jobs),
        queue: Arc::new(queue),
        images: Arc::new(images),
    })
}
