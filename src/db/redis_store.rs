use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, IntoConnectionInfo, Script};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::db::error::{Result, StoreError};
use crate::db::job_repository::{JobQueue, JobRepository};
use crate::db::models::{job_key, Job, JobStatus, TransitionOutcome, VehicleRecord};
use crate::db::record_repository::{ImageRepository, RecordRepository};

/// Logical Redis databases, one per namespace
pub const RECORDS_DB: i64 = 0;
pub const IMAGES_DB: i64 = 1;
pub const QUEUE_DB: i64 = 2;
pub const JOBS_DB: i64 = 3;

const QUEUE_KEY: &str = "queue";

// KEYS[1] = job key, ARGV = from, to, then field/value pairs to write with the status.
// `image` is only ever written together with `complete`.
// Returns -1 if the job is missing, 0 if the status did not match, 1 once applied.
const TRANSITION_LUA: &str = r#"
local current = redis.call('HGET', KEYS[1], 'status')
if not current then return -1 end
if current ~= ARGV[1] then return 0 end
redis.call('HSET', KEYS[1], 'status', ARGV[2])
for i = 3, #ARGV, 2 do
  if ARGV[i] ~= 'image' or ARGV[2] == 'complete' then
    redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
  end
end
return 1
"#;

/// Open a multiplexed connection to one logical database of the server at `url`
pub async fn connect_db(url: &str, db: i64) -> Result<MultiplexedConnection> {
    let mut info = url.into_connection_info()?;
    info.redis.db = db;
    let client = Client::open(info)?;
    let con = client.get_multiplexed_async_connection().await?;
    debug!("Connected to redis database {}", db);
    Ok(con)
}

pub struct RedisRecords {
    con: MultiplexedConnection,
}

impl RedisRecords {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }
}

#[async_trait]
impl RecordRepository for RedisRecords {
    async fn replace_all(&self, records: Vec<VehicleRecord>) -> Result<usize> {
        let mut con = self.con.clone();
        redis::cmd("FLUSHDB").query_async::<()>(&mut con).await?;

        if records.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        let mut keys = HashSet::new();
        for record in &records {
            let key = record.key();
            let fields: Vec<(&str, &str)> = record
                .fields()
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            pipe.hset_multiple(&key, &fields).ignore();
            keys.insert(key);
        }
        pipe.query_async::<()>(&mut con).await?;

        debug!("Wrote {} record keys", keys.len());
        Ok(keys.len())
    }

    async fn all(&self) -> Result<Vec<VehicleRecord>> {
        let mut con = self.con.clone();
        let mut keys: Vec<String> = con.keys("*").await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        keys.sort();

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.hgetall(key);
        }
        let rows: Vec<BTreeMap<String, String>> = pipe.query_async(&mut con).await?;

        Ok(rows.into_iter().map(VehicleRecord::new).collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut con = self.con.clone();
        redis::cmd("FLUSHDB").query_async::<()>(&mut con).await?;
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool> {
        let mut con = self.con.clone();
        let size: u64 = redis::cmd("DBSIZE").query_async(&mut con).await?;
        Ok(size == 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut con = self.con.clone();
        redis::cmd("PING").query_async::<String>(&mut con).await?;
        Ok(())
    }
}

pub struct RedisJobs {
    con: MultiplexedConnection,
    transition: Script,
}

impl RedisJobs {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self {
            con,
            transition: Script::new(TRANSITION_LUA),
        }
    }
}

fn text_field(key: &str, fields: &HashMap<String, Vec<u8>>, name: &str) -> Result<String> {
    let raw = fields.get(name).ok_or_else(|| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("missing field {}", name),
    })?;
    String::from_utf8(raw.clone()).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("field {} is not utf-8: {}", name, e),
    })
}

fn job_from_hash(key: &str, mut fields: HashMap<String, Vec<u8>>) -> Result<Job> {
    let corrupt = |reason: String| StoreError::Corrupt {
        key: key.to_string(),
        reason,
    };

    let status = text_field(key, &fields, "status")?
        .parse::<JobStatus>()
        .map_err(corrupt)?;
    let created_at = DateTime::parse_from_rfc3339(&text_field(key, &fields, "created_at")?)
        .map_err(|e| corrupt(format!("bad created_at: {}", e)))?
        .with_timezone(&Utc);
    let skipped_records = match fields.get("skipped_records") {
        Some(_) => Some(
            text_field(key, &fields, "skipped_records")?
                .parse::<u64>()
                .map_err(|e| corrupt(format!("bad skipped_records: {}", e)))?,
        ),
        None => None,
    };
    let error = match fields.get("error") {
        Some(_) => Some(text_field(key, &fields, "error")?),
        None => None,
    };

    Ok(Job {
        id: text_field(key, &fields, "id")?,
        status,
        start: text_field(key, &fields, "start")?,
        end: text_field(key, &fields, "end")?,
        created_at,
        error,
        skipped_records,
        image: fields.remove("image"),
    })
}

#[async_trait]
impl JobRepository for RedisJobs {
    async fn create(&self, job: &Job) -> Result<()> {
        let mut con = self.con.clone();
        let fields = [
            ("id", job.id.clone()),
            ("status", job.status.as_str().to_string()),
            ("start", job.start.clone()),
            ("end", job.end.clone()),
            ("created_at", job.created_at.to_rfc3339()),
        ];
        con.hset_multiple::<_, _, _, ()>(job_key(&job.id), &fields)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let mut con = self.con.clone();
        let key = job_key(id);
        let fields: HashMap<String, Vec<u8>> = con.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        job_from_hash(&key, fields).map(Some)
    }

    async fn transition(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        outcome: TransitionOutcome,
    ) -> Result<bool> {
        Job::check_transition(id, from, to)?;

        let mut con = self.con.clone();
        let mut invocation = self.transition.prepare_invoke();
        invocation
            .key(job_key(id))
            .arg(from.as_str())
            .arg(to.as_str());
        if let Some(image) = &outcome.image {
            invocation.arg("image").arg(image.as_slice());
        }
        if let Some(error) = &outcome.error {
            invocation.arg("error").arg(error.as_str());
        }
        if let Some(skipped) = outcome.skipped_records {
            invocation.arg("skipped_records").arg(skipped);
        }

        let applied: i64 = invocation.invoke_async(&mut con).await?;
        match applied {
            -1 => Err(StoreError::JobNotFound(id.to_string())),
            0 => Ok(false),
            _ => Ok(true),
        }
    }
}

/// List-backed queue. BLPOP holds its connection, so pushes go over a second one.
pub struct RedisQueue {
    push: MultiplexedConnection,
    pop: MultiplexedConnection,
}

impl RedisQueue {
    pub fn new(push: MultiplexedConnection, pop: MultiplexedConnection) -> Self {
        Self { push, pop }
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, id: &str) -> Result<()> {
        let mut con = self.push.clone();
        con.rpush::<_, _, ()>(QUEUE_KEY, id).await?;
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<String>> {
        let mut con = self.pop.clone();
        // a zero timeout would make BLPOP block forever
        let timeout = wait.as_secs_f64().max(0.01);
        let popped: Option<(String, String)> = con.blpop(QUEUE_KEY, timeout).await?;
        Ok(popped.map(|(_, id)| id))
    }
}

pub struct RedisImages {
    con: MultiplexedConnection,
}

impl RedisImages {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }
}

#[async_trait]
impl ImageRepository for RedisImages {
    async fn put(&self, name: &str, image: Vec<u8>) -> Result<()> {
        let mut con = self.con.clone();
        con.set::<_, _, ()>(name, image).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut con = self.con.clone();
        Ok(con.get(name).await?)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut con = self.con.clone();
        let removed: i64 = con.del(name).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(pairs: &[(&str, &str)]) -> HashMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_job_from_hash_round_trips_fields() {
        let mut fields = hash(&[
            ("id", "abc"),
            ("status", "complete"),
            ("start", "1975"),
            ("end", "1980"),
            ("created_at", "2024-01-02T03:04:05+00:00"),
            ("skipped_records", "3"),
        ]);
        fields.insert("image".to_string(), vec![0xff, 0x00, 0x10]);

        let job = job_from_hash("job.abc", fields).unwrap();
        assert_eq!(job.id, "abc");
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.skipped_records, Some(3));
        assert_eq!(job.image, Some(vec![0xff, 0x00, 0x10]));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_job_from_hash_rejects_unknown_status() {
        let fields = hash(&[
            ("id", "abc"),
            ("status", "in progress"),
            ("start", "1975"),
            ("end", "1980"),
            ("created_at", "2024-01-02T03:04:05+00:00"),
        ]);

        let err = job_from_hash("job.abc", fields).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_job_from_hash_requires_bounds() {
        let fields = hash(&[
            ("id", "abc"),
            ("status", "submitted"),
            ("created_at", "2024-01-02T03:04:05+00:00"),
        ]);

        assert!(job_from_hash("job.abc", fields).is_err());
    }

    // The tests below talk to a live server: `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`

    fn redis_url() -> Option<String> {
        std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty())
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_claim_is_compare_and_set() {
        let Some(url) = redis_url() else { return };
        let jobs = RedisJobs::new(connect_db(&url, JOBS_DB).await.unwrap());
        let job = Job::new("1975".into(), "1980".into());
        jobs.create(&job).await.unwrap();

        for expected in [true, false] {
            let claimed = jobs
                .transition(
                    &job.id,
                    JobStatus::Submitted,
                    JobStatus::InProgress,
                    TransitionOutcome::default(),
                )
                .await
                .unwrap();
            assert_eq!(claimed, expected);
        }

        jobs.transition(
            &job.id,
            JobStatus::InProgress,
            JobStatus::Complete,
            TransitionOutcome::completed(b"<svg/>".to_vec(), 2),
        )
        .await
        .unwrap();

        let err = jobs
            .transition(
                &job.id,
                JobStatus::Complete,
                JobStatus::Complete,
                TransitionOutcome::completed(b"other".to_vec(), 0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let stored = jobs.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Complete);
        assert_eq!(stored.image.as_deref(), Some(&b"<svg/>"[..]));
        assert_eq!(stored.skipped_records, Some(2));

        let missing = jobs
            .transition(
                "no-such-job",
                JobStatus::Submitted,
                JobStatus::InProgress,
                TransitionOutcome::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::JobNotFound(_)));
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_queue_is_fifo() {
        let Some(url) = redis_url() else { return };
        let queue = RedisQueue::new(
            connect_db(&url, QUEUE_DB).await.unwrap(),
            connect_db(&url, QUEUE_DB).await.unwrap(),
        );
        let wait = Duration::from_millis(100);
        while queue.dequeue(wait).await.unwrap().is_some() {}

        for id in ["a", "b", "a"] {
            queue.enqueue(id).await.unwrap();
        }
        assert_eq!(queue.dequeue(wait).await.unwrap().as_deref(), Some("a"));
        assert_eq!(queue.dequeue(wait).await.unwrap().as_deref(), Some("b"));
        assert_eq!(queue.dequeue(wait).await.unwrap().as_deref(), Some("a"));
        assert_eq!(queue.dequeue(wait).await.unwrap(), None);
    }
}
