use serde::Serialize;

use crate::db::models::{Job, JobStatus};

/// Response for `GET /status/{id}`
#[derive(Serialize, Debug, PartialEq)]
pub struct StatusResponse {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for StatusResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            error: job.error,
        }
    }
}
