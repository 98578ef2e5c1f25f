use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::error::StoreError;

pub const MANUFACTURER: &str = "Manufacturer";
pub const MODEL_YEAR: &str = "Model Year";
pub const VEHICLE_TYPE: &str = "Vehicle Type";
pub const CO2: &str = "Real-World CO2 (g/mi)";
pub const MPG: &str = "Real-World MPG";
pub const WEIGHT: &str = "Weight (lbs)";

/// Sentinel used by the dataset for its aggregate rows.
pub const AGGREGATE: &str = "All";

/// Lifecycle state of a job
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    InProgress,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether a job may move from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Submitted, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Complete)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(JobStatus::Submitted),
            "in_progress" => Ok(JobStatus::InProgress),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// A tracked unit of analysis work.
///
/// The job store owns the record; the queue only ever carries `id`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub start: String,
    pub end: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_records: Option<u64>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

impl Job {
    /// Create a freshly submitted job with a new unique id
    pub fn new(start: String, end: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Submitted,
            start,
            end,
            created_at: Utc::now(),
            error: None,
            skipped_records: None,
            image: None,
        }
    }

    /// Reject `from -> to` unless it is a forward step of the lifecycle
    pub fn check_transition(id: &str, from: JobStatus, to: JobStatus) -> Result<(), StoreError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from,
                to,
            })
        }
    }
}

/// Storage key of a job record
pub fn job_key(id: &str) -> String {
    format!("job.{}", id)
}

/// What the worker writes alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct TransitionOutcome {
    pub image: Option<Vec<u8>>,
    pub error: Option<String>,
    pub skipped_records: Option<u64>,
}

impl TransitionOutcome {
    pub fn completed(image: Vec<u8>, skipped_records: u64) -> Self {
        Self {
            image: Some(image),
            error: None,
            skipped_records: Some(skipped_records),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// One row of the auto-trends dataset, kept as the flat column mapping it was loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleRecord(BTreeMap<String, String>);

impl VehicleRecord {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn manufacturer(&self) -> &str {
        self.field(MANUFACTURER).unwrap_or_default()
    }

    pub fn model_year(&self) -> &str {
        self.field(MODEL_YEAR).unwrap_or_default()
    }

    pub fn vehicle_type(&self) -> &str {
        self.field(VEHICLE_TYPE).unwrap_or_default()
    }

    /// Composite identity used as the storage key
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.manufacturer(),
            self.model_year(),
            self.vehicle_type()
        )
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VehicleRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in [
            JobStatus::Submitted,
            JobStatus::InProgress,
            JobStatus::Complete,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!("in progress".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_transitions_only_move_forward() {
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::InProgress));
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::Complete));
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Submitted.can_transition_to(JobStatus::Complete));
        assert!(!JobStatus::Complete.can_transition_to(JobStatus::InProgress));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Complete));
        assert!(!JobStatus::InProgress.can_transition_to(JobStatus::Submitted));
    }

    #[test]
    fn test_new_job_is_submitted_with_unique_id() {
        let a = Job::new("1975".into(), "1980".into());
        let b = Job::new("1975".into(), "1980".into());
        assert_eq!(a.status, JobStatus::Submitted);
        assert!(a.image.is_none());
        assert_ne!(a.id, b.id);
        assert_eq!(job_key(&a.id), format!("job.{}", a.id));
    }

    #[test]
    fn test_job_json_hides_image() {
        let mut job = Job::new("1975".into(), "1980".into());
        job.image = Some(vec![1, 2, 3]);
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("image").is_none());
        assert_eq!(value["status"], "submitted");
        assert_eq!(value["start"], "1975");
    }

    #[test]
    fn test_record_key() {
        let record: VehicleRecord = [
            (MANUFACTURER, "Ford"),
            (MODEL_YEAR, "2020"),
            (VEHICLE_TYPE, "Car"),
        ]
        .into_iter()
        .collect();
        assert_eq!(record.key(), "Ford-2020-Car");
        assert_eq!(record.manufacturer(), "Ford");
        assert!(record.field(CO2).is_none());
    }
}
