use async_trait::async_trait;

use crate::db::error::Result;
use crate::db::models::VehicleRecord;

/// The dataset namespace. Records are only ever replaced in bulk.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Clear the namespace and load `records`, returning how many keys were written
    async fn replace_all(&self, records: Vec<VehicleRecord>) -> Result<usize>;

    /// Every record, ordered by storage key
    async fn all(&self) -> Result<Vec<VehicleRecord>>;

    async fn clear(&self) -> Result<()>;

    async fn is_empty(&self) -> Result<bool>;

    /// Round-trip to the backend, used by readiness probes
    async fn ping(&self) -> Result<()>;
}

/// Named ad hoc plot images produced by the synchronous plot routes
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn put(&self, name: &str, image: Vec<u8>) -> Result<()>;

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Returns whether an image was actually removed
    async fn delete(&self, name: &str) -> Result<bool>;
}
