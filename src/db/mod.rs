pub mod connection;
pub mod error;
pub mod job_repository;
pub mod memory;
pub mod models;
pub mod record_repository;
pub mod redis_store;

pub use connection::Stores;
pub use error::StoreError;
