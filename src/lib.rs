pub mod analysis;
pub mod api;
pub mod config;
pub mod dataset;
pub mod db;
pub mod shutdown;
pub mod worker;
