use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::{error, warn};

use crate::analysis::chart::ChartError;
use crate::api::validation::ErrorResponse;
use crate::dataset::DatasetError;
use crate::db::StoreError;

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Dataset could not be read or parsed
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("{0}")]
    Chart(#[from] ChartError),

    #[error("{0}")]
    NotFound(String),

    /// Request is well-formed but the current state does not allow it
    #[error("{0}")]
    Conflict(String),
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Store(e) => {
                error!("Store error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Store error occurred"}),
                })
            }
            ServiceError::Dataset(DatasetError::Io { path, source }) => {
                error!("Dataset file {} unreadable: {}", path, source);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to load data".to_string(),
                    fields: serde_json::json!({"message": "Dataset file is not available"}),
                })
            }
            ServiceError::Dataset(e) => {
                warn!("Rejected dataset: {}", e);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Failed to load data".to_string(),
                    fields: serde_json::json!({"message": e.to_string()}),
                })
            }
            ServiceError::Chart(e) => {
                error!("{}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to render plot".to_string(),
                    fields: serde_json::json!({"message": e.to_string()}),
                })
            }
            ServiceError::NotFound(msg) => {
                warn!("Not found: {}", msg);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::Conflict(msg) => {
                warn!("Conflict: {}", msg);
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Conflict".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
        }
    }
}
