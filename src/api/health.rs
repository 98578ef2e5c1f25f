use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use tracing::error;

use crate::db::Stores;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn probe(stores: &Stores, up: &str, down: &str) -> HttpResponse {
    match stores.records.ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: up.to_string(),
            store: "connected".to_string(),
            error: None,
        }),
        Err(e) => {
            error!("Store check failed ({}): {:?}", down, e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: down.to_string(),
                store: "disconnected".to_string(),
                error: Some(format!("Store error: {}", e)),
            })
        }
    }
}

/// General health check including store connectivity.
#[get("/health")]
async fn health_check(stores: web::Data<Stores>) -> impl Responder {
    probe(&stores, "healthy", "unhealthy").await
}

/// Readiness probe: 503 while the store is unreachable, recovers on its own
#[get("/ready")]
async fn readiness_check(stores: web::Data<Stores>) -> impl Responder {
    probe(&stores, "ready", "not_ready").await
}

/// Liveness probe. Does not touch the store.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        store: "not_checked".to_string(),
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
