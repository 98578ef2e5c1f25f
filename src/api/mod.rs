pub mod data;
pub mod error;
pub mod health;
pub mod job;
pub mod plot;
pub mod validation;

use actix_web::web::ServiceConfig;

/// Every route the service exposes
pub fn configure(config: &mut ServiceConfig) {
    config
        .configure(health::health_config)
        .configure(job::handlers::job_config)
        .configure(data::handlers::data_config)
        .configure(plot::handlers::plot_config);
}
