use actix_web::{
    web::{self, Data, Query, ServiceConfig},
    HttpResponse,
};
use serde::{Deserialize, Serialize};

use super::service::{Plot, PlotService, DEFAULT_WEIGHT_MPG_YEAR};
use crate::analysis::chart::CONTENT_TYPE;
use crate::api::data::handlers::MessageResponse;
use crate::api::error::ServiceError;

#[derive(Deserialize)]
struct YearQuery {
    year: Option<String>,
}

impl YearQuery {
    fn plot(&self) -> Plot {
        Plot::WeightMpg {
            year: self
                .year
                .clone()
                .unwrap_or_else(|| DEFAULT_WEIGHT_MPG_YEAR.to_string()),
        }
    }
}

#[derive(Serialize)]
struct PlotCreated {
    message: String,
    skipped_records: u64,
}

async fn create(service: &PlotService, plot: Plot) -> Result<HttpResponse, ServiceError> {
    let skipped_records = service.generate(&plot).await?;
    Ok(HttpResponse::Created().json(PlotCreated {
        message: format!("Plot {} has been generated", plot.image_name()),
        skipped_records,
    }))
}

async fn fetch(service: &PlotService, plot: Plot) -> Result<HttpResponse, ServiceError> {
    let image = service.get(&plot).await?;
    Ok(HttpResponse::Ok()
        .content_type(CONTENT_TYPE)
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}.svg\"", plot.image_name()),
        ))
        .body(image))
}

async fn remove(service: &PlotService, plot: Plot) -> Result<HttpResponse, ServiceError> {
    service.delete(&plot).await?;
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: format!("Plot {} deleted", plot.image_name()),
    }))
}

async fn create_overview(service: Data<PlotService>) -> Result<HttpResponse, ServiceError> {
    create(&service, Plot::Co2Overview).await
}

async fn get_overview(service: Data<PlotService>) -> Result<HttpResponse, ServiceError> {
    fetch(&service, Plot::Co2Overview).await
}

async fn delete_overview(service: Data<PlotService>) -> Result<HttpResponse, ServiceError> {
    remove(&service, Plot::Co2Overview).await
}

async fn create_weight_mpg(
    service: Data<PlotService>,
    query: Query<YearQuery>,
) -> Result<HttpResponse, ServiceError> {
    create(&service, query.plot()).await
}

async fn get_weight_mpg(
    service: Data<PlotService>,
    query: Query<YearQuery>,
) -> Result<HttpResponse, ServiceError> {
    fetch(&service, query.plot()).await
}

async fn delete_weight_mpg(
    service: Data<PlotService>,
    query: Query<YearQuery>,
) -> Result<HttpResponse, ServiceError> {
    remove(&service, query.plot()).await
}

pub fn plot_config(config: &mut ServiceConfig) {
    config
        .service(
            web::resource("/image")
                .route(web::post().to(create_overview))
                .route(web::get().to(get_overview))
                .route(web::delete().to(delete_overview)),
        )
        .service(
            web::resource("/weight_mpg_plot")
                .route(web::post().to(create_weight_mpg))
                .route(web::get().to(get_weight_mpg))
                .route(web::delete().to(delete_weight_mpg)),
        );
}
