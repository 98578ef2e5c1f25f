use actix_web::{
    get,
    web::{self, Bytes, Data, Path, ServiceConfig},
    HttpResponse,
};
use serde::Serialize;

use super::service::DataService;
use crate::api::error::ServiceError;

#[derive(Serialize)]
pub struct LoadResponse {
    pub message: String,
    pub loaded: usize,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /data`: a non-empty body is taken as the CSV to load, otherwise the
/// configured dataset file is read
async fn load_data(service: Data<DataService>, body: Bytes) -> Result<HttpResponse, ServiceError> {
    let csv = (!body.is_empty()).then_some(body.as_ref());
    let loaded = service.load(csv).await?;
    Ok(HttpResponse::Created().json(LoadResponse {
        message: "Auto Trends data is loaded".to_string(),
        loaded,
    }))
}

async fn list_data(service: Data<DataService>) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(service.list().await?))
}

async fn clear_data(service: Data<DataService>) -> Result<HttpResponse, ServiceError> {
    service.clear().await?;
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Auto Trends data has been deleted".to_string(),
    }))
}

#[get("/years")]
async fn years(service: Data<DataService>) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(service.years().await?))
}

#[get("/years/{year}")]
async fn year_records(
    service: Data<DataService>,
    year: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(service.records_for_year(&year).await?))
}

#[get("/manufacturers")]
async fn manufacturers(service: Data<DataService>) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(service.manufacturers().await?))
}

#[get("/manufacturers/{manufacturer}")]
async fn manufacturer_records(
    service: Data<DataService>,
    manufacturer: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(service.records_for_manufacturer(&manufacturer).await?))
}

#[get("/manufacturers/{manufacturer}/years")]
async fn manufacturer_years(
    service: Data<DataService>,
    manufacturer: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(service.manufacturer_years(&manufacturer).await?))
}

#[get("/manufacturers/{manufacturer}/years/{year}")]
async fn manufacturer_year_records(
    service: Data<DataService>,
    path: Path<(String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let (manufacturer, year) = path.into_inner();
    Ok(HttpResponse::Ok().json(
        service
            .records_for_manufacturer_year(&manufacturer, &year)
            .await?,
    ))
}

pub fn data_config(config: &mut ServiceConfig) {
    config
        .service(
            web::resource("/data")
                .route(web::post().to(load_data))
                .route(web::get().to(list_data))
                .route(web::delete().to(clear_data)),
        )
        .service(years)
        .service(year_records)
        .service(manufacturers)
        .service(manufacturer_records)
        .service(manufacturer_years)
        .service(manufacturer_year_records);
}
