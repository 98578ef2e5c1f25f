use actix_web::{
    get, post,
    web::{Data, Path, ServiceConfig, scope},
    HttpResponse,
};
use actix_web_validator::Json;

use super::models::SubmitJob;
use super::service::JobService;
use crate::analysis::chart::CONTENT_TYPE;
use crate::api::error::ServiceError;

#[post("")]
async fn submit_job(
    service: Data<JobService>,
    body: Json<SubmitJob>,
) -> Result<HttpResponse, ServiceError> {
    let (start, end) = body.bounds();
    let job = service.submit(start, end).await?;
    Ok(HttpResponse::Created().json(job))
}

#[get("/{id}")]
async fn get_job(
    service: Data<JobService>,
    id: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let job = service.get_job(&id).await?;
    Ok(HttpResponse::Ok().json(job))
}

#[get("/status/{id}")]
async fn get_status(
    service: Data<JobService>,
    id: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let status = service.get_status(&id).await?;
    Ok(HttpResponse::Ok().json(status))
}

#[get("/download/{id}")]
async fn download(
    service: Data<JobService>,
    id: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let image = service.get_artifact(&id).await?;
    Ok(HttpResponse::Ok()
        .content_type(CONTENT_TYPE)
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}.svg\"", id.as_str()),
        ))
        .body(image))
}

pub fn job_config(config: &mut ServiceConfig) {
    config
        .service(scope("jobs").service(submit_job).service(get_job))
        .service(get_status)
        .service(download);
}
