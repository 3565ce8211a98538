use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use super::non_blank;
use crate::{error::ApiError, store::PawnStore};

#[derive(Debug, Deserialize)]
pub struct StatusReq {
    pub nimetus: Option<String>,
}

pub async fn list_statuses(store: web::Data<dyn PawnStore>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(store.list_statuses().await?))
}

pub async fn get_status(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let status = store
        .get_status(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Status not found."))?;
    Ok(HttpResponse::Ok().json(status))
}

pub async fn create_status(
    body: web::Json<StatusReq>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let nimetus = non_blank(&body.nimetus)
        .ok_or_else(|| ApiError::bad_request("Field 'nimetus' is required."))?;
    let status = store.insert_status(nimetus).await?;
    Ok(HttpResponse::Created().json(status))
}

pub async fn update_status(
    path: web::Path<u64>,
    body: web::Json<StatusReq>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let mut status = store
        .get_status(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Status not found."))?;

    if let Some(nimetus) = non_blank(&body.nimetus) {
        status.nimetus = nimetus.to_string();
        store.update_status(&status).await?;
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Status updated successfully.",
        "status": status
    })))
}

pub async fn delete_status(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    if !store.delete_status(path.into_inner()).await? {
        return Err(ApiError::not_found("Status not found."));
    }
    Ok(HttpResponse::NoContent().finish())
}
