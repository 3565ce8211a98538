use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::{PageQuery, non_blank};
use crate::{
    auth::{auth::AuthUser, password::hash_password},
    error::ApiError,
    model::role::Role,
    store::PawnStore,
    utils::{
        kood_index::KoodRegistry,
        validation::{check_kood, check_password, clean_phone, clean_text},
    },
};

#[derive(Debug, Deserialize)]
pub struct EmployeeQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployee {
    pub nimi: Option<String>,
    pub perekonnanimi: Option<String>,
    pub kood: Option<String>,
    pub tel: Option<String>,
    pub aadres: Option<String>,
    pub role_id: Option<u8>,
    pub pass: Option<String>,
}

pub async fn list_employees(
    query: web::Query<PageQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page()?;
    Ok(HttpResponse::Ok().json(store.list_employees(page).await?))
}

pub async fn search_employees(
    query: web::Query<EmployeeQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let term = non_blank(&query.search)
        .ok_or_else(|| ApiError::bad_request("Search query is required."))?;
    Ok(HttpResponse::Ok().json(store.search_employees(term).await?))
}

pub async fn get_employee(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let employee = store
        .get_employee(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found."))?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Admin-only partial update; role 3 deactivates the account.
pub async fn update_employee(
    auth: AuthUser,
    path: web::Path<u64>,
    payload: web::Json<UpdateEmployee>,
    store: web::Data<dyn PawnStore>,
    registry: web::Data<KoodRegistry>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let id = path.into_inner();
    let mut employee = store
        .get_employee(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found."))?;
    let previous_kood = employee.kood.clone();

    if let Some(kood) = non_blank(&payload.kood) {
        check_kood(kood)?;
        let owner = registry
            .employees
            .owner_of(kood, || async {
                Ok(store.employee_by_kood(kood).await?.map(|e| e.tootaja_id))
            })
            .await?;
        if owner.is_some_and(|owner| owner != id) {
            return Err(ApiError::bad_request(
                "Another user with this kood already exists.",
            ));
        }
        employee.kood = kood.to_string();
    }

    if let Some(pass) = payload.pass.as_deref().filter(|p| !p.is_empty()) {
        check_password(pass)?;
        employee.pass = hash_password(pass).map_err(|e| {
            error!(error = %e, tootaja_id = id, "Failed to hash password");
            ApiError::Internal
        })?;
    }

    if let Some(role_id) = payload.role_id {
        let role = Role::from_id(role_id)
            .ok_or_else(|| ApiError::bad_request("role_id must be 1, 2 or 3."))?;
        employee.role_id = role.id();
    }

    if payload.tel.is_some() {
        employee.tel = clean_phone(payload.tel.as_deref())?;
    }
    if let Some(nimi) = non_blank(&payload.nimi) {
        employee.nimi = nimi.to_string();
    }
    if let Some(perekonnanimi) = non_blank(&payload.perekonnanimi) {
        employee.perekonnanimi = perekonnanimi.to_string();
    }
    if payload.aadres.is_some() {
        employee.aadres = clean_text(payload.aadres.as_deref());
    }

    store.update_employee(&employee).await?;

    if employee.kood != previous_kood {
        registry.employees.remove(&previous_kood).await;
        registry.employees.insert(&employee.kood, id).await;
    }
    info!(tootaja_id = id, by = auth.user_id, "Employee updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully.",
        "tootaja": employee
    })))
}

pub async fn delete_employee(
    auth: AuthUser,
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
    registry: web::Data<KoodRegistry>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let id = path.into_inner();
    let employee = store
        .delete_employee(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found."))?;

    registry.employees.remove(&employee.kood).await;
    info!(tootaja_id = id, by = auth.user_id, "Employee deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee deleted successfully." })))
}
