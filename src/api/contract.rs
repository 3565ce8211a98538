use std::str::FromStr;

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{PageQuery, non_blank};
use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::contract::{ContractFilter, ContractPatch, ContractType, NewContract},
    store::PawnStore,
    utils::form::{opt_date, opt_decimal, opt_id},
};

/// Contract body for both create and update. Form fields may arrive blank.
#[derive(Debug, Default, Deserialize)]
pub struct ContractReq {
    #[serde(default, deserialize_with = "opt_id")]
    pub klient_id: Option<u64>,
    #[serde(default, deserialize_with = "opt_id")]
    pub toode_id: Option<u64>,
    #[serde(default, deserialize_with = "opt_id")]
    pub tootaja_id: Option<u64>,
    #[serde(default, deserialize_with = "opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "opt_date")]
    pub date_valja_ostud: Option<NaiveDate>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub pant_hind: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub valja_ostud_hind: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub ostuhind: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal", alias = "müügihind")]
    pub muugihind: Option<Decimal>,
    pub leping_type: Option<String>,
}

impl ContractReq {
    fn contract_type(&self) -> Result<Option<ContractType>, ApiError> {
        non_blank(&self.leping_type)
            .map(parse_type)
            .transpose()
    }

    fn into_patch(self) -> Result<ContractPatch, ApiError> {
        Ok(ContractPatch {
            leping_type: self.contract_type()?,
            klient_id: self.klient_id,
            toode_id: self.toode_id,
            tootaja_id: self.tootaja_id,
            date: self.date,
            date_valja_ostud: self.date_valja_ostud,
            pant_hind: self.pant_hind,
            valja_ostud_hind: self.valja_ostud_hind,
            ostuhind: self.ostuhind,
            muugihind: self.muugihind,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ContractSearchQuery {
    pub search: Option<String>,
    pub leping_type: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ContractSearchQuery {
    fn filter(&self) -> Result<ContractFilter, ApiError> {
        let date = |value: &Option<String>, field: &str| {
            non_blank(value)
                .map(|v| {
                    NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                        ApiError::bad_request(format!("{} must be a YYYY-MM-DD date.", field))
                    })
                })
                .transpose()
        };

        Ok(ContractFilter {
            search: non_blank(&self.search).map(str::to_string),
            leping_type: non_blank(&self.leping_type).map(parse_type).transpose()?,
            date_from: date(&self.date_from, "date_from")?,
            date_to: date(&self.date_to, "date_to")?,
        })
    }
}

fn parse_type(raw: &str) -> Result<ContractType, ApiError> {
    ContractType::from_str(raw)
        .map_err(|_| ApiError::bad_request("leping_type must be one of pant, ost, müük, väljaost."))
}

pub async fn list_contracts(
    query: web::Query<PageQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page()?;
    Ok(HttpResponse::Ok().json(store.list_contracts(page).await?))
}

pub async fn search_contracts(
    query: web::Query<ContractSearchQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let page = PageQuery {
        page: query.page.clone(),
        limit: query.limit.clone(),
    }
    .page()?;
    let filter = query.filter()?;
    Ok(HttpResponse::Ok().json(store.search_contracts(&filter, page).await?))
}

pub async fn get_contract(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let contract = store
        .get_contract(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Contract not found."))?;
    Ok(HttpResponse::Ok().json(contract))
}

/// Contract with full party details, for the printable view.
pub async fn print_contract(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let detail = store
        .contract_detail(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Contract not found."))?;
    Ok(HttpResponse::Ok().json(detail))
}

pub async fn create_contract(
    auth: AuthUser,
    body: web::Json<ContractReq>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let (Some(klient_id), Some(toode_id)) = (body.klient_id, body.toode_id) else {
        return Err(ApiError::bad_request("klient_id and toode_id are required."));
    };
    let leping_type = body
        .contract_type()?
        .ok_or_else(|| ApiError::bad_request("leping_type is required."))?;

    let contract = store
        .create_contract(NewContract {
            klient_id,
            toode_id,
            tootaja_id: body.tootaja_id.unwrap_or(auth.user_id),
            date: body.date.unwrap_or_else(|| chrono::Local::now().date_naive()),
            date_valja_ostud: body.date_valja_ostud,
            pant_hind: body.pant_hind,
            valja_ostud_hind: body.valja_ostud_hind,
            ostuhind: body.ostuhind,
            muugihind: body.muugihind,
            leping_type,
        })
        .await?;

    info!(
        leping_id = contract.leping_id,
        klient_id,
        toode_id,
        "Contract created"
    );
    Ok(HttpResponse::Created().json(contract))
}

pub async fn update_contract(
    path: web::Path<u64>,
    body: web::Json<ContractReq>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let patch = body.into_inner().into_patch()?;

    let contract = store.update_contract(id, &patch).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Contract updated successfully.",
        "leping": contract
    })))
}

pub async fn delete_contract(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !store.delete_contract(id).await? {
        return Err(ApiError::not_found("Contract not found."));
    }
    info!(leping_id = id, "Contract deleted");
    Ok(HttpResponse::NoContent().finish())
}
