use std::str::FromStr;

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{PageQuery, non_blank};
use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::client::{ClientStatus, NewClient},
    store::PawnStore,
    utils::{
        kood_index::KoodRegistry,
        validation::{check_kood, clean_phone, clean_text, required},
    },
};

#[derive(Debug, Deserialize)]
pub struct ClientReq {
    pub nimi: Option<String>,
    pub perekonnanimi: Option<String>,
    pub kood: Option<String>,
    pub tel: Option<String>,
    pub aadres: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientSearchQuery {
    pub nimi: Option<String>,
    pub perekonnanimi: Option<String>,
    pub kood: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    pub search: Option<String>,
}

fn parse_status(raw: &str) -> Result<ClientStatus, ApiError> {
    ClientStatus::from_str(raw.trim())
        .map_err(|_| ApiError::bad_request("Status must be ACTIVE or BLOCKED."))
}

/// Resolves who owns `kood` in the client registry, if anyone.
async fn kood_owner(
    kood: &str,
    store: &dyn PawnStore,
    registry: &KoodRegistry,
) -> Result<Option<u64>, ApiError> {
    Ok(registry
        .clients
        .owner_of(kood, || store.client_id_by_kood(kood))
        .await?)
}

pub async fn list_clients(
    query: web::Query<PageQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page()?;
    let clients = store.list_clients(page).await?;
    Ok(HttpResponse::Ok().json(clients))
}

pub async fn search_clients(
    query: web::Query<ClientSearchQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let term = non_blank(&query.nimi)
        .or_else(|| non_blank(&query.perekonnanimi))
        .or_else(|| non_blank(&query.kood))
        .ok_or_else(|| {
            ApiError::bad_request(
                "Please provide a search parameter (nimi, perekonnanimi, or kood).",
            )
        })?;

    debug!(term, "Searching clients");
    Ok(HttpResponse::Ok().json(store.search_clients(term).await?))
}

pub async fn autocomplete_clients(
    query: web::Query<AutocompleteQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let term = non_blank(&query.search)
        .ok_or_else(|| ApiError::bad_request("Search query is required."))?;
    Ok(HttpResponse::Ok().json(store.autocomplete_clients(term).await?))
}

pub async fn get_client(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let client = store
        .get_client(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found."))?;
    Ok(HttpResponse::Ok().json(client))
}

pub async fn create_client(
    body: web::Json<ClientReq>,
    store: web::Data<dyn PawnStore>,
    registry: web::Data<KoodRegistry>,
) -> Result<HttpResponse, ApiError> {
    const MISSING: &str = "Name, surname and kood are required.";
    let nimi = required(body.nimi.as_deref(), MISSING)?;
    let perekonnanimi = required(body.perekonnanimi.as_deref(), MISSING)?;
    let kood = required(body.kood.as_deref(), MISSING)?;

    check_kood(kood)?;
    let tel = clean_phone(body.tel.as_deref())?;
    let status = match non_blank(&body.status) {
        Some(raw) => parse_status(raw)?,
        None => ClientStatus::Active,
    };

    if kood_owner(kood, store.get_ref(), &registry).await?.is_some() {
        return Err(ApiError::bad_request("Client with this kood already exists."));
    }

    let client = store
        .insert_client(NewClient {
            nimi: nimi.to_string(),
            perekonnanimi: perekonnanimi.to_string(),
            kood: kood.to_string(),
            tel,
            aadres: clean_text(body.aadres.as_deref()),
            status,
        })
        .await?;

    registry.clients.insert(&client.kood, client.klient_id).await;
    info!(klient_id = client.klient_id, "Client created");

    Ok(HttpResponse::Created().json(client))
}

/// PATCH: only the fields present in the body change. A blank `tel`/`aadres` clears it.
pub async fn update_client(
    path: web::Path<u64>,
    body: web::Json<ClientReq>,
    store: web::Data<dyn PawnStore>,
    registry: web::Data<KoodRegistry>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let mut client = store
        .get_client(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found."))?;
    let previous_kood = client.kood.clone();

    if let Some(kood) = non_blank(&body.kood) {
        check_kood(kood)?;
        match kood_owner(kood, store.get_ref(), &registry).await? {
            Some(owner) if owner != id => {
                return Err(ApiError::bad_request(
                    "Another client with this kood already exists.",
                ));
            }
            _ => client.kood = kood.to_string(),
        }
    }
    if let Some(nimi) = non_blank(&body.nimi) {
        client.nimi = nimi.to_string();
    }
    if let Some(perekonnanimi) = non_blank(&body.perekonnanimi) {
        client.perekonnanimi = perekonnanimi.to_string();
    }
    if body.tel.is_some() {
        client.tel = clean_phone(body.tel.as_deref())?;
    }
    if body.aadres.is_some() {
        client.aadres = clean_text(body.aadres.as_deref());
    }
    if let Some(raw) = non_blank(&body.status) {
        client.status = Some(parse_status(raw)?.to_string());
    }

    store.update_client(&client).await?;

    if client.kood != previous_kood {
        registry.clients.remove(&previous_kood).await;
        registry.clients.insert(&client.kood, id).await;
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Client updated successfully.",
        "klient": client
    })))
}

pub async fn delete_client(
    auth: AuthUser,
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
    registry: web::Data<KoodRegistry>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let id = path.into_inner();
    let client = store
        .delete_client(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found."))?;

    registry.clients.remove(&client.kood).await;
    info!(klient_id = id, by = auth.user_id, "Client deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Client deleted successfully." })))
}
