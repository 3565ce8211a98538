use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use super::{
    PageQuery, non_blank,
    upload::{ImageStore, ImageUpload, invalid_form},
};
use crate::{
    error::ApiError,
    model::product::{NewProduct, ProductFilter, ProductStatus},
    store::PawnStore,
    utils::{
        form::{opt_decimal, opt_id},
        validation::clean_text,
    },
};

const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct ProductReq {
    pub nimetus: Option<String>,
    #[serde(alias = "kirjaldus")]
    pub kirjeldus: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub status_id: Option<u64>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub hind: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSearchQuery {
    pub q: Option<String>,
    pub nimetus: Option<String>,
    pub kirjeldus: Option<String>,
    #[serde(rename = "status_id")]
    pub status_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl ProductSearchQuery {
    fn filter(&self) -> Result<ProductFilter, ApiError> {
        fn number<T: std::str::FromStr>(
            value: &Option<String>,
            field: &str,
        ) -> Result<Option<T>, ApiError> {
            non_blank(value)
                .map(|v| {
                    v.parse()
                        .map_err(|_| ApiError::bad_request(format!("Invalid {}.", field)))
                })
                .transpose()
        }

        Ok(ProductFilter {
            q: non_blank(&self.q).map(str::to_string),
            nimetus: non_blank(&self.nimetus).map(str::to_string),
            kirjeldus: non_blank(&self.kirjeldus).map(str::to_string),
            status_id: number(&self.status_id, "status_id")?,
            min_price: number(&self.min_price, "minPrice")?,
            max_price: number(&self.max_price, "maxPrice")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    pub search: Option<String>,
}

pub async fn list_products(
    query: web::Query<PageQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page()?;
    Ok(HttpResponse::Ok().json(store.list_products(page).await?))
}

pub async fn search_products(
    query: web::Query<ProductSearchQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.filter()?;
    Ok(HttpResponse::Ok().json(store.search_products(&filter).await?))
}

pub async fn autocomplete_products(
    query: web::Query<AutocompleteQuery>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let term = non_blank(&query.search)
        .ok_or_else(|| ApiError::bad_request("Search query is required."))?;
    Ok(HttpResponse::Ok().json(store.autocomplete_products(term).await?))
}

/// Public list of products whose status row is named "Laos".
pub async fn products_in_stock(store: web::Data<dyn PawnStore>) -> Result<HttpResponse, ApiError> {
    let products = store
        .products_by_status_name(ProductStatus::InStock.seeded_name())
        .await?;
    Ok(HttpResponse::Ok().json(products))
}

pub async fn products_by_status(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let products = store.products_by_status(path.into_inner()).await?;
    if products.is_empty() {
        return Err(ApiError::not_found("No products found with this status."));
    }
    Ok(HttpResponse::Ok().json(products))
}

pub async fn get_product(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let product = store
        .get_product(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found."))?;
    Ok(HttpResponse::Ok().json(product))
}

/// Reads a `multipart/form-data` product form: text fields plus an optional
/// `image` part.
async fn read_product_form(
    mut payload: Multipart,
) -> Result<(ProductReq, Option<ImageUpload>), ApiError> {
    let mut fields = Map::new();
    let mut image = None;

    while let Some(mut field) = payload.try_next().await.map_err(invalid_form)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            // a file input left empty still sends a part, with no file name
            let no_file = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .is_some_and(str::is_empty);
            if no_file {
                while field.try_next().await.map_err(invalid_form)?.is_some() {}
            } else {
                image = Some(ImageUpload::read(&mut field).await?);
            }
            continue;
        }

        let mut text = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(invalid_form)? {
            if text.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
                return Err(ApiError::bad_request(format!("Field '{}' is too long.", name)));
            }
            text.extend_from_slice(&chunk);
        }
        let text = String::from_utf8(text)
            .map_err(|_| ApiError::bad_request(format!("Field '{}' is not valid text.", name)))?;
        fields.insert(name, Value::String(text));
    }

    let req = serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;
    Ok((req, image))
}

async fn create(
    req: ProductReq,
    image: Option<ImageUpload>,
    store: &dyn PawnStore,
    images: &ImageStore,
) -> Result<HttpResponse, ApiError> {
    let (Some(nimetus), Some(status_id), Some(hind)) =
        (non_blank(&req.nimetus), req.status_id, req.hind)
    else {
        return Err(ApiError::bad_request(
            "Required fields missing (nimetus, status_id, hind).",
        ));
    };

    let image = match image {
        Some(upload) => Some(images.save(upload).await?),
        None => None,
    };

    let inserted = store
        .insert_product(NewProduct {
            nimetus: nimetus.to_string(),
            kirjeldus: clean_text(req.kirjeldus.as_deref()),
            status_id,
            image: image.clone(),
            hind,
        })
        .await;

    let product = match inserted {
        Ok(product) => product,
        Err(e) => {
            if let Some(path) = image.as_deref() {
                images.discard(path).await;
            }
            return Err(e.into());
        }
    };

    info!(toode_id = product.toode_id, image = ?product.image, "Product created");
    Ok(HttpResponse::Created().json(product))
}

pub async fn create_product(
    body: web::Json<ProductReq>,
    store: web::Data<dyn PawnStore>,
    images: web::Data<ImageStore>,
) -> Result<HttpResponse, ApiError> {
    create(body.into_inner(), None, store.get_ref(), &images).await
}

/// `POST /toode` as `multipart/form-data`, optionally carrying an `image` part.
pub async fn create_product_form(
    payload: Multipart,
    store: web::Data<dyn PawnStore>,
    images: web::Data<ImageStore>,
) -> Result<HttpResponse, ApiError> {
    let (req, image) = read_product_form(payload).await?;
    create(req, image, store.get_ref(), &images).await
}

/// Only the fields sent are changed; a blank `kirjeldus` clears it.
async fn update(
    id: u64,
    req: ProductReq,
    image: Option<ImageUpload>,
    store: &dyn PawnStore,
    images: &ImageStore,
) -> Result<HttpResponse, ApiError> {
    let mut product = store
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found."))?;

    if let Some(nimetus) = non_blank(&req.nimetus) {
        product.nimetus = nimetus.to_string();
    }
    if req.kirjeldus.is_some() {
        product.kirjeldus = clean_text(req.kirjeldus.as_deref());
    }
    if let Some(status_id) = req.status_id {
        product.status_id = status_id;
    }
    if let Some(hind) = req.hind {
        product.hind = hind;
    }

    let stored_image = match image {
        Some(upload) => Some(images.save(upload).await?),
        None => None,
    };
    if let Some(path) = &stored_image {
        product.image = Some(path.clone());
    }

    if let Err(e) = store.update_product(&product).await {
        if let Some(path) = stored_image.as_deref() {
            images.discard(path).await;
        }
        return Err(e.into());
    }

    info!(toode_id = id, image = ?stored_image, "Product updated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Product updated successfully.",
        "toode": product
    })))
}

/// PUT and PATCH share this handler.
pub async fn update_product(
    path: web::Path<u64>,
    body: web::Json<ProductReq>,
    store: web::Data<dyn PawnStore>,
    images: web::Data<ImageStore>,
) -> Result<HttpResponse, ApiError> {
    update(path.into_inner(), body.into_inner(), None, store.get_ref(), &images).await
}

/// `PUT|PATCH /toode/{id}` as `multipart/form-data`; an `image` part replaces the picture.
pub async fn update_product_form(
    path: web::Path<u64>,
    payload: Multipart,
    store: web::Data<dyn PawnStore>,
    images: web::Data<ImageStore>,
) -> Result<HttpResponse, ApiError> {
    let (req, image) = read_product_form(payload).await?;
    update(path.into_inner(), req, image, store.get_ref(), &images).await
}

pub async fn delete_product(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !store.delete_product(id).await? {
        return Err(ApiError::not_found("Product not found."));
    }
    info!(toode_id = id, "Product deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "product_buyout", skip(store))]
pub async fn buyout_product(
    path: web::Path<u64>,
    store: web::Data<dyn PawnStore>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let today = chrono::Local::now().date_naive();

    let buyout = store.buyout_product(id, today).await?;

    info!(
        toode_id = id,
        leping_id = buyout.leping.as_ref().map(|l| l.leping_id),
        "Product bought out"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Product bought out successfully.",
        "toode": buyout.toode,
        "leping": buyout.leping
    })))
}
