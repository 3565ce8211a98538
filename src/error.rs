use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use derive_more::Display;
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

/// Every failure leaves a handler as one of these and renders as `{"message": ...}`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "Something went wrong, contact the system admin.")]
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{} not found.", what)),
            StoreError::ClientNotFound => ApiError::not_found("Client not found."),
            StoreError::ClientBlocked => {
                ApiError::forbidden("Cannot create contract: client is blocked.")
            }
            StoreError::AlreadyBoughtOut => {
                ApiError::Conflict("Product is already bought out.".into())
            }
            StoreError::InvalidReference => {
                ApiError::bad_request("Referenced record does not exist.")
            }
            StoreError::Duplicate => ApiError::Conflict("Record with this kood already exists.".into()),
            StoreError::InUse => {
                ApiError::Conflict("Record is still referenced by contracts.".into())
            }
            other => {
                error!(error = %other, "Store operation failed");
                ApiError::Internal
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = %e, "Unexpected failure");
        ApiError::Internal
    }
}

/// Extractor settings so malformed bodies, queries and paths answer with
/// the same `{"message": ...}` shape as handler errors.
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid query parameters: {}", err)).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid path parameter: {}", err)).into()
    }));
}
