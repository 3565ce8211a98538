use crate::auth::auth::{AuthUser, bearer_token};
use crate::config::Config;
use crate::error::ApiError;
use crate::store::PawnStore;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?
        .clone();
    let store = req
        .app_data::<Data<dyn PawnStore>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Store missing"))?
        .clone();

    let claimed = bearer_token(req.request())
        .ok_or_else(|| ApiError::Unauthorized("Missing or malformed Authorization header.".into()))
        .and_then(|token| AuthUser::from_token(token, &config.jwt_secret));

    // the role in the token may be stale; the stored one decides
    let verified = match claimed {
        Ok(user) => user.current(store.get_ref()).await,
        Err(e) => Err(e),
    };

    match verified {
        Ok(auth_user) => {
            req.extensions_mut().insert(auth_user);
            next.call(req).await
        }
        Err(e) => {
            let resp = e.error_response();
            Ok(req.into_response(resp))
        }
    }
}
