use crate::{auth::jwt::verify_token, error::ApiError, model::role::Role, store::PawnStore};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    /// `tootaja_id` of the logged-in employee
    pub user_id: u64,
    pub role: Role,
}

/// Role 3 keeps the row but loses access.
fn active_role(role_id: u8) -> Result<Role, ApiError> {
    match Role::from_id(role_id) {
        Some(Role::Inactive) => Err(ApiError::forbidden("User is deactivated.")),
        Some(role) => Ok(role),
        None => Err(ApiError::Unauthorized("Invalid role.".into())),
    }
}

impl AuthUser {
    /// Validates a bearer token and turns its claims into an `AuthUser`.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, ApiError> {
        let claims = verify_token(token, secret)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token.".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            role: active_role(claims.role)?,
        })
    }

    /// Re-reads the employee so that a role change or deletion applies to
    /// tokens issued before it.
    pub async fn current(self, store: &dyn PawnStore) -> Result<Self, ApiError> {
        let employee = store
            .get_employee(self.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists.".into()))?;

        Ok(AuthUser {
            user_id: employee.tootaja_id,
            role: active_role(employee.role_id)?,
        })
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only."))
        }
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("Missing token.".into())),
        )
    }
}
