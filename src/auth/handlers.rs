use crate::{
    auth::{
        auth::AuthUser,
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::{employee::NewEmployee, role::Role},
    models::{LoginReqDto, RegisterReq},
    store::PawnStore,
    utils::{
        kood_index::KoodRegistry,
        validation::{check_kood, check_password, clean_phone, clean_text, required},
    },
};
use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument};

#[derive(Serialize)]
struct LoginResponse {
    token: String,
}

#[instrument(
    name = "auth_login",
    skip(store, config, user),
    fields(kood = user.kood.as_deref().unwrap_or(""))
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    store: web::Data<dyn PawnStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    let kood = user.kood.as_deref().map(str::trim).unwrap_or("");
    let pass = user.pass.as_deref().unwrap_or("");
    if kood.is_empty() || pass.is_empty() {
        info!("Validation failed: empty kood or password");
        return Err(ApiError::bad_request("Please fill all fields."));
    }

    debug!("Fetching employee from database");

    let Some(employee) = store.employee_by_kood(kood).await? else {
        info!("Invalid credentials: employee not found");
        return Err(ApiError::bad_request("Invalid credentials."));
    };

    if employee.role() == Some(Role::Inactive) {
        info!(user_id = employee.tootaja_id, "Login refused: deactivated");
        return Err(ApiError::forbidden("User is deactivated."));
    }

    if let Err(e) = verify_password(pass, &employee.pass) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::bad_request("Invalid credentials."));
    }

    let token = generate_access_token(
        employee.tootaja_id,
        employee.role_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        ApiError::Internal
    })?;

    info!(user_id = employee.tootaja_id, "Login successful");
    Ok(HttpResponse::Ok().json(LoginResponse { token }))
}

/// Admin creates a new employee account.
pub async fn register(
    auth: AuthUser,
    body: web::Json<RegisterReq>,
    store: web::Data<dyn PawnStore>,
    registry: web::Data<KoodRegistry>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    const MISSING: &str = "Please fill all required fields.";
    let nimi = required(body.nimi.as_deref(), MISSING)?;
    let perekonnanimi = required(body.perekonnanimi.as_deref(), MISSING)?;
    let kood = required(body.kood.as_deref(), MISSING)?;
    let pass = body
        .pass
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request(MISSING))?;
    let role_id = body.role_id.ok_or_else(|| ApiError::bad_request(MISSING))?;

    check_kood(kood)?;
    check_password(pass)?;
    if !matches!(Role::from_id(role_id), Some(Role::Admin | Role::Staff)) {
        return Err(ApiError::bad_request(
            "Invalid role_id. Only 1 (admin) or 2 (staff) allowed.",
        ));
    }
    let tel = clean_phone(body.tel.as_deref())?;

    let taken = registry
        .employees
        .owner_of(kood, || async {
            Ok(store.employee_by_kood(kood).await?.map(|e| e.tootaja_id))
        })
        .await?;
    if taken.is_some() {
        return Err(ApiError::bad_request("User with this kood already exists."));
    }

    let hashed = hash_password(pass).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal
    })?;

    let employee = store
        .insert_employee(NewEmployee {
            nimi: nimi.to_string(),
            perekonnanimi: perekonnanimi.to_string(),
            kood: kood.to_string(),
            tel,
            aadres: clean_text(body.aadres.as_deref()),
            role_id,
            pass: hashed,
        })
        .await?;

    registry.employees.insert(&employee.kood, employee.tootaja_id).await;
    info!(user_id = employee.tootaja_id, by = auth.user_id, "Employee registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully!",
        "userId": employee.tootaja_id
    })))
}
