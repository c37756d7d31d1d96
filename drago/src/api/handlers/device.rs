//! RFC 8628 device authorization grant.
//!
//! A CLI asks for a device code and shows the user code; the user approves it from a signed-in
//! browser; the CLI polls the token endpoint until it receives a session JWT. Every terminal
//! outcome (token issued, denied, expired) consumes the request.

use axum::{
    Form, Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};

use crate::{
    AppState,
    api::models::{
        device::{
            DEVICE_CODE_GRANT_TYPE, DeviceCodeRequest, DeviceCodeResponse, DeviceDecisionRequest, DeviceDecisionResponse, DeviceErrorCode,
            DeviceRequestStatus, DeviceTokenError, DeviceTokenRequest, DeviceTokenResponse, UserCodeQuery,
        },
        users::CurrentUser,
    },
    auth::{
        device::{
            SLOW_DOWN_INCREMENT_SECS, format_user_code, generate_device_code, generate_user_code, hash_device_code, is_well_formed_user_code,
            normalize_user_code,
        },
        session,
    },
    db::{
        errors::DbError,
        handlers::{DeviceCodes, Repository, Users},
        models::device_codes::{DeviceCodeCreateDBRequest, DeviceCodeStatus},
    },
    errors::Error,
};

/// Attempts at drawing an unused user code before giving up.
const MAX_CODE_ATTEMPTS: usize = 3;

/// Failure of a device flow endpoint: either an RFC 8628 error body or a server-side error.
#[derive(Debug)]
pub enum DeviceFlowError {
    Protocol(DeviceTokenError),
    Server(Error),
}

impl From<DeviceTokenError> for DeviceFlowError {
    fn from(e: DeviceTokenError) -> Self {
        DeviceFlowError::Protocol(e)
    }
}

impl From<Error> for DeviceFlowError {
    fn from(e: Error) -> Self {
        DeviceFlowError::Server(e)
    }
}

impl From<DbError> for DeviceFlowError {
    fn from(e: DbError) -> Self {
        DeviceFlowError::Server(Error::Database(e))
    }
}

impl From<sqlx::Error> for DeviceFlowError {
    fn from(e: sqlx::Error) -> Self {
        DeviceFlowError::Server(Error::Database(e.into()))
    }
}

impl IntoResponse for DeviceFlowError {
    fn into_response(self) -> Response {
        match self {
            DeviceFlowError::Protocol(e) => e.into_response(),
            DeviceFlowError::Server(e) => e.into_response(),
        }
    }
}

fn protocol_error(code: DeviceErrorCode, description: &str) -> DeviceFlowError {
    DeviceFlowError::Protocol(DeviceTokenError::new(code, description))
}

fn to_chrono(duration: std::time::Duration, what: &str) -> Result<Duration, Error> {
    Duration::from_std(duration).map_err(|e| Error::Internal {
        operation: format!("convert {what}: {e}"),
    })
}

/// Start a device authorization request
#[utoipa::path(
    post,
    path = "/api/auth/device/code",
    request_body(content = DeviceCodeRequest, content_type = "application/x-www-form-urlencoded"),
    tag = "device",
    responses(
        (status = 200, description = "Device and user codes", body = DeviceCodeResponse),
        (status = 400, description = "Unknown client", body = DeviceTokenError),
    )
)]
#[instrument(skip_all, fields(client_id = %request.client_id))]
pub async fn device_code(
    State(state): State<AppState>,
    Form(request): Form<DeviceCodeRequest>,
) -> Result<Json<DeviceCodeResponse>, DeviceFlowError> {
    let device_config = &state.config.auth.device;
    let client_id = request.client_id.trim();

    if client_id.is_empty() {
        return Err(protocol_error(DeviceErrorCode::InvalidRequest, "client_id is required"));
    }
    if !device_config.allowed_client_ids.is_empty() && !device_config.allowed_client_ids.iter().any(|id| id == client_id) {
        return Err(protocol_error(DeviceErrorCode::InvalidClient, "Unknown client_id"));
    }

    let lifetime = to_chrono(device_config.code_lifetime, "device code lifetime")?;
    let interval_secs = device_config.polling_interval.as_secs() as i32;
    let now = Utc::now();

    let mut conn = state.db.acquire().await?;
    let purged = DeviceCodes::new(&mut conn).delete_expired(now).await?;
    if purged > 0 {
        debug!("Purged {} expired device codes", purged);
    }

    let mut attempt = 0;
    let (device_code, issued) = loop {
        attempt += 1;
        let device_code = generate_device_code();
        let create = DeviceCodeCreateDBRequest {
            device_code_hash: hash_device_code(&device_code),
            user_code: generate_user_code(),
            client_id: client_id.to_string(),
            scope: request.scope.clone().filter(|s| !s.trim().is_empty()),
            polling_interval_secs: interval_secs,
            expires_at: now + lifetime,
        };

        match DeviceCodes::new(&mut conn).create(&create).await {
            Ok(issued) => break (device_code, issued),
            Err(DbError::UniqueViolation { .. }) if attempt < MAX_CODE_ATTEMPTS => {
                debug!("Device code collision on attempt {}, retrying", attempt);
            }
            Err(e) => return Err(e.into()),
        }
    };

    let user_code = format_user_code(&issued.user_code);
    let verification_uri = state.config.device_verification_uri();
    let mut verification_uri_complete = verification_uri.clone();
    verification_uri_complete.query_pairs_mut().append_pair("user_code", &user_code);

    info!("Issued device code for client {}", issued.client_id);
    Ok(Json(DeviceCodeResponse {
        device_code,
        user_code,
        verification_uri: verification_uri.to_string(),
        verification_uri_complete: verification_uri_complete.to_string(),
        expires_in: lifetime.num_seconds(),
        interval: interval_secs as i64,
    }))
}

/// Poll for the outcome of a device authorization request
#[utoipa::path(
    post,
    path = "/api/auth/device/token",
    request_body(content = DeviceTokenRequest, content_type = "application/x-www-form-urlencoded"),
    tag = "device",
    responses(
        (status = 200, description = "Access token", body = DeviceTokenResponse),
        (status = 400, description = "Pending, slow down, denied, expired or invalid", body = DeviceTokenError),
    )
)]
#[instrument(skip_all, fields(client_id = %request.client_id))]
pub async fn device_token(
    State(state): State<AppState>,
    Form(request): Form<DeviceTokenRequest>,
) -> Result<Json<DeviceTokenResponse>, DeviceFlowError> {
    if request.grant_type != DEVICE_CODE_GRANT_TYPE {
        return Err(protocol_error(
            DeviceErrorCode::UnsupportedGrantType,
            "grant_type must be urn:ietf:params:oauth:grant-type:device_code",
        ));
    }

    let mut tx = state.db.begin().await?;
    let code = DeviceCodes::new(&mut tx)
        .get_by_device_code_hash_for_update(&hash_device_code(request.device_code.trim()))
        .await?
        .ok_or_else(|| protocol_error(DeviceErrorCode::InvalidGrant, "Unknown or already used device code"))?;

    if code.client_id != request.client_id.trim() {
        return Err(protocol_error(DeviceErrorCode::InvalidGrant, "Device code was issued to another client"));
    }

    let now = Utc::now();
    if code.is_expired() {
        DeviceCodes::new(&mut tx).delete(code.id).await?;
        tx.commit().await?;
        return Err(protocol_error(DeviceErrorCode::ExpiredToken, "The device code has expired"));
    }

    match code.status {
        DeviceCodeStatus::Pending => {
            let too_fast = code
                .last_polled_at
                .is_some_and(|last| now - last < Duration::seconds(code.polling_interval_secs as i64));

            if too_fast {
                let interval = code.polling_interval_secs + SLOW_DOWN_INCREMENT_SECS;
                DeviceCodes::new(&mut tx).record_poll(code.id, now, Some(interval)).await?;
                tx.commit().await?;
                debug!("Client polling too fast, interval raised to {}s", interval);
                return Err(protocol_error(
                    DeviceErrorCode::SlowDown,
                    &format!("Polling too frequently, wait at least {interval} seconds"),
                ));
            }

            DeviceCodes::new(&mut tx).record_poll(code.id, now, None).await?;
            tx.commit().await?;
            Err(protocol_error(DeviceErrorCode::AuthorizationPending, "The user has not yet approved the request"))
        }
        DeviceCodeStatus::Denied => {
            DeviceCodes::new(&mut tx).delete(code.id).await?;
            tx.commit().await?;
            Err(protocol_error(DeviceErrorCode::AccessDenied, "The user denied the request"))
        }
        DeviceCodeStatus::Approved => {
            let user_id = code.user_id.ok_or_else(|| Error::Internal {
                operation: "issue device token: approved request has no user".to_string(),
            })?;
            let user = Users::new(&mut tx).get_by_id(user_id).await?;
            DeviceCodes::new(&mut tx).delete(code.id).await?;
            tx.commit().await?;

            let user: CurrentUser = user
                .ok_or_else(|| protocol_error(DeviceErrorCode::AccessDenied, "The approving account no longer exists"))?
                .into();
            let access_token = session::create_session_token(&user, &state.config)?;

            info!("Device authorization completed for user {}", user.id);
            Ok(Json(DeviceTokenResponse {
                access_token,
                token_type: "Bearer".to_string(),
                expires_in: state.config.auth.security.jwt_expiry.as_secs() as i64,
                scope: code.scope.unwrap_or_default(),
            }))
        }
    }
}

/// Look up a pending device request by user code
#[utoipa::path(
    get,
    path = "/api/auth/device",
    params(UserCodeQuery),
    tag = "device",
    responses(
        (status = 200, description = "The pending request", body = DeviceRequestStatus),
        (status = 400, description = "Missing user code"),
        (status = 404, description = "Unknown or expired user code"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[instrument(skip_all)]
pub async fn device_status(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<UserCodeQuery>,
) -> Result<Json<DeviceRequestStatus>, Error> {
    let user_code = query.user_code.as_deref().map(normalize_user_code).unwrap_or_default();
    if user_code.is_empty() {
        return Err(Error::BadRequest {
            message: "user_code is required".to_string(),
        });
    }
    if !is_well_formed_user_code(&user_code) {
        return Err(Error::NotFound {
            resource: "Device request".to_string(),
            id: user_code,
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match DeviceCodes::new(&mut conn).get_by_user_code(&user_code).await? {
        Some(code) if !code.is_expired() => Ok(Json(code.into())),
        _ => Err(Error::NotFound {
            resource: "Device request".to_string(),
            id: format_user_code(&user_code),
        }),
    }
}

async fn decide(state: &AppState, user: &CurrentUser, user_code: &str, status: DeviceCodeStatus) -> Result<DeviceDecisionResponse, Error> {
    let user_code = normalize_user_code(user_code);
    let not_found = || Error::NotFound {
        resource: "Device request".to_string(),
        id: format_user_code(&user_code),
    };
    if !is_well_formed_user_code(&user_code) {
        return Err(not_found());
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if DeviceCodes::new(&mut conn).resolve(&user_code, status, user.id).await?.is_some() {
        info!("User {} marked device request {:?}", user.id, status);
        return Ok(DeviceDecisionResponse { success: true });
    }

    // Explain why nothing was resolved
    match DeviceCodes::new(&mut conn).get_by_user_code(&user_code).await? {
        Some(code) if code.is_expired() => Err(Error::BadRequest {
            message: "This code has expired, start again on your device".to_string(),
        }),
        Some(_) => Err(Error::Conflict {
            message: "This code has already been used".to_string(),
        }),
        None => Err(not_found()),
    }
}

/// Approve a device request
#[utoipa::path(
    post,
    path = "/api/auth/device/approve",
    request_body = DeviceDecisionRequest,
    tag = "device",
    responses(
        (status = 200, description = "Approved", body = DeviceDecisionResponse),
        (status = 404, description = "Unknown user code"),
        (status = 409, description = "Already approved or denied"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[instrument(skip_all)]
pub async fn approve(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<DeviceDecisionRequest>,
) -> Result<Json<DeviceDecisionResponse>, Error> {
    decide(&state, &user, &request.user_code, DeviceCodeStatus::Approved).await.map(Json)
}

/// Deny a device request
#[utoipa::path(
    post,
    path = "/api/auth/device/deny",
    request_body = DeviceDecisionRequest,
    tag = "device",
    responses(
        (status = 200, description = "Denied", body = DeviceDecisionResponse),
        (status = 404, description = "Unknown user code"),
        (status = 409, description = "Already approved or denied"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[instrument(skip_all)]
pub async fn deny(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<DeviceDecisionRequest>,
) -> Result<Json<DeviceDecisionResponse>, Error> {
    decide(&state, &user, &request.user_code, DeviceCodeStatus::Denied).await.map(Json)
}
