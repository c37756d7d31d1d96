use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::warn;

use crate::{
    AppState,
    api::models::{
        dns_tokens::{DnsTokenCreate, DnsTokenResponse, DnsTokenSecretResponse, DnsTokenUpdate},
        users::CurrentUser,
    },
    db::{
        handlers::{DnsTokens, Repository},
        models::dns_tokens::{DnsTokenCreateDBRequest, DnsTokenFilter, DnsTokenUpdateDBRequest},
    },
    errors::Error,
    types::DnsTokenId,
};

fn not_found(id: DnsTokenId) -> Error {
    Error::NotFound {
        resource: "DNS token".to_string(),
        id: id.to_string(),
    }
}

fn required(value: &str, field: &str) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be empty"),
        });
    }
    Ok(value.to_string())
}

/// List linked provider tokens
#[utoipa::path(
    get,
    path = "/api/v1/dns-tokens",
    tag = "dns_tokens",
    responses(
        (status = 200, description = "Linked tokens, without secrets", body = [DnsTokenResponse]),
        (status = 401, description = "Not signed in"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_dns_tokens(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Vec<DnsTokenResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tokens = DnsTokens::new(&mut conn).list(&DnsTokenFilter { user_id: user.id }).await?;

    Ok(Json(tokens.into_iter().map(Into::into).collect()))
}

/// Link a provider token. The secret is encrypted before it is stored.
#[utoipa::path(
    post,
    path = "/api/v1/dns-tokens",
    request_body = DnsTokenCreate,
    tag = "dns_tokens",
    responses(
        (status = 201, description = "Token linked", body = DnsTokenResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_dns_token(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<DnsTokenCreate>,
) -> Result<(StatusCode, Json<DnsTokenResponse>), Error> {
    let name = required(&request.name, "name")?;
    let secret = required(&request.token, "token")?;

    let encrypted = state.cipher.encrypt(secret.as_bytes()).map_err(|e| Error::Internal {
        operation: format!("encrypt provider token: {e}"),
    })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let token = DnsTokens::new(&mut conn)
        .create(&DnsTokenCreateDBRequest {
            user_id: user.id,
            name,
            encrypted,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(token.into())))
}

/// Rename a token or replace its secret
#[utoipa::path(
    patch,
    path = "/api/v1/dns-tokens/{id}",
    request_body = DnsTokenUpdate,
    tag = "dns_tokens",
    params(("id" = uuid::Uuid, Path, description = "Token ID")),
    responses(
        (status = 200, description = "Token updated", body = DnsTokenResponse),
        (status = 404, description = "Token not found"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_dns_token(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<DnsTokenId>,
    Json(request): Json<DnsTokenUpdate>,
) -> Result<Json<DnsTokenResponse>, Error> {
    let name = request.name.as_deref().map(|n| required(n, "name")).transpose()?;
    let encrypted = match request.token.as_deref() {
        Some(secret) => {
            let secret = required(secret, "token")?;
            Some(state.cipher.encrypt(secret.as_bytes()).map_err(|e| Error::Internal {
                operation: format!("encrypt provider token: {e}"),
            })?)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let token = DnsTokens::new(&mut conn)
        .update_owned(id, user.id, &DnsTokenUpdateDBRequest { name, encrypted })
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(token.into()))
}

/// Unlink a token, removing its zones, records and their API keys
#[utoipa::path(
    delete,
    path = "/api/v1/dns-tokens/{id}",
    tag = "dns_tokens",
    params(("id" = uuid::Uuid, Path, description = "Token ID")),
    responses(
        (status = 204, description = "Token deleted"),
        (status = 404, description = "Token not found"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_dns_token(State(state): State<AppState>, user: CurrentUser, Path(id): Path<DnsTokenId>) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if DnsTokens::new(&mut conn).delete_owned(id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// Reveal a token's secret to its owner
#[utoipa::path(
    get,
    path = "/api/v1/dns-tokens/{id}/secret",
    tag = "dns_tokens",
    params(("id" = uuid::Uuid, Path, description = "Token ID")),
    responses(
        (status = 200, description = "Decrypted token", body = DnsTokenSecretResponse),
        (status = 400, description = "Stored token cannot be decrypted"),
        (status = 404, description = "Token not found"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_dns_token_secret(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<DnsTokenId>,
) -> Result<Json<DnsTokenSecretResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let token = DnsTokens::new(&mut conn).get_owned(id, user.id).await?.ok_or_else(|| not_found(id))?;

    let secret = state.cipher.decrypt_to_string(&token.encrypted()).map_err(|e| {
        warn!("Stored token {} failed to decrypt: {}", id, e);
        Error::BadRequest {
            message: "The stored provider token is invalid, link it again".to_string(),
        }
    })?;

    Ok(Json(DnsTokenSecretResponse { id: token.id, token: secret }))
}
