use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        api_keys::{ApiKeyCreate, ApiKeyCreatedResponse, ApiKeyResponse},
        users::CurrentUser,
    },
    auth::password::{self, Argon2Params},
    crypto,
    db::{
        handlers::{ApiKeys, DnsRecords, Repository},
        models::api_keys::{ApiKeyCreateDBRequest, ApiKeyFilter},
    },
    errors::Error,
    types::ApiKeyId,
};

/// List API keys
#[utoipa::path(
    get,
    path = "/api/v1/api-keys",
    tag = "api_keys",
    responses(
        (status = 200, description = "API keys with the record each controls", body = [ApiKeyResponse]),
        (status = 401, description = "Not signed in"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_api_keys(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Vec<ApiKeyResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let keys = ApiKeys::new(&mut conn).list(&ApiKeyFilter { user_id: user.id }).await?;

    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// Create an API key controlling one DNS record
///
/// The full key is only returned here. A record can have at most one key.
#[utoipa::path(
    post,
    path = "/api/v1/api-keys",
    request_body = ApiKeyCreate,
    tag = "api_keys",
    responses(
        (status = 201, description = "API key created", body = ApiKeyCreatedResponse),
        (status = 404, description = "Record not found"),
        (status = 409, description = "The record already has an API key"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all, fields(record_id = %request.record_id))]
pub async fn create_api_key(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ApiKeyCreate>,
) -> Result<(StatusCode, Json<ApiKeyCreatedResponse>), Error> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "name must not be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if DnsRecords::new(&mut conn).get_owned(&request.record_id, user.id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Record".to_string(),
            id: request.record_id,
        });
    }

    let generated = crypto::generate_api_key();

    // Hash the secret on a blocking thread to avoid blocking async runtime
    let params = Argon2Params::from(&state.config.auth.native.password);
    let secret = generated.secret.clone();
    let key_hash = tokio::task::spawn_blocking(move || password::hash_string_with_params(&secret, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn API key hashing task: {e}"),
        })??;

    // A second key for the record fails api_keys_dns_record_id_unique (409)
    let key = ApiKeys::new(&mut conn)
        .create(&ApiKeyCreateDBRequest {
            user_id: user.id,
            dns_record_id: request.record_id,
            name,
            prefix: generated.prefix,
            key_hash,
        })
        .await?;

    tracing::info!("Created API key {} for record {}", key.id, key.dns_record_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreatedResponse {
            api_key: key.into(),
            key: generated.full,
        }),
    ))
}

/// Revoke an API key
#[utoipa::path(
    delete,
    path = "/api/v1/api-keys/{id}",
    tag = "api_keys",
    params(("id" = uuid::Uuid, Path, description = "API key ID")),
    responses(
        (status = 204, description = "API key deleted"),
        (status = 404, description = "API key not found"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_api_key(State(state): State<AppState>, user: CurrentUser, Path(id): Path<ApiKeyId>) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if ApiKeys::new(&mut conn).delete_owned(id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "API key".to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::api_keys::{ApiKeyCreatedResponse, ApiKeyResponse};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_api_key_returns_full_key_once(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let (name, value) = session_cookie_header(&fixture.user);

        let response = app
            .post("/api/v1/api-keys")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "name": "home router", "record_id": fixture.record.id }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: ApiKeyCreatedResponse = response.json();
        assert!(created.key.starts_with(&format!("dgo_{}_", created.api_key.prefix)));
        assert_eq!(created.api_key.record_name, fixture.record.record_name);

        let listed = app.get("/api/v1/api-keys").add_header(name, value).await;
        assert!(!listed.text().contains(&created.key));
        let listed: Vec<ApiKeyResponse> = listed.json();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record_id, fixture.record.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_second_key_for_record_conflicts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let (name, value) = session_cookie_header(&fixture.user);
        let body = json!({ "name": "key", "record_id": fixture.record.id });

        app.post("/api/v1/api-keys")
            .add_header(name.clone(), value.clone())
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);

        let response = app.post("/api/v1/api-keys").add_header(name, value).json(&body).await;
        response.assert_status(StatusCode::CONFLICT);
        let error: serde_json::Value = response.json();
        assert_eq!(error["resource"], "api_key");
        assert_eq!(error["conflicting_value"], fixture.record.id.as_str());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_create_key_for_foreign_record(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let other = create_test_user(&pool).await;
        let (name, value) = session_cookie_header(&other);

        app.post("/api/v1/api-keys")
            .add_header(name, value)
            .json(&json!({ "name": "stolen", "record_id": fixture.record.id }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_api_key(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let (_, key) = create_api_key_for_record(&pool, fixture.user.id, &fixture.record.id).await;
        let (name, value) = session_cookie_header(&fixture.user);

        app.delete(&format!("/api/v1/api-keys/{}", key.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/api/v1/api-keys/{}", key.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
