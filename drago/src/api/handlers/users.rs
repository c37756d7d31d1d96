use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    api::models::users::{CurrentUser, UserResponse},
    auth::session,
    db::handlers::{Repository, Users},
    errors::Error,
};

/// Get the signed-in user
#[utoipa::path(
    get,
    path = "/api/v1/users/current",
    tag = "users",
    responses(
        (status = 200, description = "The signed-in user", body = UserResponse),
        (status = 401, description = "Not signed in"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: user.id.to_string(),
    })?;

    Ok(Json(user.into()))
}

/// Delete the signed-in account and everything it owns
#[utoipa::path(
    delete,
    path = "/api/v1/users/current",
    tag = "users",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Not signed in"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_current_user(State(state): State<AppState>, user: CurrentUser) -> Result<Response, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    // Tokens, zones, records, API keys and device requests cascade
    if !Users::new(&mut conn).delete(user.id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user.id.to_string(),
        });
    }
    tracing::info!("Deleted account {}", user.id);

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Ok(cookie) = HeaderValue::from_str(&session::clear_session_cookie(&state.config)) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::UserResponse;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_current_user(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool).await;
        let (name, value) = session_cookie_header(&user);

        let me: UserResponse = app.get("/api/v1/users/current").add_header(name, value).await.json();
        assert_eq!(me.id, user.id);
        assert_eq!(me.email, user.email);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_account_cascades_and_ends_session(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        create_api_key_for_record(&pool, fixture.user.id, &fixture.record.id).await;
        let (name, value) = session_cookie_header(&fixture.user);

        let response = app.delete("/api/v1/users/current").add_header(name.clone(), value.clone()).await;
        response.assert_status(StatusCode::NO_CONTENT);
        assert!(response.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));

        for table in ["dns_token", "dns_zone", "dns_record", "api_keys"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = $1"))
                .bind(fixture.user.id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table}");
        }

        // The JWT still verifies but the account is gone
        app.get("/api/v1/users/current")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
