use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, SessionEstablished, SessionResponse, SignInRequest, SignOutResponse, SignUpRequest, TokenResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{
        current_user::{Session, resolve_session},
        password::{self, Argon2Params},
        session,
    },
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::Error,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn ensure_native_auth(state: &AppState) -> Result<(), Error> {
    if state.config.auth.native.enabled {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "Email and password authentication is disabled".to_string(),
        })
    }
}

fn establish_session(state: &AppState, status: StatusCode, user: UserResponse) -> Result<SessionEstablished, Error> {
    let current_user: CurrentUser = user.clone().into();
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session::create_session_cookie(&token, &state.config);

    Ok(SessionEstablished {
        status,
        body: AuthResponse { user, token },
        cookie,
    })
}

/// Register with email and password, signing the new user in
#[utoipa::path(
    post,
    path = "/api/auth/sign-up/email",
    request_body = SignUpRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered and signed in", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Registration is disabled"),
        (status = 409, description = "An account with this email already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sign_up(State(state): State<AppState>, Json(request): Json<SignUpRequest>) -> Result<SessionEstablished, Error> {
    ensure_native_auth(&state)?;

    if !state.config.auth.native.allow_registration {
        return Err(Error::InsufficientPermissions {
            action: "register new accounts".to_string(),
        });
    }

    let name = request.name.trim().to_string();
    let email = request.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Name is required".to_string(),
        });
    }
    if !email.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email address is required".to_string(),
        });
    }
    password::validate_password(&request.password, &state.config.auth.native.password)?;

    // Hash the password on a blocking thread to avoid blocking async runtime
    let params = Argon2Params::from(&state.config.auth.native.password);
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string_with_params(&password, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    // A duplicate email surfaces as a unique violation (409)
    let created = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name,
            email,
            image: request.image,
            password_hash: Some(password_hash),
        })
        .await?;

    tracing::info!("Registered user {}", created.id);
    establish_session(&state, StatusCode::CREATED, created.into())
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/sign-in/email",
    request_body = SignInRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sign_in(State(state): State<AppState>, Json(request): Json<SignInRequest>) -> Result<SessionEstablished, Error> {
    ensure_native_auth(&state)?;
    let invalid = || Error::Unauthenticated {
        message: Some(INVALID_CREDENTIALS.to_string()),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_user_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid)?;
    drop(conn);

    let hash = user.password_hash.clone().ok_or_else(invalid)?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let password = request.password;
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(invalid());
    }

    establish_session(&state, StatusCode::OK, user.into())
}

/// Sign out by expiring the session cookie
#[utoipa::path(
    post,
    path = "/api/auth/sign-out",
    tag = "authentication",
    responses(
        (status = 200, description = "Signed out", body = SignOutResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sign_out(State(state): State<AppState>) -> Response {
    let cookie = session::clear_session_cookie(&state.config);
    let mut response = Json(SignOutResponse { success: true }).into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

/// The current session, or `null` when there is none
#[utoipa::path(
    get,
    path = "/api/auth/get-session",
    tag = "authentication",
    responses(
        (status = 200, description = "The current session, or null when signed out", body = SessionResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_session(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Result<Json<Option<SessionResponse>>, Error> {
    let session = resolve_session(&headers, &state).await?;

    Ok(Json(session.map(|session| SessionResponse {
        user: session.user,
        expires_at: session.expires_at,
    })))
}

/// Issue a fresh JWT for the current session
#[utoipa::path(
    get,
    path = "/api/auth/token",
    tag = "authentication",
    responses(
        (status = 200, description = "A fresh session JWT", body = TokenResponse),
        (status = 401, description = "Not signed in"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn token(State(state): State<AppState>, session: Session) -> Result<Json<TokenResponse>, Error> {
    let token = session::create_session_token(&session.user, &state.config)?;
    Ok(Json(TokenResponse { token }))
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::{AuthResponse, SET_AUTH_TOKEN_HEADER, SessionResponse, TokenResponse};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_sign_up_sets_cookie_and_token_header(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app
            .post("/api/auth/sign-up/email")
            .json(&json!({
                "name": "Ada",
                "email": "Ada@Example.com",
                "password": "long-enough-password"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let cookie = response.header("set-cookie");
        let cookie = cookie.to_str().unwrap();
        let header_token = response.header(SET_AUTH_TOKEN_HEADER);
        let body: AuthResponse = response.json();

        assert_eq!(body.user.email, "ada@example.com");
        assert!(cookie.starts_with(&format!("drago_session={}", body.token)));
        assert!(cookie.contains("HttpOnly"));
        assert_eq!(header_token.to_str().unwrap(), body.token);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sign_up_rejects_duplicate_email_and_short_password(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool).await;

        let response = app
            .post("/api/auth/sign-up/email")
            .json(&json!({ "name": "Again", "email": user.email.to_uppercase(), "password": "long-enough-password" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let response = app
            .post("/api/auth/sign-up/email")
            .json(&json!({ "name": "Shorty", "email": "short@example.com", "password": "short" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sign_in_and_generic_failure(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool).await;

        let response = app
            .post("/api/auth/sign-in/email")
            .json(&json!({ "email": user.email, "password": TEST_PASSWORD }))
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.id, user.id);

        let wrong_password = app
            .post("/api/auth/sign-in/email")
            .json(&json!({ "email": user.email, "password": "not-the-password" }))
            .await;
        let unknown_email = app
            .post("/api/auth/sign-in/email")
            .json(&json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }))
            .await;

        wrong_password.assert_status(StatusCode::UNAUTHORIZED);
        unknown_email.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.text(), unknown_email.text());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_session_bearer_and_token(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let anonymous = app.get("/api/auth/get-session").await;
        anonymous.assert_status_ok();
        assert_eq!(anonymous.text(), "null");

        let user = create_test_user(&pool).await;
        let signed_in: AuthResponse = app
            .post("/api/auth/sign-in/email")
            .json(&json!({ "email": user.email, "password": TEST_PASSWORD }))
            .await
            .json();

        let session: SessionResponse = app
            .get("/api/auth/get-session")
            .add_header("authorization", format!("Bearer {}", signed_in.token))
            .await
            .json();
        assert_eq!(session.user.id, user.id);

        let (name, value) = session_cookie_header(&user);
        let fresh: TokenResponse = app.get("/api/auth/token").add_header(name, value).await.json();
        let session: SessionResponse = app
            .get("/api/auth/get-session")
            .add_header("authorization", format!("Bearer {}", fresh.token))
            .await
            .json();
        assert_eq!(session.user.email, user.email);

        app.get("/api/auth/token").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sign_out_expires_cookie(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.post("/api/auth/sign-out").await;
        response.assert_status_ok();
        let cookie = response.header("set-cookie");
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("drago_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
