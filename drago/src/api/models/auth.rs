//! API request/response models for email/password sessions.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::{CurrentUser, UserResponse};

/// Header that mirrors the session cookie for clients that cannot read cookies.
pub const SET_AUTH_TOKEN_HEADER: &str = "set-auth-token";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    /// The session JWT, also set as a cookie and in the `set-auth-token` header
    pub token: String,
}

/// An [`AuthResponse`] together with the cookie and header that establish the session.
#[derive(Debug)]
pub struct SessionEstablished {
    pub status: StatusCode,
    pub body: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for SessionEstablished {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(&self.body)).into_response();
        let headers = response.headers_mut();
        if let Ok(cookie) = HeaderValue::from_str(&self.cookie) {
            headers.insert(header::SET_COOKIE, cookie);
        }
        if let Ok(token) = HeaderValue::from_str(&self.body.token) {
            headers.insert(SET_AUTH_TOKEN_HEADER, token);
        }
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(SET_AUTH_TOKEN_HEADER),
        );
        response
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user: CurrentUser,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignOutResponse {
    pub success: bool,
}
