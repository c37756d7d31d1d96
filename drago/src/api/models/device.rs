//! API request/response models for the RFC 8628 device authorization grant.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::device_codes::{DeviceCodeDBResponse, DeviceCodeStatus};

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Form body of `POST /api/auth/device/code`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeviceCodeRequest {
    pub client_id: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    /// Formatted as `XXXX-XXXX`
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: String,
    /// Seconds until the codes expire
    pub expires_in: i64,
    /// Minimum seconds between token polls
    pub interval: i64,
}

/// Form body of `POST /api/auth/device/token`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeviceTokenRequest {
    pub grant_type: String,
    pub device_code: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// RFC 8628 section 3.5 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceErrorCode {
    AuthorizationPending,
    SlowDown,
    AccessDenied,
    ExpiredToken,
    InvalidGrant,
    InvalidRequest,
    InvalidClient,
    UnsupportedGrantType,
}

/// Error body of the token endpoint. Always sent with 400.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceTokenError {
    pub error: DeviceErrorCode,
    pub error_description: String,
}

impl DeviceTokenError {
    pub fn new(error: DeviceErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: description.into(),
        }
    }
}

impl IntoResponse for DeviceTokenError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct UserCodeQuery {
    pub user_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeviceDecisionRequest {
    pub user_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceDecisionResponse {
    pub success: bool,
}

/// What a signed-in user is asked to approve.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceRequestStatus {
    pub user_code: String,
    pub client_id: String,
    pub scope: Option<String>,
    pub status: DeviceCodeStatus,
    pub expires_at: DateTime<Utc>,
}

impl From<DeviceCodeDBResponse> for DeviceRequestStatus {
    fn from(db: DeviceCodeDBResponse) -> Self {
        Self {
            user_code: crate::auth::device::format_user_code(&db.user_code),
            client_id: db.client_id,
            scope: db.scope,
            status: db.status,
            expires_at: db.expires_at,
        }
    }
}
