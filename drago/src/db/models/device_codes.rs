//! Database models for RFC 8628 device authorization requests.

use crate::types::{DeviceCodeId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a device authorization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceCodeStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone)]
pub struct DeviceCodeCreateDBRequest {
    pub device_code_hash: String,
    pub user_code: String,
    pub client_id: String,
    pub scope: Option<String>,
    pub polling_interval_secs: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceCodeDBResponse {
    pub id: DeviceCodeId,
    pub device_code_hash: String,
    pub user_code: String,
    pub client_id: String,
    pub scope: Option<String>,
    pub status: DeviceCodeStatus,
    pub user_id: Option<UserId>,
    pub polling_interval_secs: i32,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DeviceCodeDBResponse {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
