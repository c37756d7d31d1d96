//! API request/response models for dynamic DNS pushes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncRequest {
    /// The client's current public address
    pub ip_address: String,
    /// When the client observed the address, in UTC
    #[schema(value_type = String, format = "date-time")]
    pub time_synced: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncResponse {
    pub success: bool,
    /// False when the record already held this address
    pub updated: bool,
    pub message: String,
}
