//! API request/response models for zone mirrors.

use crate::api::models::records::RecordResponse;
use crate::db::models::dns_zones::DnsZoneDBResponse;
use crate::types::{DnsTokenId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ZoneUpsert {
    /// Provider zone id
    pub id: ZoneId,
    #[schema(value_type = String, format = "uuid")]
    pub token_id: DnsTokenId,
    pub zone_name: String,
    pub status: Option<String>,
    /// Opaque provider metadata
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ZoneResponse {
    pub id: ZoneId,
    #[schema(value_type = String, format = "uuid")]
    pub token_id: DnsTokenId,
    pub zone_name: String,
    pub status: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub last_synced_at: DateTime<Utc>,
}

impl From<DnsZoneDBResponse> for ZoneResponse {
    fn from(db: DnsZoneDBResponse) -> Self {
        Self {
            id: db.id,
            token_id: db.token_id,
            zone_name: db.zone_name,
            status: db.status,
            meta: db.meta,
            last_synced_at: db.last_synced_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ZoneWithRecords {
    pub zone: ZoneResponse,
    pub records: Vec<RecordResponse>,
}
