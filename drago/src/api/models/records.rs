//! API request/response models for record mirrors.

use crate::db::models::dns_records::DnsRecordDBResponse;
use crate::types::{RecordId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_ttl() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecordUpsert {
    /// Provider record id
    pub id: RecordId,
    pub record_name: String,
    pub record_type: String,
    pub content: Option<String>,
    /// 1 means "automatic" at most providers
    #[serde(default = "default_ttl")]
    pub ttl: i32,
    #[serde(default)]
    pub proxied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordResponse {
    pub id: RecordId,
    pub zone_id: ZoneId,
    pub record_name: String,
    pub record_type: String,
    pub content: Option<String>,
    pub ttl: i32,
    pub proxied: bool,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl From<DnsRecordDBResponse> for RecordResponse {
    fn from(db: DnsRecordDBResponse) -> Self {
        Self {
            id: db.id,
            zone_id: db.zone_id,
            record_name: db.record_name,
            record_type: db.record_type,
            content: db.content,
            ttl: db.ttl,
            proxied: db.proxied,
            created_at: db.created_at,
            last_synced_at: db.last_synced_at,
        }
    }
}
