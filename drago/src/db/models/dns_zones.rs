//! Database models for provider zone mirrors.

use crate::types::{DnsTokenId, UserId, ZoneId};
use chrono::{DateTime, Utc};

/// Insert-or-refresh request for a mirrored zone. `last_synced_at` is stamped by the database.
#[derive(Debug, Clone)]
pub struct DnsZoneUpsertDBRequest {
    pub id: ZoneId,
    pub user_id: UserId,
    pub token_id: DnsTokenId,
    pub zone_name: String,
    pub status: Option<String>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct DnsZoneFilter {
    pub user_id: UserId,
    pub token_id: Option<DnsTokenId>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DnsZoneDBResponse {
    pub id: ZoneId,
    pub user_id: UserId,
    pub token_id: DnsTokenId,
    pub zone_name: String,
    pub status: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub last_synced_at: DateTime<Utc>,
}
