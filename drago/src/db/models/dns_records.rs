//! Database models for provider record mirrors.

use crate::types::{RecordId, UserId, ZoneId};
use chrono::{DateTime, Utc};

/// Insert-or-refresh request for a mirrored record.
#[derive(Debug, Clone)]
pub struct DnsRecordUpsertDBRequest {
    pub id: RecordId,
    pub user_id: UserId,
    pub zone_id: ZoneId,
    pub record_name: String,
    pub record_type: String,
    pub content: Option<String>,
    pub ttl: i32,
    pub proxied: bool,
}

#[derive(Debug, Clone)]
pub struct DnsRecordFilter {
    pub user_id: UserId,
    pub zone_id: Option<ZoneId>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DnsRecordDBResponse {
    pub id: RecordId,
    pub user_id: UserId,
    pub zone_id: ZoneId,
    pub record_name: String,
    pub record_type: String,
    pub content: Option<String>,
    pub ttl: i32,
    pub proxied: bool,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}
