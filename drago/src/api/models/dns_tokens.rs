//! API request/response models for linked provider tokens.

use crate::db::models::dns_tokens::DnsTokenDBResponse;
use crate::types::DnsTokenId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DnsTokenCreate {
    pub name: String,
    /// The provider API token in plaintext. Encrypted before it is stored.
    pub token: String,
}

/// Token metadata. The secret is never part of this shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DnsTokenResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DnsTokenId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DnsTokenDBResponse> for DnsTokenResponse {
    fn from(db: DnsTokenDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DnsTokenSecretResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DnsTokenId,
    pub token: String,
}

/// Rename a token or replace its secret. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DnsTokenUpdate {
    pub name: Option<String>,
    pub token: Option<String>,
}
