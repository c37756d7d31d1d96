//! Database models for encrypted provider tokens.

use crate::crypto::EncryptedToken;
use crate::types::{DnsTokenId, UserId};
use chrono::{DateTime, Utc};

/// Database request for storing a newly linked token. The plaintext never reaches this layer.
#[derive(Debug, Clone)]
pub struct DnsTokenCreateDBRequest {
    pub user_id: UserId,
    pub name: String,
    pub encrypted: EncryptedToken,
}

#[derive(Debug, Clone, Default)]
pub struct DnsTokenUpdateDBRequest {
    pub name: Option<String>,
    pub encrypted: Option<EncryptedToken>,
}

#[derive(Debug, Clone)]
pub struct DnsTokenFilter {
    pub user_id: UserId,
}

/// A `dns_token` row, including the sealed secret parts.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DnsTokenDBResponse {
    pub id: DnsTokenId,
    pub user_id: UserId,
    pub name: String,
    pub nonce: Vec<u8>,
    pub token_encrypted: Vec<u8>,
    pub tag: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DnsTokenDBResponse {
    pub fn encrypted(&self) -> EncryptedToken {
        EncryptedToken {
            nonce: self.nonce.clone(),
            ciphertext: self.token_encrypted.clone(),
            tag: self.tag.clone(),
        }
    }
}
