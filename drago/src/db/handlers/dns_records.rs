//! Database repository for provider record mirrors.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::dns_records::{DnsRecordDBResponse, DnsRecordFilter, DnsRecordUpsertDBRequest},
};
use crate::types::{RecordId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

const RECORD_COLUMNS: &str = "id, user_id, zone_id, record_name, record_type, content, ttl, proxied, created_at, last_synced_at";

pub struct DnsRecords<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for DnsRecords<'c> {
    type CreateRequest = DnsRecordUpsertDBRequest;
    type Response = DnsRecordDBResponse;
    type Id = RecordId;
    type Filter = DnsRecordFilter;

    /// Insert the record or refresh the existing mirror (last write wins), never across accounts.
    #[instrument(skip(self, request), fields(record_id = %request.id, zone_id = %request.zone_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let record = sqlx::query_as::<_, DnsRecordDBResponse>(&format!(
            r#"
            INSERT INTO dns_record (id, user_id, zone_id, record_name, record_type, content, ttl, proxied, last_synced_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (id) DO UPDATE SET
                zone_id = EXCLUDED.zone_id,
                record_name = EXCLUDED.record_name,
                record_type = EXCLUDED.record_type,
                content = EXCLUDED.content,
                ttl = EXCLUDED.ttl,
                proxied = EXCLUDED.proxied,
                last_synced_at = NOW()
            WHERE dns_record.user_id = EXCLUDED.user_id
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(&request.id)
        .bind(request.user_id)
        .bind(&request.zone_id)
        .bind(&request.record_name)
        .bind(&request.record_type)
        .bind(&request.content)
        .bind(request.ttl)
        .bind(request.proxied)
        .fetch_optional(&mut *self.db)
        .await?;

        record.ok_or_else(|| DbError::ForeignOwnership {
            entity_type: "Record".to_string(),
            entity_id: request.id.clone(),
        })
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let record = sqlx::query_as::<_, DnsRecordDBResponse>(&format!("SELECT {RECORD_COLUMNS} FROM dns_record WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(record)
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let records = sqlx::query_as::<_, DnsRecordDBResponse>(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM dns_record
            WHERE user_id = $1 AND ($2::varchar IS NULL OR zone_id = $2)
            ORDER BY record_name, record_type
            "#
        ))
        .bind(filter.user_id)
        .bind(&filter.zone_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dns_record WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> DnsRecords<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_owned(&mut self, id: &str, user_id: UserId) -> Result<Option<DnsRecordDBResponse>> {
        let record = sqlx::query_as::<_, DnsRecordDBResponse>(&format!(
            "SELECT {RECORD_COLUMNS} FROM dns_record WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }

    /// Delete a record owned by `user_id`; its API key cascades.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_owned(&mut self, id: &str, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dns_record WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply a dynamic DNS push: set the record content and stamp `last_synced_at`.
    ///
    /// Returns `(record, changed)` where `changed` is false when the content was already current.
    /// The row is locked for the duration of the surrounding transaction.
    #[instrument(skip(self, content), err)]
    pub async fn sync_content(
        &mut self,
        id: &str,
        content: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<(DnsRecordDBResponse, bool)> {
        let current = sqlx::query_as::<_, DnsRecordDBResponse>(&format!(
            "SELECT {RECORD_COLUMNS} FROM dns_record WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        let changed = current.content.as_deref() != Some(content);

        let record = sqlx::query_as::<_, DnsRecordDBResponse>(&format!(
            r#"
            UPDATE dns_record SET content = $2, last_synced_at = $3
            WHERE id = $1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(content)
        .bind(synced_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok((record, changed))
    }
}
