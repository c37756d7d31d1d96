//! Database repository for provider zone mirrors.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::dns_zones::{DnsZoneDBResponse, DnsZoneFilter, DnsZoneUpsertDBRequest},
};
use crate::types::{UserId, ZoneId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

const ZONE_COLUMNS: &str = "id, user_id, token_id, zone_name, status, meta, last_synced_at";

pub struct DnsZones<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for DnsZones<'c> {
    type CreateRequest = DnsZoneUpsertDBRequest;
    type Response = DnsZoneDBResponse;
    type Id = ZoneId;
    type Filter = DnsZoneFilter;

    /// Insert the zone or refresh the existing mirror (last write wins).
    ///
    /// The conflict update only applies when the existing row belongs to the same user; a zone id
    /// mirrored by another account yields [`DbError::ForeignOwnership`].
    #[instrument(skip(self, request), fields(zone_id = %request.id, user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let zone = sqlx::query_as::<_, DnsZoneDBResponse>(&format!(
            r#"
            INSERT INTO dns_zone (id, user_id, token_id, zone_name, status, meta, last_synced_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO UPDATE SET
                token_id = EXCLUDED.token_id,
                zone_name = EXCLUDED.zone_name,
                status = EXCLUDED.status,
                meta = EXCLUDED.meta,
                last_synced_at = NOW()
            WHERE dns_zone.user_id = EXCLUDED.user_id
            RETURNING {ZONE_COLUMNS}
            "#
        ))
        .bind(&request.id)
        .bind(request.user_id)
        .bind(request.token_id)
        .bind(&request.zone_name)
        .bind(&request.status)
        .bind(&request.meta)
        .fetch_optional(&mut *self.db)
        .await?;

        zone.ok_or_else(|| DbError::ForeignOwnership {
            entity_type: "Zone".to_string(),
            entity_id: request.id.clone(),
        })
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let zone = sqlx::query_as::<_, DnsZoneDBResponse>(&format!("SELECT {ZONE_COLUMNS} FROM dns_zone WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(zone)
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let zones = sqlx::query_as::<_, DnsZoneDBResponse>(&format!(
            r#"
            SELECT {ZONE_COLUMNS} FROM dns_zone
            WHERE user_id = $1 AND ($2::uuid IS NULL OR token_id = $2)
            ORDER BY zone_name
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.token_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(zones)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dns_zone WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> DnsZones<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_owned(&mut self, id: &str, user_id: UserId) -> Result<Option<DnsZoneDBResponse>> {
        let zone = sqlx::query_as::<_, DnsZoneDBResponse>(&format!(
            "SELECT {ZONE_COLUMNS} FROM dns_zone WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(zone)
    }

    /// Delete a zone owned by `user_id`; its records and their API keys cascade.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_owned(&mut self, id: &str, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dns_zone WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
