//! Database repository for RFC 8628 device authorization requests.

use crate::db::{
    errors::Result,
    models::device_codes::{DeviceCodeCreateDBRequest, DeviceCodeDBResponse, DeviceCodeStatus},
};
use crate::types::{DeviceCodeId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

const DEVICE_CODE_COLUMNS: &str = "id, device_code_hash, user_code, client_id, scope, status, user_id, \
     polling_interval_secs, last_polled_at, expires_at, created_at";

pub struct DeviceCodes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> DeviceCodes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(client_id = %request.client_id), err)]
    pub async fn create(&mut self, request: &DeviceCodeCreateDBRequest) -> Result<DeviceCodeDBResponse> {
        let code = sqlx::query_as::<_, DeviceCodeDBResponse>(&format!(
            r#"
            INSERT INTO device_codes (device_code_hash, user_code, client_id, scope, polling_interval_secs, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DEVICE_CODE_COLUMNS}
            "#
        ))
        .bind(&request.device_code_hash)
        .bind(&request.user_code)
        .bind(&request.client_id)
        .bind(&request.scope)
        .bind(request.polling_interval_secs)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(code)
    }

    /// Fetch by device code hash, locking the row so concurrent polls serialize.
    #[instrument(skip(self, device_code_hash), err)]
    pub async fn get_by_device_code_hash_for_update(&mut self, device_code_hash: &str) -> Result<Option<DeviceCodeDBResponse>> {
        let code = sqlx::query_as::<_, DeviceCodeDBResponse>(&format!(
            "SELECT {DEVICE_CODE_COLUMNS} FROM device_codes WHERE device_code_hash = $1 FOR UPDATE"
        ))
        .bind(device_code_hash)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(code)
    }

    /// Fetch by normalized user code.
    #[instrument(skip(self), err)]
    pub async fn get_by_user_code(&mut self, user_code: &str) -> Result<Option<DeviceCodeDBResponse>> {
        let code = sqlx::query_as::<_, DeviceCodeDBResponse>(&format!(
            "SELECT {DEVICE_CODE_COLUMNS} FROM device_codes WHERE user_code = $1"
        ))
        .bind(user_code)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(code)
    }

    /// Stamp a poll. When `interval_secs` is given the polling interval is raised to it.
    #[instrument(skip(self), fields(device_code_id = %abbrev_uuid(&id)), err)]
    pub async fn record_poll(&mut self, id: DeviceCodeId, polled_at: DateTime<Utc>, interval_secs: Option<i32>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE device_codes
            SET last_polled_at = $2, polling_interval_secs = COALESCE($3, polling_interval_secs)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(polled_at)
        .bind(interval_secs)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Resolve a pending, unexpired request as approved or denied by `user_id`.
    ///
    /// Returns `None` when the code is unknown, expired, or already resolved.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn resolve(
        &mut self,
        user_code: &str,
        status: DeviceCodeStatus,
        user_id: UserId,
    ) -> Result<Option<DeviceCodeDBResponse>> {
        let code = sqlx::query_as::<_, DeviceCodeDBResponse>(&format!(
            r#"
            UPDATE device_codes SET status = $2, user_id = $3
            WHERE user_code = $1 AND status = 'pending' AND expires_at > NOW()
            RETURNING {DEVICE_CODE_COLUMNS}
            "#
        ))
        .bind(user_code)
        .bind(status)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(code)
    }

    /// Consume a request once the client has seen its final outcome.
    #[instrument(skip(self), fields(device_code_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: DeviceCodeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM device_codes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove requests that expired before `before`.
    #[instrument(skip(self), err)]
    pub async fn delete_expired(&mut self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM device_codes WHERE expires_at <= $1")
            .bind(before)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
