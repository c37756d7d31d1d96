//! Database repository for record-scoped API keys.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::api_keys::{ApiKeyCreateDBRequest, ApiKeyDBResponse, ApiKeyFilter},
};
use crate::types::{ApiKeyId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

/// Keys are always read joined with the record they control.
const SELECT_API_KEY: &str = r#"
    SELECT k.id, k.user_id, k.dns_record_id, r.record_name, r.zone_id, k.name, k.prefix, k.key_hash,
           k.last_used, k.created_at, k.updated_at
    FROM api_keys k
    JOIN dns_record r ON r.id = k.dns_record_id
"#;

pub struct ApiKeys<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for ApiKeys<'c> {
    type CreateRequest = ApiKeyCreateDBRequest;
    type Response = ApiKeyDBResponse;
    type Id = ApiKeyId;
    type Filter = ApiKeyFilter;

    /// Insert a key. A second key for the same record fails `api_keys_dns_record_id_unique`.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), record_id = %request.dns_record_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: ApiKeyId = sqlx::query_scalar(
            r#"
            INSERT INTO api_keys (user_id, dns_record_id, name, prefix, key_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(request.user_id)
        .bind(&request.dns_record_id)
        .bind(&request.name)
        .bind(&request.prefix)
        .bind(&request.key_hash)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(&format!("{SELECT_API_KEY} WHERE k.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(key)
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let keys = sqlx::query_as::<_, ApiKeyDBResponse>(&format!("{SELECT_API_KEY} WHERE k.user_id = $1 ORDER BY k.created_at DESC"))
            .bind(filter.user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(keys)
    }

    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> ApiKeys<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a key by its public prefix. The caller still has to verify the secret.
    #[instrument(skip(self, prefix), err)]
    pub async fn get_by_prefix(&mut self, prefix: &str) -> Result<Option<ApiKeyDBResponse>> {
        let key = sqlx::query_as::<_, ApiKeyDBResponse>(&format!("{SELECT_API_KEY} WHERE k.prefix = $1"))
            .bind(prefix)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(key)
    }

    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_owned(&mut self, id: ApiKeyId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(key_id = %abbrev_uuid(&id)), err)]
    pub async fn touch_last_used(&mut self, id: ApiKeyId) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{DnsRecords, DnsTokens, DnsZones, Users};
    use crate::test_utils::{create_test_record, create_test_token, create_test_user, create_test_zone, test_cipher};
    use sqlx::PgPool;

    fn key_request(user_id: UserId, record_id: &str, prefix: &str) -> ApiKeyCreateDBRequest {
        ApiKeyCreateDBRequest {
            user_id,
            dns_record_id: record_id.to_string(),
            name: format!("key for {record_id}"),
            prefix: prefix.to_string(),
            key_hash: "$argon2id$fake".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_lookup_by_prefix(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let token = create_test_token(&pool, &test_cipher(), user.id).await;
        let zone = create_test_zone(&pool, user.id, token.id, "zone-1").await;
        let record = create_test_record(&pool, user.id, &zone.id, "rec-1").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiKeys::new(&mut conn);
        let key = repo.create(&key_request(user.id, &record.id, "AAAABBBBCCCC")).await.unwrap();
        assert_eq!(key.record_name, record.record_name);
        assert_eq!(key.zone_id, zone.id);
        assert!(key.last_used.is_none());

        let found = repo.get_by_prefix("AAAABBBBCCCC").await.unwrap().unwrap();
        assert_eq!(found.id, key.id);

        repo.touch_last_used(key.id).await.unwrap();
        assert!(repo.get_by_id(key.id).await.unwrap().unwrap().last_used.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_second_key_for_record_is_rejected(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let token = create_test_token(&pool, &test_cipher(), user.id).await;
        let zone = create_test_zone(&pool, user.id, token.id, "zone-1").await;
        let record = create_test_record(&pool, user.id, &zone.id, "rec-1").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ApiKeys::new(&mut conn);
        repo.create(&key_request(user.id, &record.id, "AAAABBBBCCCC")).await.unwrap();

        let err = repo.create(&key_request(user.id, &record.id, "DDDDEEEEFFFF")).await.unwrap_err();
        match err {
            DbError::UniqueViolation {
                constraint,
                conflicting_value,
                ..
            } => {
                assert_eq!(constraint.as_deref(), Some("api_keys_dns_record_id_unique"));
                assert_eq!(conflicting_value.as_deref(), Some("rec-1"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deleting_token_cascades_to_keys(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let token = create_test_token(&pool, &test_cipher(), user.id).await;
        let zone = create_test_zone(&pool, user.id, token.id, "zone-1").await;
        let record = create_test_record(&pool, user.id, &zone.id, "rec-1").await;

        let mut conn = pool.acquire().await.unwrap();
        let key = ApiKeys::new(&mut conn)
            .create(&key_request(user.id, &record.id, "AAAABBBBCCCC"))
            .await
            .unwrap();

        assert!(DnsTokens::new(&mut conn).delete_owned(token.id, user.id).await.unwrap());

        assert!(DnsZones::new(&mut conn).get_by_id(zone.id.clone()).await.unwrap().is_none());
        assert!(DnsRecords::new(&mut conn).get_by_id(record.id.clone()).await.unwrap().is_none());
        assert!(ApiKeys::new(&mut conn).get_by_id(key.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deleting_user_cascades_everything(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let bystander = create_test_user(&pool).await;
        let cipher = test_cipher();

        let token = create_test_token(&pool, &cipher, user.id).await;
        let zone = create_test_zone(&pool, user.id, token.id, "zone-1").await;
        let record = create_test_record(&pool, user.id, &zone.id, "rec-1").await;

        let other_token = create_test_token(&pool, &cipher, bystander.id).await;
        let other_zone = create_test_zone(&pool, bystander.id, other_token.id, "zone-2").await;
        create_test_record(&pool, bystander.id, &other_zone.id, "rec-2").await;

        let mut conn = pool.acquire().await.unwrap();
        ApiKeys::new(&mut conn)
            .create(&key_request(user.id, &record.id, "AAAABBBBCCCC"))
            .await
            .unwrap();

        assert!(Users::new(&mut conn).delete(user.id).await.unwrap());

        for (table, owner) in [
            ("dns_token", user.id),
            ("dns_zone", user.id),
            ("dns_record", user.id),
            ("api_keys", user.id),
        ] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = $1"))
                .bind(owner)
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} rows survived user deletion");
        }

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dns_record WHERE user_id = $1")
            .bind(bystander.id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
