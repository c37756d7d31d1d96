//! Database repository for encrypted provider tokens.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::dns_tokens::{DnsTokenCreateDBRequest, DnsTokenDBResponse, DnsTokenFilter, DnsTokenUpdateDBRequest},
};
use crate::types::{DnsTokenId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

const TOKEN_COLUMNS: &str = "id, user_id, name, nonce, token_encrypted, tag, created_at, updated_at";

pub struct DnsTokens<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for DnsTokens<'c> {
    type CreateRequest = DnsTokenCreateDBRequest;
    type Response = DnsTokenDBResponse;
    type Id = DnsTokenId;
    type Filter = DnsTokenFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let token = sqlx::query_as::<_, DnsTokenDBResponse>(&format!(
            r#"
            INSERT INTO dns_token (user_id, name, nonce, token_encrypted, tag)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.encrypted.nonce)
        .bind(&request.encrypted.ciphertext)
        .bind(&request.encrypted.tag)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let token = sqlx::query_as::<_, DnsTokenDBResponse>(&format!("SELECT {TOKEN_COLUMNS} FROM dns_token WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(token)
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tokens = sqlx::query_as::<_, DnsTokenDBResponse>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM dns_token WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(filter.user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(tokens)
    }

    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dns_token WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> DnsTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fetch a token only if it belongs to `user_id`.
    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_owned(&mut self, id: DnsTokenId, user_id: UserId) -> Result<Option<DnsTokenDBResponse>> {
        let token = sqlx::query_as::<_, DnsTokenDBResponse>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM dns_token WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Delete a token owned by `user_id`. Its zones, their records and the records' API keys
    /// cascade.
    #[instrument(skip(self), fields(token_id = %abbrev_uuid(&id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_owned(&mut self, id: DnsTokenId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dns_token WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rename a token or rotate its sealed secret.
    #[instrument(skip(self, request), fields(token_id = %abbrev_uuid(&id)), err)]
    pub async fn update_owned(
        &mut self,
        id: DnsTokenId,
        user_id: UserId,
        request: &DnsTokenUpdateDBRequest,
    ) -> Result<Option<DnsTokenDBResponse>> {
        let (nonce, ciphertext, tag) = match &request.encrypted {
            Some(e) => (Some(&e.nonce), Some(&e.ciphertext), Some(&e.tag)),
            None => (None, None, None),
        };

        let token = sqlx::query_as::<_, DnsTokenDBResponse>(&format!(
            r#"
            UPDATE dns_token SET
                name = COALESCE($3, name),
                nonce = COALESCE($4, nonce),
                token_encrypted = COALESCE($5, token_encrypted),
                tag = COALESCE($6, tag),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&request.name)
        .bind(nonce)
        .bind(ciphertext)
        .bind(tag)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, test_cipher};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_store_and_decrypt_token(pool: PgPool) {
        let user = create_test_user(&pool).await;
        let cipher = test_cipher();
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = DnsTokens::new(&mut conn);

        let created = repo
            .create(&DnsTokenCreateDBRequest {
                user_id: user.id,
                name: "cloudflare".to_string(),
                encrypted: cipher.encrypt(b"provider-secret").unwrap(),
            })
            .await
            .unwrap();

        let stored = repo.get_owned(created.id, user.id).await.unwrap().unwrap();
        assert_eq!(stored.nonce.len(), 12);
        assert_eq!(stored.tag.len(), 16);
        assert_ne!(stored.token_encrypted, b"provider-secret".to_vec());
        assert_eq!(cipher.decrypt_to_string(&stored.encrypted()).unwrap(), "provider-secret");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_tokens_are_scoped_to_owner(pool: PgPool) {
        let owner = create_test_user(&pool).await;
        let other = create_test_user(&pool).await;
        let cipher = test_cipher();
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = DnsTokens::new(&mut conn);

        let token = repo
            .create(&DnsTokenCreateDBRequest {
                user_id: owner.id,
                name: "mine".to_string(),
                encrypted: cipher.encrypt(b"x").unwrap(),
            })
            .await
            .unwrap();

        assert!(repo.get_owned(token.id, other.id).await.unwrap().is_none());
        assert!(!repo.delete_owned(token.id, other.id).await.unwrap());
        assert!(repo.list(&DnsTokenFilter { user_id: other.id }).await.unwrap().is_empty());
        assert_eq!(repo.list(&DnsTokenFilter { user_id: owner.id }).await.unwrap().len(), 1);

        let renamed = repo
            .update_owned(
                token.id,
                owner.id,
                &DnsTokenUpdateDBRequest {
                    name: Some("renamed".to_string()),
                    encrypted: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "renamed");
        assert_eq!(renamed.nonce, token.nonce);

        assert!(repo.delete_owned(token.id, owner.id).await.unwrap());
    }
}
