//! Shared fixtures for the test suites.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{
        password::{self, Argon2Params},
        session,
    },
    config::{Config, NativeAuthConfig, PasswordConfig, SessionConfig},
    crypto::{self, TokenCipher},
    db::{
        handlers::{ApiKeys, DnsRecords, DnsTokens, DnsZones, Repository, Users},
        models::{
            api_keys::{ApiKeyCreateDBRequest, ApiKeyDBResponse},
            dns_records::{DnsRecordDBResponse, DnsRecordUpsertDBRequest},
            dns_tokens::{DnsTokenCreateDBRequest, DnsTokenDBResponse},
            dns_zones::{DnsZoneDBResponse, DnsZoneUpsertDBRequest},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    types::{DnsTokenId, UserId},
};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

pub const TEST_ENCRYPTION_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        encryption_key: Some(TEST_ENCRYPTION_KEY_HEX.to_string()),
        dashboard_url: "https://dash.test".parse().expect("valid test url"),
        port: 0,
        auth: crate::config::AuthConfig {
            native: NativeAuthConfig {
                enabled: true,
                allow_registration: true,
                password: PasswordConfig {
                    // Cheap hashing keeps the suite fast
                    argon2_memory_kib: 128,
                    argon2_iterations: 1,
                    argon2_parallelism: 1,
                    ..Default::default()
                },
                session: SessionConfig {
                    cookie_secure: false,
                    ..Default::default()
                },
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn test_cipher() -> TokenCipher {
    TokenCipher::from_encoded_key(TEST_ENCRYPTION_KEY_HEX).expect("valid test key")
}

pub fn create_test_app_state(pool: PgPool) -> AppState {
    AppState::builder().db(pool).config(create_test_config()).cipher(test_cipher()).build()
}

fn fast_params() -> Option<Argon2Params> {
    Some(Argon2Params::from(&create_test_config().auth.native.password))
}

/// Create a user with a unique email and [`TEST_PASSWORD`] as password.
pub async fn create_test_user(pool: &PgPool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, fast_params()).expect("Failed to hash password");

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name: format!("Test User {}", &suffix[..8]),
            email: format!("user-{suffix}@example.com"),
            image: None,
            password_hash: Some(password_hash),
        })
        .await
        .expect("Failed to create test user")
}

/// `(header name, header value)` carrying a session cookie for `user`.
pub fn session_cookie_header(user: &UserDBResponse) -> (String, String) {
    let config = create_test_config();
    let current: CurrentUser = user.clone().into();
    let token = session::create_session_token(&current, &config).expect("Failed to create session token");
    ("cookie".to_string(), format!("{}={token}", config.auth.native.session.cookie_name))
}

pub async fn create_test_token(pool: &PgPool, cipher: &TokenCipher, user_id: UserId) -> DnsTokenDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let encrypted = cipher.encrypt(b"provider-api-token").expect("Failed to encrypt token");

    DnsTokens::new(&mut conn)
        .create(&DnsTokenCreateDBRequest {
            user_id,
            name: "Test provider token".to_string(),
            encrypted,
        })
        .await
        .expect("Failed to create test token")
}

pub async fn create_test_zone(pool: &PgPool, user_id: UserId, token_id: DnsTokenId, zone_id: &str) -> DnsZoneDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    DnsZones::new(&mut conn)
        .create(&DnsZoneUpsertDBRequest {
            id: zone_id.to_string(),
            user_id,
            token_id,
            zone_name: format!("{zone_id}.example.com"),
            status: Some("active".to_string()),
            meta: None,
        })
        .await
        .expect("Failed to create test zone")
}

pub async fn create_test_record(pool: &PgPool, user_id: UserId, zone_id: &str, record_id: &str) -> DnsRecordDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    DnsRecords::new(&mut conn)
        .create(&DnsRecordUpsertDBRequest {
            id: record_id.to_string(),
            user_id,
            zone_id: zone_id.to_string(),
            record_name: format!("{record_id}.{zone_id}.example.com"),
            record_type: "A".to_string(),
            content: Some("192.0.2.1".to_string()),
            ttl: 1,
            proxied: false,
        })
        .await
        .expect("Failed to create test record")
}

/// A user with one linked token, one zone and one A record.
#[derive(Debug, Clone)]
pub struct TestFixture {
    pub user: UserDBResponse,
    pub token: DnsTokenDBResponse,
    pub zone: DnsZoneDBResponse,
    pub record: DnsRecordDBResponse,
}

pub async fn create_test_fixture(pool: &PgPool, cipher: &TokenCipher) -> TestFixture {
    let user = create_test_user(pool).await;
    let token = create_test_token(pool, cipher, user.id).await;
    let zone_id = format!("zone-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let zone = create_test_zone(pool, user.id, token.id, &zone_id).await;
    let record_id = format!("rec-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let record = create_test_record(pool, user.id, &zone.id, &record_id).await;

    TestFixture { user, token, zone, record }
}

/// Issue an API key for `record_id`, returning the full key and the stored row.
pub async fn create_api_key_for_record(pool: &PgPool, user_id: UserId, record_id: &str) -> (String, ApiKeyDBResponse) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let generated = crypto::generate_api_key();
    let key_hash = password::hash_string_with_params(&generated.secret, fast_params()).expect("Failed to hash key");

    let key = ApiKeys::new(&mut conn)
        .create(&ApiKeyCreateDBRequest {
            user_id,
            dns_record_id: record_id.to_string(),
            name: "Test key".to_string(),
            prefix: generated.prefix.clone(),
            key_hash,
        })
        .await
        .expect("Failed to create test API key");

    (generated.full, key)
}
