//! # drago: backend for a dynamic DNS dashboard
//!
//! `drago` keeps a user's DNS provider tokens, mirrors of the zones and records those tokens can
//! see, and API keys that each control a single record. A small client on the user's network
//! pushes its public address to `PUT /sync` with such a key, and the controlled record follows.
//!
//! ## Request flow
//!
//! Every request first passes the redirect middleware ([`auth::middleware`]). Page routes
//! (`/dashboard`, `/device`) need a session and otherwise redirect to `/auth?redirect=...`, and
//! `/auth` redirects signed-in users onward. Page handlers then re-check their preconditions with
//! the extractors in [`auth::guards`], and render nothing themselves: they return the JSON page
//! data the frontend needs.
//!
//! The JSON API lives under `/api`:
//!
//! - `/api/auth/*`: email sign-up and sign-in, stateless JWT sessions delivered both as a cookie
//!   and a `set-auth-token` header, and the RFC 8628 device flow the CLI uses to obtain a JWT
//! - `/api/v1/*`: the credential store. Provider tokens are encrypted with AES-256-GCM before
//!   they reach the database ([`crypto`]); API keys are stored as an argon2 hash
//!
//! Handlers talk to PostgreSQL through the repositories in [`db::handlers`].
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use drago::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = drago::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     drago::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! Migrations are embedded and run on startup. They can also be applied on their own:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! drago::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{api::handlers, auth::middleware::session_redirect_middleware, config::CorsOrigin, crypto::TokenCipher, openapi::ApiDoc};
use axum::{
    Json, Router,
    http::{self, HeaderValue},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ApiKeyId, DnsTokenId, RecordId, UserId, ZoneId};

/// Shared state handed to every handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .cipher(TokenCipher::from_encoded_key(&key)?)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Encrypts provider tokens at rest
    pub cipher: TokenCipher,
}

/// Get the drago database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.security.cors.allowed_origins;
    // A wildcard entry overrides any listed origins
    let allow_origin = if allowed.contains(&CorsOrigin::Wildcard) {
        if config.auth.security.cors.allow_credentials {
            anyhow::bail!("CORS wildcard origin cannot be combined with allow_credentials");
        }
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers([http::header::LOCATION, http::HeaderName::from_static("set-auth-token")]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: page routes, the auth and credential store APIs, `PUT /sync`,
/// OpenAPI docs, and the middleware stack (session redirects, CORS, request tracing).
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let page_routes = Router::new()
        .route("/auth", get(handlers::pages::auth_page))
        .route("/dashboard", get(handlers::pages::dashboard_page))
        .route("/device", get(handlers::pages::device_page))
        .route("/device/approve", get(handlers::pages::device_approve_page));

    let auth_routes = Router::new()
        .route("/sign-up/email", post(handlers::auth::sign_up))
        .route("/sign-in/email", post(handlers::auth::sign_in))
        .route("/sign-out", post(handlers::auth::sign_out))
        .route("/get-session", get(handlers::auth::get_session))
        .route("/token", get(handlers::auth::token))
        .route("/device/code", post(handlers::device::device_code))
        .route("/device/token", post(handlers::device::device_token))
        .route("/device", get(handlers::device::device_status))
        .route("/device/approve", post(handlers::device::approve))
        .route("/device/deny", post(handlers::device::deny));

    let api_routes = Router::new()
        .route(
            "/users/current",
            get(handlers::users::get_current_user).delete(handlers::users::delete_current_user),
        )
        .route(
            "/dns-tokens",
            get(handlers::dns_tokens::list_dns_tokens).post(handlers::dns_tokens::create_dns_token),
        )
        .route(
            "/dns-tokens/{id}",
            patch(handlers::dns_tokens::update_dns_token).delete(handlers::dns_tokens::delete_dns_token),
        )
        .route("/dns-tokens/{id}/secret", get(handlers::dns_tokens::get_dns_token_secret))
        .route("/zones", get(handlers::zones::list_zones).put(handlers::zones::upsert_zone))
        .route("/zones/{zone_id}", delete(handlers::zones::delete_zone))
        .route(
            "/zones/{zone_id}/records",
            get(handlers::records::list_records).put(handlers::records::upsert_record),
        )
        .route("/records/{record_id}", delete(handlers::records::delete_record))
        .route(
            "/api-keys",
            get(handlers::api_keys::list_api_keys).post(handlers::api_keys::create_api_key),
        )
        .route("/api-keys/{id}", delete(handlers::api_keys::delete_api_key));

    let router = Router::new()
        .route("/healthz", get(handlers::pages::healthz))
        .route("/sync", put(handlers::sync::sync_record))
        .merge(page_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/v1", api_routes)
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .fallback(|| async { http::StatusCode::NOT_FOUND })
        .layer(from_fn_with_state(state.clone(), session_redirect_middleware))
        .with_state(state.clone());

    let router = router.layer(create_cors_layer(&state.config)?).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled server.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and builds the
///    router
/// 2. **Serve**: [`Application::serve`] binds the configured address and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], reusing `pool` instead of connecting when one is given.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting drago with configuration: {:#?}", config);

        let encryption_key = config
            .encryption_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("encryption_key is not configured"))?;
        let cipher = TokenCipher::from_encoded_key(encryption_key)?;

        let pool = match pool {
            Some(pool) => pool,
            None => {
                info!("Connecting to database");
                db::connect(&config.database).await?
            }
        };
        migrator().run(&pool).await?;

        let state = AppState::builder().db(pool.clone()).config(config.clone()).cipher(cipher).build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("drago listening on http://{}, dashboard at {}", bind_addr, self.config.dashboard_url);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_integration(pool: PgPool) {
        let server = create_test_app(pool).await;

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        health.assert_text("OK");

        let openapi = server.get("/api/openapi.json").await;
        openapi.assert_status_ok();
        assert!(openapi.text().contains("Drago API"));

        server.get("/api/docs").await.assert_status_ok();

        // API routes answer 401, page routes redirect
        server.get("/api/v1/dns-tokens").await.assert_status(StatusCode::UNAUTHORIZED);
        let page = server.get("/dashboard").await;
        page.assert_status(StatusCode::FOUND);
        assert_eq!(page.header("location"), "/auth?redirect=%2Fdashboard");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_dashboard_paths_still_redirect(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server.get("/dashboard/does-not-exist").await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.header("location"), "/auth?redirect=%2Fdashboard%2Fdoes-not-exist");
    }

    #[sqlx::test]
    async fn test_missing_encryption_key_fails_startup(pool: PgPool) {
        let mut config = create_test_config();
        config.encryption_key = None;

        assert!(crate::Application::new_with_pool(config, Some(pool)).await.is_err());
    }

    #[sqlx::test]
    async fn test_cors_preflight_exposes_auth_token(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server
            .method(axum::http::Method::OPTIONS, "/api/auth/sign-in/email")
            .add_header("origin", "http://localhost:5173")
            .add_header("access-control-request-method", "POST")
            .await;
        assert_eq!(response.header("access-control-allow-origin"), "http://localhost:5173");
        assert_eq!(response.header("access-control-allow-credentials"), "true");
    }

    #[sqlx::test]
    async fn test_wildcard_cors_origin_allows_any(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.security.cors.allowed_origins = vec![crate::config::CorsOrigin::Wildcard];
        assert!(crate::create_cors_layer(&config).is_err());
        config.auth.security.cors.allow_credentials = false;
        assert!(config.validate().is_ok());

        let server = crate::Application::new_with_pool(config, Some(pool))
            .await
            .unwrap()
            .into_test_server();

        let response = server
            .method(axum::http::Method::OPTIONS, "/api/auth/sign-in/email")
            .add_header("origin", "https://anywhere.example.org")
            .add_header("access-control-request-method", "POST")
            .await;
        assert_eq!(response.header("access-control-allow-origin"), "*");
    }
}
