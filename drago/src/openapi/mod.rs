//! OpenAPI documentation for the dashboard backend, rendered with Scalar at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, db};

/// Session cookie, session bearer JWT and record-scoped API key schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "session".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "drago_session",
                    "Session cookie set by sign-in and sign-up. The name is configurable.",
                ))),
            );
            components.security_schemes.insert(
                "bearer".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "The session JWT, as returned in the `set-auth-token` header, by `GET /api/auth/token` \
                            or by the device flow:\n\n```\nAuthorization: Bearer <jwt>\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "api_key".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .description(Some(
                            "A record-scoped API key created in the dashboard:\n\n```\nAuthorization: Bearer dgo_<prefix>_<secret>\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        api::handlers::pages::auth_page,
        api::handlers::pages::dashboard_page,
        api::handlers::pages::device_page,
        api::handlers::pages::device_approve_page,
        api::handlers::pages::healthz,
        api::handlers::auth::sign_up,
        api::handlers::auth::sign_in,
        api::handlers::auth::sign_out,
        api::handlers::auth::get_session,
        api::handlers::auth::token,
        api::handlers::device::device_code,
        api::handlers::device::device_token,
        api::handlers::device::device_status,
        api::handlers::device::approve,
        api::handlers::device::deny,
        api::handlers::users::get_current_user,
        api::handlers::users::delete_current_user,
        api::handlers::dns_tokens::list_dns_tokens,
        api::handlers::dns_tokens::create_dns_token,
        api::handlers::dns_tokens::update_dns_token,
        api::handlers::dns_tokens::delete_dns_token,
        api::handlers::dns_tokens::get_dns_token_secret,
        api::handlers::zones::list_zones,
        api::handlers::zones::upsert_zone,
        api::handlers::zones::delete_zone,
        api::handlers::records::list_records,
        api::handlers::records::upsert_record,
        api::handlers::records::delete_record,
        api::handlers::api_keys::list_api_keys,
        api::handlers::api_keys::create_api_key,
        api::handlers::api_keys::delete_api_key,
        api::handlers::sync::sync_record,
    ),
    components(
        schemas(
            api::models::users::CurrentUser,
            api::models::users::UserResponse,
            api::models::auth::SignUpRequest,
            api::models::auth::SignInRequest,
            api::models::auth::AuthResponse,
            api::models::auth::SessionResponse,
            api::models::auth::TokenResponse,
            api::models::auth::SignOutResponse,
            api::models::device::DeviceCodeRequest,
            api::models::device::DeviceCodeResponse,
            api::models::device::DeviceTokenRequest,
            api::models::device::DeviceTokenResponse,
            api::models::device::DeviceErrorCode,
            api::models::device::DeviceTokenError,
            api::models::device::DeviceDecisionRequest,
            api::models::device::DeviceDecisionResponse,
            api::models::device::DeviceRequestStatus,
            db::models::device_codes::DeviceCodeStatus,
            api::models::dns_tokens::DnsTokenCreate,
            api::models::dns_tokens::DnsTokenUpdate,
            api::models::dns_tokens::DnsTokenResponse,
            api::models::dns_tokens::DnsTokenSecretResponse,
            api::models::zones::ZoneUpsert,
            api::models::zones::ZoneResponse,
            api::models::zones::ZoneWithRecords,
            api::models::records::RecordUpsert,
            api::models::records::RecordResponse,
            api::models::api_keys::ApiKeyCreate,
            api::models::api_keys::ApiKeyResponse,
            api::models::api_keys::ApiKeyCreatedResponse,
            api::models::sync::SyncRequest,
            api::models::sync::SyncResponse,
            api::models::pages::AuthPageData,
            api::models::pages::DashboardPageData,
            api::models::pages::DevicePageData,
            api::models::pages::DeviceApprovePageData,
        )
    ),
    tags(
        (name = "pages", description = "Page data for the dashboard. Without a session these routes redirect to `/auth`."),
        (name = "auth", description = "Email sign-up and sign-in, sessions and JWTs."),
        (name = "device", description = "OAuth 2.0 device authorization grant (RFC 8628) for the CLI."),
        (name = "users", description = "The signed-in account."),
        (name = "dns_tokens", description = "DNS provider tokens, encrypted at rest."),
        (name = "zones", description = "Mirrors of provider zones."),
        (name = "records", description = "Mirrors of provider records."),
        (name = "api_keys", description = "API keys, each controlling a single record."),
        (name = "sync", description = "Dynamic DNS updates pushed by the client."),
        (name = "health", description = "Liveness."),
    ),
    info(
        title = "Drago API",
        version = "1.0.0",
        description = "Backend for the Drago dynamic DNS dashboard.

## Authentication

Dashboard routes use the session cookie. API clients may send the same session JWT as
`Authorization: Bearer <jwt>`. `PUT /sync` takes a record-scoped API key instead.",
    ),
)]
pub struct ApiDoc;
