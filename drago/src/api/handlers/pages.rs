//! Page-load data for the dashboard routes.
//!
//! Each route takes its guards as extractors, so a missing session or query parameter turns into a
//! redirect before the handler runs. The handlers only gather the JSON the frontend renders.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::{
        handlers::zones::zones_with_records,
        models::pages::{AuthPageData, DashboardPageData, DeviceApprovePageData, DevicePageData},
    },
    auth::{
        guards::{RedirectIfAuthenticated, RequireSession, RequiredUserCode},
        middleware::LANDING_PATH,
    },
    db::{
        handlers::{ApiKeys, DeviceCodes, DnsTokens, Repository},
        models::{api_keys::ApiKeyFilter, device_codes::DeviceCodeStatus, dns_tokens::DnsTokenFilter},
    },
    errors::Error,
};

/// Sign-in page
#[utoipa::path(
    get,
    path = "/auth",
    tag = "pages",
    params(
        ("redirect" = Option<String>, Query, description = "Relative path to return to after sign-in"),
        ("redirect_url" = Option<String>, Query, description = "Alias of `redirect`"),
    ),
    responses(
        (status = 200, description = "Sign-in page data", body = AuthPageData),
        (status = 302, description = "Already signed in"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn auth_page(guard: RedirectIfAuthenticated) -> Json<AuthPageData> {
    Json(AuthPageData {
        redirect_url: guard.redirect_url.unwrap_or_else(|| LANDING_PATH.to_string()),
    })
}

/// Dashboard page
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "pages",
    responses(
        (status = 200, description = "Everything the signed-in user owns", body = DashboardPageData),
        (status = 302, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn dashboard_page(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
) -> Result<Json<DashboardPageData>, Error> {
    let user_id = session.user.id;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let tokens = DnsTokens::new(&mut conn).list(&DnsTokenFilter { user_id }).await?;
    let zones = zones_with_records(&mut conn, user_id).await?;
    let api_keys = ApiKeys::new(&mut conn).list(&ApiKeyFilter { user_id }).await?;

    Ok(Json(DashboardPageData {
        user: session.user,
        tokens: tokens.into_iter().map(Into::into).collect(),
        zones,
        api_keys: api_keys.into_iter().map(Into::into).collect(),
    }))
}

/// Device code entry page
#[utoipa::path(
    get,
    path = "/device",
    tag = "pages",
    responses(
        (status = 200, description = "Device page data", body = DevicePageData),
        (status = 302, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn device_page(RequireSession(session): RequireSession) -> Json<DevicePageData> {
    Json(DevicePageData { user: session.user })
}

/// Device approval page
#[utoipa::path(
    get,
    path = "/device/approve",
    tag = "pages",
    params(("user_code" = String, Query, description = "Code shown on the device")),
    responses(
        (status = 200, description = "Approval page data", body = DeviceApprovePageData),
        (status = 302, description = "Not signed in, or no user_code given"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn device_approve_page(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    RequiredUserCode(user_code): RequiredUserCode,
) -> Result<Json<DeviceApprovePageData>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let request = DeviceCodes::new(&mut conn)
        .get_by_user_code(&user_code)
        .await?
        .filter(|code| code.status == DeviceCodeStatus::Pending && !code.is_expired())
        .map(Into::into);

    Ok(Json(DeviceApprovePageData {
        user: session.user,
        user_code: crate::auth::device::format_user_code(&user_code),
        request,
    }))
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn healthz() -> &'static str {
    "OK"
}
