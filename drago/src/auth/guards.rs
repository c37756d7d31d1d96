//! Page-load guards.
//!
//! Extractors for the page routes. They re-check what the redirect middleware already checked, so
//! a page handler never runs without the preconditions it relies on even if it is mounted outside
//! the middleware. Rejections are redirects, never error pages.

use crate::{
    AppState,
    auth::{
        current_user::Session,
        device::normalize_user_code,
        middleware::{DEVICE_PATH, found, gating_session, requested_redirect, sanitize_redirect, sign_in_location},
    },
};
use axum::{extract::FromRequestParts, http::request::Parts, response::Response};
use tracing::debug;

/// A session is required; without one the client is sent to sign in and brought back afterwards.
#[derive(Debug, Clone)]
pub struct RequireSession(pub Session);

impl FromRequestParts<AppState> for RequireSession {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match gating_session(&parts.headers, state).await {
            Some(session) => Ok(RequireSession(session)),
            None => {
                debug!("Page {} requires a session", parts.uri.path());
                Err(found(&sign_in_location(&parts.uri)))
            }
        }
    }
}

/// For the sign-in page: signed-in clients are sent on to where they were going.
///
/// When no session is present this yields the sanitized redirect target the page should use after
/// sign-in, if one was requested.
#[derive(Debug, Clone, Default)]
pub struct RedirectIfAuthenticated {
    pub redirect_url: Option<String>,
}

impl FromRequestParts<AppState> for RedirectIfAuthenticated {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let requested = requested_redirect(&parts.uri);

        if gating_session(&parts.headers, state).await.is_some() {
            return Err(found(&sanitize_redirect(requested.as_deref())));
        }

        Ok(RedirectIfAuthenticated {
            redirect_url: requested.map(|target| sanitize_redirect(Some(&target))),
        })
    }
}

/// The `user_code` query parameter, normalized. Missing or blank codes go back to `/device`.
#[derive(Debug, Clone)]
pub struct RequiredUserCode(pub String);

impl<S: Send + Sync> FromRequestParts<S> for RequiredUserCode {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let code = parts.uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "user_code")
                .map(|(_, value)| normalize_user_code(&value))
        });

        match code {
            Some(code) if !code.is_empty() => Ok(RequiredUserCode(code)),
            _ => Err(found(DEVICE_PATH)),
        }
    }
}
