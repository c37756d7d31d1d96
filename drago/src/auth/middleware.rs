//! Request middleware that gates page routes on the presence of a session.
//!
//! Runs before routing. Requests under `/dashboard` or `/device` without a session are sent to the
//! sign-in page with a `redirect` back to where they were going; requests for the sign-in page that
//! already carry a session are sent on to their requested target. Everything else passes through.

use crate::{
    AppState,
    auth::current_user::{Session, resolve_session},
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

pub const SIGN_IN_PATH: &str = "/auth";
pub const LANDING_PATH: &str = "/dashboard";
pub const DEVICE_PATH: &str = "/device";

const PROTECTED_PREFIXES: &[&str] = &[LANDING_PATH, DEVICE_PATH];

/// Whether `path` is one of the protected prefixes or lies beneath one.
/// `/dashboard` and `/dashboard/tokens` match, `/dashboards` does not.
pub fn is_protected_path(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// A `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `/auth?redirect=<path and query of uri>`
pub fn sign_in_location(uri: &Uri) -> String {
    let original = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(uri.path());
    let encoded: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
    format!("{SIGN_IN_PATH}?redirect={encoded}")
}

/// The `redirect` (or `redirect_url`) query parameter of `uri`, if present.
pub fn requested_redirect(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    let mut fallback = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "redirect" => return Some(value.into_owned()),
            "redirect_url" if fallback.is_none() => fallback = Some(value.into_owned()),
            _ => {}
        }
    }
    fallback
}

/// Accept only same-origin relative paths as post-sign-in targets, otherwise `/dashboard`.
pub fn sanitize_redirect(target: Option<&str>) -> String {
    match target {
        Some(t)
            if t.starts_with('/')
                && !t.starts_with("//")
                && !t.starts_with("/\\")
                && !t.chars().any(|c| c.is_control())
                && !is_sign_in_target(t) =>
        {
            t.to_string()
        }
        _ => LANDING_PATH.to_string(),
    }
}

// Sending an authenticated user back to `/auth` would loop.
fn is_sign_in_target(target: &str) -> bool {
    target
        .strip_prefix(SIGN_IN_PATH)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['?', '/', '#']))
}

/// Session lookup for gating purposes. Lookup failures count as "no session".
pub(crate) async fn gating_session(headers: &HeaderMap, state: &AppState) -> Option<Session> {
    match resolve_session(headers, state).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Session lookup failed, treating request as unauthenticated: {:#}", e);
            None
        }
    }
}

async fn has_session(headers: &HeaderMap, state: &AppState) -> bool {
    gating_session(headers, state).await.is_some()
}

/// Implementation for [`session_redirect_middleware`]. Returns the request to continue with, or
/// the redirect to answer with instead.
pub(crate) async fn session_redirect(state: &AppState, request: Request) -> Result<Request, Response> {
    let uri = request.uri().clone();
    let path = uri.path();

    if is_protected_path(path) {
        if has_session(request.headers(), state).await {
            return Ok(request);
        }
        let location = sign_in_location(&uri);
        debug!("No session for {}, redirecting to {}", path, location);
        return Err(found(&location));
    }

    if path == SIGN_IN_PATH && has_session(request.headers(), state).await {
        let location = sanitize_redirect(requested_redirect(&uri).as_deref());
        debug!("Already signed in, redirecting {} to {}", path, location);
        return Err(found(&location));
    }

    Ok(request)
}

/// Middleware that redirects page requests based on session presence
pub async fn session_redirect_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match session_redirect(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(redirect) => redirect,
    }
}
