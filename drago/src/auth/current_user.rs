//! Resolving who a request is authenticated as.
//!
//! Two credentials are understood:
//!
//! - **Session JWT**, carried in the session cookie or as `Authorization: Bearer <jwt>`. Resolving
//!   a session verifies the token and then loads the user, so deleted accounts lose their sessions.
//! - **API key**, carried as `Authorization: Bearer dgo_...`. Keys authenticate the client daemon
//!   against the single DNS record they control and are only accepted where [`ApiKeyAuth`] is used.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{password, session},
    config::Config,
    crypto,
    db::{
        handlers::{ApiKeys, Repository, Users},
        models::api_keys::ApiKeyDBResponse,
    },
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace};

/// A verified session and the user behind it.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: CurrentUser,
    /// The JWT the session was resolved from
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Session token candidates in the order they are tried: session cookies, then a bearer JWT.
fn session_token_candidates<'a>(headers: &'a HeaderMap, config: &Config) -> Vec<&'a str> {
    let cookie_name = &config.auth.native.session.cookie_name;
    let mut candidates: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .filter(|(name, value)| name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
        .collect();

    if let Some(token) = bearer_token(headers)
        && !crypto::looks_like_api_key(token)
    {
        candidates.push(token);
    }

    candidates
}

/// The credential of an `Authorization: Bearer` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the session for a set of request headers.
///
/// Returns `Ok(None)` when no credential verifies or the user no longer exists. Errors are only
/// returned for infrastructure failures such as the user lookup hitting the database.
#[instrument(skip_all)]
pub async fn resolve_session(headers: &HeaderMap, state: &AppState) -> Result<Option<Session>> {
    if !state.config.auth.native.enabled {
        return Ok(None);
    }

    let verified = session_token_candidates(headers, &state.config)
        .into_iter()
        .find_map(|token| match session::verify_session_token(token, &state.config) {
            Ok(claims) => Some((token, claims)),
            Err(e) => {
                // Expected for expired tokens
                trace!("Session token rejected: {}", e);
                None
            }
        });

    let Some((token, claims)) = verified else {
        trace!("No valid session token in request");
        return Ok(None);
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let Some(user) = Users::new(&mut conn).get_by_id(claims.sub).await? else {
        debug!("Session token for deleted user {}", claims.sub);
        return Ok(None);
    };

    Ok(Some(Session {
        user: user.into(),
        token: token.to_string(),
        expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
    }))
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match resolve_session(&parts.headers, state).await? {
            Some(session) => {
                debug!("Found session for user: {}", session.user.id);
                Ok(session)
            }
            None => Err(Error::Unauthenticated { message: None }),
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        Session::from_request_parts(parts, state).await.map(|session| session.user)
    }
}

/// An authenticated API key, used by the dynamic DNS client.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth(pub ApiKeyDBResponse);

/// Look up a presented key by prefix and verify its secret against the stored hash.
#[instrument(skip_all)]
pub async fn authenticate_api_key(presented: &str, state: &AppState) -> Result<ApiKeyDBResponse> {
    let invalid = || Error::Unauthenticated {
        message: Some("Invalid API key".to_string()),
    };

    let (prefix, secret) = crypto::parse_api_key(presented).map_err(|_| invalid())?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let key = ApiKeys::new(&mut conn).get_by_prefix(prefix).await?.ok_or_else(invalid)?;

    let secret = secret.to_string();
    let hash = key.key_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&secret, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn API key verification task: {e}"),
        })?
        .unwrap_or(false);

    if !is_valid {
        debug!("API key secret mismatch for prefix {}", prefix);
        return Err(invalid());
    }

    Ok(key)
}

impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let presented = bearer_token(&parts.headers).ok_or_else(|| Error::Unauthenticated {
            message: Some("Missing API key".to_string()),
        })?;
        authenticate_api_key(presented, state).await.map(ApiKeyAuth)
    }
}
