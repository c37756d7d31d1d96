//! HTTP request handlers, one module per resource.
//!
//! - [`pages`]: Page data for the dashboard routes, plus the liveness probe
//! - [`auth`]: Email sign-up, sign-in, sign-out, session and JWT endpoints
//! - [`device`]: RFC 8628 device authorization
//! - [`users`]: The signed-in account
//! - [`dns_tokens`]: Encrypted provider tokens
//! - [`zones`] and [`records`]: Mirrors of provider zones and records
//! - [`api_keys`]: Record-scoped API keys
//! - [`sync`]: Dynamic DNS pushes
//!
//! Session-authenticated handlers take [`crate::api::models::users::CurrentUser`], which accepts
//! the session cookie or a bearer JWT. Page handlers use the redirecting guards in
//! [`crate::auth::guards`] instead. Handlers return [`crate::errors::Error`], which renders a status
//! code and JSON body.

pub mod api_keys;
pub mod auth;
pub mod device;
pub mod dns_tokens;
pub mod pages;
pub mod records;
pub mod sync;
pub mod users;
pub mod zones;
