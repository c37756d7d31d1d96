//! API request and response data models.
//!
//! These structures define the public HTTP contract. They are distinct from [`crate::db::models`]
//! so storage can evolve independently, and they derive `utoipa::ToSchema` for the OpenAPI
//! document served at `/api/docs`.
//!
//! - [`users`]: The authenticated user and account payloads
//! - [`auth`]: Sign-up, sign-in and session payloads
//! - [`device`]: RFC 8628 device authorization payloads
//! - [`dns_tokens`], [`zones`], [`records`], [`api_keys`]: Credential store resources
//! - [`sync`]: Dynamic DNS push from the client daemon
//! - [`pages`]: Page data for the dashboard routes

pub mod api_keys;
pub mod auth;
pub mod device;
pub mod dns_tokens;
pub mod pages;
pub mod records;
pub mod sync;
pub mod users;
pub mod zones;
