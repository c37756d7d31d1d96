//! Database record models matching table schemas.
//!
//! Each model derives `sqlx::FromRow` and mirrors one table (or one join). API-facing shapes live
//! in [`crate::api::models`] and are built from these with `From` conversions.
//!
//! - [`users`]: Accounts owned by the auth gateway
//! - [`dns_tokens`]: Encrypted provider tokens
//! - [`dns_zones`] / [`dns_records`]: Provider zone and record mirrors
//! - [`api_keys`]: Record-scoped client keys
//! - [`device_codes`]: Pending RFC 8628 device authorizations

pub mod api_keys;
pub mod device_codes;
pub mod dns_records;
pub mod dns_tokens;
pub mod dns_zones;
pub mod users;
