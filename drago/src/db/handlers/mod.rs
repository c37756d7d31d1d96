//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` and implements [`Repository`]:
//!
//! ```ignore
//! use drago::db::handlers::{DnsTokens, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let tokens = DnsTokens::new(&mut tx).list(&DnsTokenFilter { user_id }).await?;
//! tx.commit().await?;
//! ```
//!
//! Every query that reads or mutates user-owned rows on behalf of a request is scoped by
//! `user_id`, so a row belonging to another account is indistinguishable from a missing one.

pub mod api_keys;
pub mod device_codes;
pub mod dns_records;
pub mod dns_tokens;
pub mod dns_zones;
pub mod repository;
pub mod users;

pub use api_keys::ApiKeys;
pub use device_codes::DeviceCodes;
pub use dns_records::DnsRecords;
pub use dns_tokens::DnsTokens;
pub use dns_zones::DnsZones;
pub use repository::Repository;
pub use users::Users;
