//! Authentication: who a request is, and what it may see.
//!
//! # Credentials
//!
//! - **Session JWT**: issued by sign-in, sign-up and the device flow. Browsers carry it in the
//!   session cookie, other clients as `Authorization: Bearer <jwt>`. Sessions are stateless; the
//!   user row is still loaded on every resolution, so deleting an account ends its sessions.
//! - **API key**: `dgo_<prefix>_<secret>`, scoped to one DNS record and accepted only by the sync
//!   endpoint.
//!
//! # Modules
//!
//! - [`current_user`]: extractors resolving sessions and API keys
//! - [`device`]: device and user codes for the RFC 8628 flow
//! - [`guards`]: page-load extractors that redirect instead of erroring
//! - [`middleware`]: path-prefix redirect middleware
//! - [`password`]: Argon2 hashing and password rules
//! - [`session`]: JWT issuing and the session cookie

pub mod current_user;
pub mod device;
pub mod guards;
pub mod middleware;
pub mod password;
pub mod session;
