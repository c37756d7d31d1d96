//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all endpoints
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Pages** (`/auth`, `/dashboard`, `/device`, `/device/approve`): JSON page data behind the
//!   redirect middleware and page guards
//! - **Authentication** (`/api/auth/*`): Email sign-up and sign-in, sessions, JWTs and the RFC 8628
//!   device flow
//! - **Credential store** (`/api/v1/*`): Provider tokens, zone and record mirrors, API keys and the
//!   current account
//! - **Sync** (`PUT /sync`): Dynamic DNS pushes authenticated by API key
//!
//! All endpoints carry `utoipa` annotations. The OpenAPI document is rendered at `/api/docs`.

pub mod handlers;
pub mod models;
