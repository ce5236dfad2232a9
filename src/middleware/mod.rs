//! Plug-and-play CAS authentication middleware for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cas_client::middleware::{CasClient, CasConfig, authenticate, cas_routes, require_login};
//!
//! // 1. Configure from environment
//! let client = Arc::new(CasClient::new(CasConfig::from_env()?)?);
//!
//! // 2. Wrap protected routes
//! let app = axum::Router::new()
//!     .route("/", get(home))
//!     .layer(axum::middleware::from_fn(require_login))
//!     .layer(axum::middleware::from_fn_with_state(client.clone(), authenticate))
//!     // 3. Mount the proxy callback (no-op unless proxying is enabled)
//!     .merge(cas_routes(&client));
//!
//! // 4. Read the user in handlers
//! async fn home(cas: CasContext) -> String {
//!     format!("Hello, {}", cas.username())
//! }
//! ```

mod client;
mod config;
mod cookies;
mod error;
mod extractor;
mod layer;
mod rest;
mod routes;

pub use client::{CasClient, request_url};
pub use config::{CasConfig, SESSION_COOKIE_NAME};
pub use error::AuthError;
pub use extractor::{Authenticated, CasContext};
pub use layer::{authenticate, require_login};
pub use rest::basic_auth;
pub use routes::{cas_routes, proxy_callback_routes};

/// Re-export cookie attribute type for the builder API.
pub use axum_extra::extract::cookie::SameSite;
