//! JWT authentication for the API.
//!
//! Tokens are issued by the hosted auth service and verified here with the
//! shared HS256 secret. `require_auth` protects the `/api` routes and hands
//! handlers an [`AuthUser`] through request extensions.

mod jwt;
mod middleware;
pub mod types;

pub use middleware::require_auth;
pub use types::{AuthConfig, AuthUser};

#[cfg(test)]
pub use jwt::create_token;
