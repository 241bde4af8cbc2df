//! Auth-related types and configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims as issued by the hosted auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Validated user from JWT
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Auth configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Expected `aud` claim; audience is not checked when unset
    pub audience: Option<String>,
    pub cookie_name: String,
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// Required env vars:
    /// - `JWT_SECRET`: Secret key shared with the auth service
    ///
    /// Optional:
    /// - `JWT_AUDIENCE`: Expected audience claim
    /// - `AUTH_COOKIE_NAME`: Cookie carrying the token (default `auth_token`)
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;

        if jwt_secret.trim().is_empty() {
            return Err("JWT_SECRET cannot be empty".to_string());
        }

        Ok(Self {
            jwt_secret,
            audience: std::env::var("JWT_AUDIENCE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            cookie_name: std::env::var("AUTH_COOKIE_NAME")
                .unwrap_or_else(|_| "auth_token".to_string()),
        })
    }
}
