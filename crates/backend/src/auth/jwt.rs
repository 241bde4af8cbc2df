//! JWT validation.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::types::{AuthConfig, Claims};

/// Validate a JWT token and return claims.
pub fn validate_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Sign a token the way the auth service does. Used by tests.
#[cfg(test)]
pub fn create_token(
    config: &AuthConfig,
    user_id: uuid::Uuid,
    email: Option<&str>,
) -> Result<String, jsonwebtoken::errors::Error> {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        aud: config.audience.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-key-for-testing-only".to_string(),
            audience: None,
            cookie_name: "auth_token".to_string(),
        }
    }

    #[test]
    fn test_create_and_validate_token() {
        let config = test_config();
        let user = Uuid::new_v4();
        let token = create_token(&config, user, Some("test@example.com"))
            .expect("should create token");

        let claims = validate_token(&config, &token).expect("should validate token");
        assert_eq!(claims.sub, user.to_string());
        assert_eq!(claims.email.as_deref(), Some("test@example.com"));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let config = test_config();
        let result = validate_token(&config, "invalid-token");
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = test_config();
        let token = create_token(&config, Uuid::new_v4(), None).expect("should create token");

        let mut wrong_config = config;
        wrong_config.jwt_secret = "wrong-secret".to_string();

        let result = validate_token(&wrong_config, &token);
        assert!(result.is_err());
    }

    #[test]
    fn test_audience_checked_when_configured() {
        let mut issuer = test_config();
        issuer.audience = Some("authenticated".to_string());
        let token = create_token(&issuer, Uuid::new_v4(), None).expect("should create token");

        assert!(validate_token(&issuer, &token).is_ok());
        // tokens carrying an audience still pass when none is configured
        assert!(validate_token(&test_config(), &token).is_ok());

        let mut other = issuer.clone();
        other.audience = Some("service_role".to_string());
        assert!(validate_token(&other, &token).is_err());
    }
}
