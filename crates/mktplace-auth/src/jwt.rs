//! JWT session tokens for the marketplace login surface (`/login`, `/me`).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string per JWT convention.
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

/// Issues and verifies marketplace session JWTs.
pub struct JwtIssuer {
    secret: String,
    algorithm: Algorithm,
    access_token_expire_minutes: i64,
}

impl JwtIssuer {
    #[must_use]
    pub fn new(secret: impl Into<String>, algorithm: &str, access_token_expire_minutes: u32) -> Self {
        let algorithm = match algorithm {
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            _ => Algorithm::HS256,
        };
        Self {
            secret: secret.into(),
            algorithm,
            access_token_expire_minutes: i64::from(access_token_expire_minutes),
        }
    }

    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSession`] if the JWT library fails to
    /// encode the claims (only happens for a malformed key).
    pub fn issue(&self, user_id: i64, role: &str) -> Result<String, AuthError> {
        let exp = (Utc::now() + Duration::minutes(self.access_token_expire_minutes)).timestamp();
        let claims = Claims { sub: user_id.to_string(), role: role.to_string(), exp };
        encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::InvalidSession(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSession`] if the token is malformed,
    /// expired, or signed with a different key.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidSession(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_back_to_the_same_claims() {
        let issuer = JwtIssuer::new("test-secret", "HS256", 60);
        let token = issuer.issue(42, "seller").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, "seller");
    }

    #[test]
    fn token_signed_with_a_different_secret_is_rejected() {
        let issuer_a = JwtIssuer::new("secret-a", "HS256", 60);
        let issuer_b = JwtIssuer::new("secret-b", "HS256", 60);
        let token = issuer_a.issue(1, "buyer").unwrap();
        assert!(issuer_b.verify(&token).is_err());
    }
}
