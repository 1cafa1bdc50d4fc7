use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::access::CallerContext;
use crate::models::User;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(String),
    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Bearer token payload: who the caller is and which company it acts for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl From<Claims> for CallerContext {
    fn from(claims: Claims) -> Self {
        CallerContext {
            user_id: claims.sub,
            email: claims.email,
            company_id: claims.company,
        }
    }
}

/// Issues and verifies HS256 bearer tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            company: user.company_id.clone(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<CallerContext, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.into())
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_user;

    #[test]
    fn test_issue_then_verify_carries_company() {
        let service = TokenService::new("unit-test-secret-unit-test-secret", Duration::from_secs(60));
        let mut user = sample_user(42, "owner@example.com");
        user.company_id = Some("B12345678".to_string());

        let token = service.issue(&user).unwrap();
        let caller = service.verify(&token).unwrap();

        assert_eq!(caller.user_id, 42);
        assert_eq!(caller.email, "owner@example.com");
        assert_eq!(caller.company_id.as_deref(), Some("B12345678"));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = TokenService::new("first-secret-first-secret-first-secret", Duration::from_secs(60));
        let verifier = TokenService::new("second-secret-second-secret-second", Duration::from_secs(60));
        let token = issuer.issue(&sample_user(1, "a@example.com")).unwrap();

        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid(_))));
        assert!(verifier.verify("not.a.jwt").is_err());
    }
}
