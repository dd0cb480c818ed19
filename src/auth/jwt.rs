//! JWT Token Service
//!
//! HS256 access tokens carrying the user id, email and role.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { Customer, Admin }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Admin => "admin" }
    }

    pub fn parse(value: &str) -> Self {
        if value == "admin" { Self::Admin } else { Self::Customer }
    }
}

/// JWT Claims stored in the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token generation failed: {0}")]
    GenerationFailed(String),
}

#[derive(Clone)]
pub struct JwtService {
    issuer: String,
    expiration_minutes: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            expiration_minutes: config.expiration_minutes,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    pub fn expiration_seconds(&self) -> i64 { self.expiration_minutes * 60 }

    pub fn generate_token(&self, user_id: Uuid, email: &str, role: Role) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            exp: (now + Duration::minutes(self.expiration_minutes)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            _ => JwtError::InvalidToken(e.to_string()),
        })?;
        Ok(data.claims)
    }

    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Authenticated caller. Used directly as an extractor for routes that
/// require sign-in.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self { id: claims.sub, email: claims.email, role: claims.role }
    }
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str, minutes: i64) -> JwtService {
        JwtService::new(&JwtConfig { secret: secret.into(), expiration_minutes: minutes, issuer: "storefront".into() })
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let svc = service("a-very-long-test-secret-for-hs256-tokens", 60);
        let id = Uuid::new_v4();
        let token = svc.generate_token(id, "buyer@example.com", Role::Customer).unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Customer);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service("secret-one-secret-one-secret-one", 60).generate_token(Uuid::new_v4(), "a@b.c", Role::Admin).unwrap();
        assert_eq!(service("secret-two-secret-two-secret-two", 60).validate_token(&token), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn test_expired_token() {
        // Beyond the default 60 s leeway.
        let svc = service("expiry-secret-expiry-secret-expiry", -10);
        let token = svc.generate_token(Uuid::new_v4(), "a@b.c", Role::Customer).unwrap();
        assert_eq!(svc.validate_token(&token), Err(JwtError::ExpiredToken));
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
        assert_eq!(JwtService::extract_from_header("Bearer "), None);
    }
}
