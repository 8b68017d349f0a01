use std::collections::HashSet;
use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer token claims. Tokens are issued elsewhere; this service only
/// verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug)]
pub enum JwtError {
    InvalidSecret,
    InvalidToken(String),
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::InvalidSecret => write!(f, "JWT secret not configured"),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
        }
    }
}

impl std::error::Error for JwtError {}

/// Verifies an HS256 token and returns its claims
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// Who is making the request and what they may do. Requests without a token
/// are anonymous and hold no permissions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Caller {
    pub user_id: Option<Uuid>,
    pub permissions: HashSet<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Exact string membership; no wildcards or hierarchy
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            permissions: claims.permissions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn claims() -> Claims {
        Claims {
            user_id: Some(Uuid::new_v4()),
            permissions: vec!["get roles".into()],
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
        }
    }

    #[test]
    fn decodes_caller_from_token() {
        let claims = claims();
        let caller: Caller = decode_jwt(&token(&claims, "secret"), "secret").unwrap().into();
        assert_eq!(caller.user_id, claims.user_id);
        assert!(caller.has_permission("get roles"));
        assert!(!caller.has_permission("get role"));
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        assert!(decode_jwt(&token(&claims(), "secret"), "other").is_err());

        let expired = Claims {
            exp: chrono::Utc::now().timestamp() - 3600,
            ..claims()
        };
        assert!(decode_jwt(&token(&expired, "secret"), "secret").is_err());
        assert!(matches!(decode_jwt("x", ""), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn anonymous_caller_has_no_permissions() {
        assert!(!Caller::anonymous().has_permission("get roles"));
    }
}
