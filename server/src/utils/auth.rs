use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Identity, Role};
use crate::utils::error::{AppError, AppResult};

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// HS256 signing material shared by every request.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, identity: &Identity) -> AppResult<String> {
        let exp = (Utc::now() + self.ttl).timestamp().max(0) as usize;
        let claims = Claims {
            sub: identity.id.to_string(),
            role: identity.role.to_string(),
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("token encoding failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> AppResult<Identity> {
        let invalid = || AppError::Unauthenticated("Invalid or expired token".to_string());

        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                invalid()
            })?;

        let id = data.claims.sub.parse::<i64>().map_err(|_| invalid())?;
        let role = data.claims.role.parse::<Role>().map_err(|_| invalid())?;

        Ok(Identity::new(id, role))
    }
}

/// The caller's identity, if a bearer token was sent.
///
/// No `Authorization` header yields `CurrentUser(None)` and leaves the
/// decision to the service. A header that is present but malformed, or a
/// token that fails verification, is rejected with `UNAUTHENTICATED`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<JwtKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(CurrentUser(None));
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("Missing or invalid token".to_string()))?;

        let keys = Arc::<JwtKeys>::from_ref(state);
        keys.verify(token).map(|identity| CurrentUser(Some(identity)))
    }
}
