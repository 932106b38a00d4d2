use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours: 24,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    /// Signs a token for `user_id` with `iat` set to `issued_at`.
    ///
    /// `iat` carries milliseconds as a fraction so that a login in the same
    /// second as an invalidation still orders after it.
    pub fn encode(&self, user_id: i64, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let exp = issued_at + Duration::hours(self.exp_hours);

        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::String(user_id.to_string()));
        claims.insert("iat".to_string(), Value::from(issued_at.timestamp_millis() as f64 / 1000.0));
        claims.insert("exp".to_string(), Value::from(exp.timestamp()));

        self.encode_claims(&TokenClaims(claims))
    }

    /// Signs an arbitrary claim set. Used for service tokens and tests.
    pub fn encode_claims(&self, claims: &TokenClaims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::default(), &claims.0, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<TokenClaims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Map<String, Value>>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| TokenClaims(data.claims))
            .map_err(|err| AppError::token(err.to_string()))
    }
}

/// Verified claims of a bearer token, kept raw so that missing and malformed
/// claims can be told apart during identity resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenClaims(pub Map<String, Value>);

impl TokenClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// Identity established by the bearer-token layer before any core logic runs.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpIdentity {
    Anonymous,
    Authenticated(TokenClaims),
}

impl HttpIdentity {
    /// A missing header or a token that fails verification leaves the
    /// request unauthenticated rather than rejecting it outright.
    pub fn from_headers(headers: &HeaderMap, jwt: &JwtConfig) -> Self {
        let token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        let Some(token) = token else {
            return HttpIdentity::Anonymous;
        };

        match jwt.decode(token) {
            Ok(claims) => HttpIdentity::Authenticated(claims),
            Err(err) => {
                tracing::debug!(error = %err, "bearer token failed verification");
                HttpIdentity::Anonymous
            }
        }
    }
}
