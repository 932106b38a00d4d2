//! Request-start identity resolution.
//!
//! ```text
//! HttpIdentity::Anonymous ──────────────────────────────► IdentityState::Anonymous
//! HttpIdentity::Authenticated ─► sub ─► user ─► iat ─► freshness ─► IdentityState::Authenticated
//!                                 │       │       │         │
//!                                 └───────┴───────┴─────────┴──► AppError::NotAuthorized
//! ```

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Extensions;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::evaluator::CurrentUserProvider;
use crate::errors::{AppError, AppResult};
use crate::jwt::{HttpIdentity, TokenClaims};

pub const USER_ID_CLAIM: &str = "sub";
pub const ISSUED_AT_CLAIM: &str = "iat";

/// Validated identity of the acting user, fixed for the request lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub user_id: i64,
    pub username: String,
    pub department_id: Option<i64>,
    pub issued_at: DateTime<Utc>,
}

/// Request property published by the request-start hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    Anonymous,
    Authenticated(IdentitySnapshot),
}

impl IdentityState {
    pub fn snapshot(&self) -> Option<&IdentitySnapshot> {
        match self {
            IdentityState::Anonymous => None,
            IdentityState::Authenticated(snapshot) => Some(snapshot),
        }
    }
}

#[derive(Clone)]
pub struct RequestIdentityResolver {
    users: Arc<dyn CurrentUserProvider>,
}

impl RequestIdentityResolver {
    pub fn new(users: Arc<dyn CurrentUserProvider>) -> Self {
        Self { users }
    }

    pub async fn resolve(&self, identity: &HttpIdentity) -> AppResult<IdentityState> {
        let claims = match identity {
            HttpIdentity::Anonymous => return Ok(IdentityState::Anonymous),
            HttpIdentity::Authenticated(claims) => claims,
        };

        let user_id = claim_i64(claims, USER_ID_CLAIM)
            .ok_or_else(|| AppError::not_authorized("user id claim missing or malformed"))?;

        let user = match self.users.find_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::info!(user_id, "token refers to unknown user");
                return Err(AppError::not_authorized("user not found"));
            }
            Err(err) => {
                tracing::warn!(user_id, error = %err, "user lookup failed during identity resolution");
                return Err(AppError::not_authorized("user could not be resolved"));
            }
        };

        let issued_at = claim_millis(claims, ISSUED_AT_CLAIM)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| AppError::not_authorized("issued-at claim missing or malformed"))?;

        // compared at the millisecond precision of iat
        if issued_at.timestamp_millis() <= user.last_invalidated.timestamp_millis() {
            tracing::info!(
                user_id,
                issued_at = %issued_at,
                last_invalidated = %user.last_invalidated,
                "stale token rejected"
            );
            return Err(AppError::not_authorized("token has been invalidated"));
        }

        Ok(IdentityState::Authenticated(IdentitySnapshot {
            user_id: user.id,
            username: user.username,
            department_id: user.department_id,
            issued_at,
        }))
    }

    /// Request-start hook: resolves the identity and stores it as a request
    /// property, or rejects the request.
    pub async fn apply(&self, identity: &HttpIdentity, extensions: &mut Extensions) -> AppResult<()> {
        let state = self.resolve(identity).await?;
        extensions.insert(state);
        Ok(())
    }
}

fn claim_i64(claims: &TokenClaims, name: &str) -> Option<i64> {
    match claims.get(name)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a NumericDate claim as milliseconds. Whole and fractional seconds
/// are both accepted.
fn claim_millis(claims: &TokenClaims, name: &str) -> Option<i64> {
    let secs = match claims.get(name)? {
        Value::Number(n) => match n.as_i64() {
            Some(whole) => return whole.checked_mul(1000),
            None => n.as_f64()?,
        },
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    secs.is_finite().then(|| (secs * 1000.0).round() as i64)
}

/// Extractor for the identity state published by the identity middleware.
#[derive(Debug, Clone)]
pub struct Identity(pub IdentityState);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityState>()
            .cloned()
            .map(Identity)
            .ok_or_else(|| AppError::internal("identity middleware not installed"))
    }
}
