use axum::body::{Body, HttpBody};
use axum::extract::{Query, Request, State};
use axum::http::{Method, Uri};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::HttpIdentity;
use crate::logging::VariableValue;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Request-start hook: publishes the caller's `IdentityState` or rejects with
/// `AUTH_NOT_AUTHORIZED` before any handler runs.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = HttpIdentity::from_headers(req.headers(), &state.jwt);
    state.identity.apply(&identity, req.extensions_mut()).await?;
    Ok(next.run(req).await)
}

#[derive(Debug, Default, Deserialize)]
struct GraphQLPayload {
    query: Option<String>,
    variables: Option<Map<String, Value>>,
}

/// GraphQL-over-GET carries the document and a JSON-encoded `variables`
/// object in the query string.
#[derive(Debug, Default, Deserialize)]
struct GraphQLQueryString {
    query: Option<String>,
    variables: Option<String>,
}

impl GraphQLPayload {
    fn from_query_string(uri: &Uri) -> Self {
        let Ok(Query(params)) = Query::<GraphQLQueryString>::try_from_uri(uri) else {
            return Self::default();
        };
        Self {
            query: params.query,
            variables: params.variables.and_then(|raw| serde_json::from_str(&raw).ok()),
        }
    }

    fn into_parts(self) -> (Option<String>, Vec<VariableValue>) {
        let variables = self
            .variables
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| VariableValue::inferred(name, value))
            .collect();
        (self.query, variables)
    }
}

/// Diagnostic hooks: one started line before the request, one ended line
/// after it, whatever the outcome. Never fails the request.
///
/// POST bodies are buffered only when their size is known and within
/// `MAX_BODY_BYTES`; other bodies are forwarded untouched and logged without
/// a document. Other methods are read from the query string.
pub async fn log_queries(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (payload, req) = if req.method() == Method::POST {
        buffer_payload(req).await
    } else {
        (GraphQLPayload::from_query_string(req.uri()), req)
    };

    let (query, variables) = payload.into_parts();
    let scope = state.query_log.begin(query.as_deref(), &variables);
    let response = next.run(req).await;
    scope.end();

    response
}

async fn buffer_payload(req: Request) -> (GraphQLPayload, Request) {
    // Content-Length, when present, is reflected in the size hint.
    let declared = req.body().size_hint().upper();

    match declared {
        Some(len) if len <= MAX_BODY_BYTES as u64 => {}
        _ => {
            tracing::debug!(size = ?declared, "request body not inspected for query logging");
            return (GraphQLPayload::default(), req);
        }
    }

    let (parts, body) = req.into_parts();
    match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => {
            // Bodies that are not GraphQL payloads are logged without a document.
            let payload = serde_json::from_slice(&bytes).unwrap_or_default();
            (payload, Request::from_parts(parts, Body::from(bytes)))
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to buffer request body for query logging");
            (GraphQLPayload::default(), Request::from_parts(parts, Body::empty()))
        }
    }
}
