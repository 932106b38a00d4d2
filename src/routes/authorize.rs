use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Identity;
use crate::errors::{AppResult, AUTH_NOT_AUTHORIZED};

/// A field about to be resolved by the GraphQL engine.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    #[schema(example = "updateUser")]
    pub field: String,
    /// Field arguments, keyed by argument name.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub variables: Map<String, Value>,
    /// The raw document, only used for logging.
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeResponse {
    pub field: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[utoipa::path(
    post,
    path = "/authorize",
    tag = "Authorization",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Authorization decision for the field", body = AuthorizeResponse),
        (status = 401, description = "Token missing required claims or invalidated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn authorize(
    State(state): State<AppState>,
    Identity(identity): Identity,
    Json(payload): Json<AuthorizeRequest>,
) -> AppResult<Json<AuthorizeResponse>> {
    let decision = state.fields.authorize(&payload.field, &payload.variables, &identity).await;

    let allowed = decision.is_allowed();
    Ok(Json(AuthorizeResponse {
        field: payload.field,
        allowed,
        code: (!allowed).then(|| AUTH_NOT_AUTHORIZED.to_string()),
    }))
}
