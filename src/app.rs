use std::sync::Arc;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{DepartmentScopeResolver, FieldGuard, FieldPolicyTable, PolicyRegistry, RequestIdentityResolver};
use crate::config::QueryLogConfig;
use crate::db::SqliteStore;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::logging::QueryLogger;
use crate::middleware::{log_queries, resolve_identity};
use crate::routes::{auth, authorize, health};

#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub jwt: Arc<JwtConfig>,
    pub identity: RequestIdentityResolver,
    pub fields: FieldGuard,
    pub query_log: Arc<QueryLogger>,
}

impl AppState {
    /// Builds the write-once tables (policies, field table, sensitive fields)
    /// before any request can be served. Configuration errors surface here.
    pub fn new(pool: SqlitePool, jwt: JwtConfig, query_log: &QueryLogConfig) -> Result<Self, AppError> {
        let store = SqliteStore::new(pool);
        let users = Arc::new(store.clone());

        let mut registry = PolicyRegistry::with_all_capabilities();
        let table = FieldPolicyTable::builtin(&mut registry)?;
        tracing::info!(policies = registry.len(), fields = table.len(), "authorization tables ready");

        let fields = FieldGuard::new(Arc::new(table), users.clone(), DepartmentScopeResolver::new(users.clone()));

        Ok(Self {
            store,
            jwt: Arc::new(jwt),
            identity: RequestIdentityResolver::new(users),
            fields,
            query_log: Arc::new(QueryLogger::new(query_log)?),
        })
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let query_log = QueryLogConfig::from_env()?;
    create_app_with(pool, jwt_config, &query_log)
}

pub fn create_app_with(pool: SqlitePool, jwt: JwtConfig, query_log: &QueryLogConfig) -> Result<Router, AppError> {
    let state = AppState::new(pool, jwt, query_log)?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    // Routes that act on behalf of the caller go through identity resolution.
    let identified = Router::new()
        .route("/authorize", post(authorize::authorize))
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/invalidate-tokens", post(auth::invalidate_tokens))
        .route_layer(from_fn_with_state(state.clone(), resolve_identity));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .merge(identified)
        .layer(from_fn_with_state(state.clone(), log_queries))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
