#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use pronto_mia::config::QueryLogConfig;
use pronto_mia::create_app_with;
use pronto_mia::db::SqliteStore;
use pronto_mia::jwt::JwtConfig;

pub struct TestApp {
    pub app: Router,
    pub store: SqliteStore,
    pub jwt: JwtConfig,
    // keeps the database file alive for the duration of the test
    _dir: TempDir,
}

pub async fn setup() -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    pronto_mia::db::migrate(&pool).await?;

    let jwt = JwtConfig::new("test-secret");
    let app = create_app_with(pool.clone(), jwt.clone(), &QueryLogConfig::default())?;

    Ok(TestApp {
        app,
        store: SqliteStore::new(pool),
        jwt,
        _dir: dir,
    })
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    /// Posts a field authorization request and returns the decision body.
    pub async fn authorize(&self, token: Option<&str>, field: &str, variables: Value) -> Result<Value> {
        let (status, body) = self
            .send(
                "POST",
                "/authorize",
                token,
                Some(serde_json::json!({ "field": field, "variables": variables })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "authorize failed: {body}");
        Ok(body)
    }
}

pub fn error_code(body: &Value) -> Option<&str> {
    body["errors"][0]["extensions"]["code"].as_str()
}
