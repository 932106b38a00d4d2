mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use pronto_mia::jwt::TokenClaims;

const PASSWORD: &str = "password123";

#[tokio::test]
async fn tokens_issued_before_invalidation_are_rejected() -> Result<()> {
    let t = common::setup().await?;
    let bob = t.store.create_user("bob", PASSWORD, None).await?;

    let t0 = Utc::now();
    t.store.invalidate_tokens(bob.id, t0).await?;

    let stale = t.jwt.encode(bob.id, t0 - Duration::seconds(5))?;
    let (status, body) = t.send("GET", "/auth/me", Some(&stale), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(common::error_code(&body), Some("AUTH_NOT_AUTHORIZED"));

    let fresh = t.jwt.encode(bob.id, t0 + Duration::seconds(5))?;
    let (status, body) = t.send("GET", "/auth/me", Some(&fresh), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["username"], "bob");

    Ok(())
}

#[tokio::test]
async fn invalidate_tokens_endpoint_revokes_the_current_token() -> Result<()> {
    let t = common::setup().await?;
    t.store.create_user("carol", PASSWORD, None).await?;
    let token = t.login("carol", PASSWORD).await?;

    let (status, _) = t.send("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("POST", "/auth/invalidate-tokens", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.send("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(common::error_code(&body), Some("AUTH_NOT_AUTHORIZED"));

    // rejection happens before any field is evaluated
    let (status, _) = t
        .send(
            "POST",
            "/authorize",
            Some(&token),
            Some(json!({ "field": "version", "variables": {} })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn changing_the_password_invalidates_existing_tokens() -> Result<()> {
    let t = common::setup().await?;
    t.store.create_user("dora", PASSWORD, None).await?;
    let token = t.login("dora", PASSWORD).await?;

    let (status, _) = t
        .send(
            "POST",
            "/auth/change-password",
            Some(&token),
            Some(json!({ "oldPassword": "wrong-password", "newPassword": "n3w-password" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t
        .send(
            "POST",
            "/auth/change-password",
            Some(&token),
            Some(json!({ "oldPassword": PASSWORD, "newPassword": "n3w-password" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = t.send("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .send("POST", "/auth/login", None, Some(json!({ "username": "dora", "password": PASSWORD })))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a new login right away is fresh even within the same second
    let renewed = t.login("dora", "n3w-password").await?;
    let (status, body) = t.send("GET", "/auth/me", Some(&renewed), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = t.send("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn tokens_issued_moments_after_invalidation_are_accepted() -> Result<()> {
    let t = common::setup().await?;
    let fay = t.store.create_user("fay", PASSWORD, None).await?;

    let t0 = Utc::now();
    t.store.invalidate_tokens(fay.id, t0).await?;

    let same_instant = t.jwt.encode(fay.id, t0)?;
    let (status, _) = t.send("GET", "/auth/me", Some(&same_instant), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let later = t.jwt.encode(fay.id, t0 + Duration::milliseconds(20))?;
    let (status, body) = t.send("GET", "/auth/me", Some(&later), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    Ok(())
}

#[tokio::test]
async fn malformed_claims_are_rejected() -> Result<()> {
    let t = common::setup().await?;
    let erin = t.store.create_user("erin", PASSWORD, None).await?;
    let now = Utc::now().timestamp();
    let exp = now + 3600;

    let non_numeric_sub = t.jwt.encode_claims(
        &TokenClaims::new().with("sub", "erin").with("iat", now).with("exp", exp),
    )?;
    let unknown_user = t.jwt.encode(erin.id + 100, Utc::now())?;
    let missing_iat = t.jwt.encode_claims(
        &TokenClaims::new().with("sub", erin.id.to_string()).with("exp", exp),
    )?;

    for token in [non_numeric_sub, unknown_user, missing_iat] {
        let (status, body) = t.send("GET", "/auth/me", Some(&token), None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(common::error_code(&body), Some("AUTH_NOT_AUTHORIZED"));
    }

    Ok(())
}
