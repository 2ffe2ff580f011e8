//! Artifact generation, bots and MT5 accounts over HTTP.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_generate_stores_artifact_with_key_and_inactive_bot() {
    let app = TestApp::new();
    let user = create_approved_user(&app.conn(), "dev@x.com");
    let token = app.token(&user);

    let description = "Moving average crossover with a trailing stop that follows price closely";
    let (status, body) = app
        .post(
            "/api/ea/generate",
            Some(&token),
            json!({ "type": "ea", "description": description, "strategy_details": "fast 10, slow 50" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "ea");
    assert_eq!(body["code"], STUB_CODE);
    assert_eq!(body["name"].as_str().unwrap().chars().count(), 50);
    assert!(body["license_key"].as_str().unwrap().starts_with("EA-"));

    let ea_id = body["id"].as_str().unwrap();
    let (status, bot) = app.get(&format!("/api/bot/status/{}", ea_id), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bot["is_active"], false);

    let (status, list) = app.get("/api/ea/list", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_generation_failure_stores_nothing() {
    let app = TestApp::with_options(false, Arc::new(FailingGenerator));
    let user = create_approved_user(&app.conn(), "dev@x.com");
    let token = app.token(&user);

    let (status, body) = app
        .post(
            "/api/ea/generate",
            Some(&token),
            json!({ "type": "indicator", "description": "RSI divergence" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["details"], "Failed to generate EA");

    assert!(queries::list_artifacts_for_user(&app.conn(), &user.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_pending_user_cannot_generate() {
    let app = TestApp::new();
    let user = create_test_user(&app.conn(), "new@x.com", UserRole::User, UserStatus::Pending);
    let token = app.token(&user);

    let (status, _) = app
        .post(
            "/api/ea/generate",
            Some(&token),
            json!({ "type": "ea", "description": "Grid bot" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reading is still allowed
    let (status, _) = app.get("/api/ea/list", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_generate_rejects_bad_input() {
    let app = TestApp::new();
    let user = create_approved_user(&app.conn(), "dev@x.com");
    let token = app.token(&user);

    let (status, _) = app
        .post("/api/ea/generate", Some(&token), json!({ "type": "ea", "description": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/ea/generate", Some(&token), json!({ "type": "script", "description": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_artifacts_are_private_to_their_owner() {
    let app = TestApp::new();
    let (owner, other, artifact) = {
        let conn = app.conn();
        let owner = create_approved_user(&conn, "owner@x.com");
        let other = create_approved_user(&conn, "other@x.com");
        let artifact = create_test_artifact(&conn, &app.state.ledger, &owner.id);
        (owner, other, artifact)
    };
    let other_token = app.token(&other);
    let uri = format!("/api/ea/{}", artifact.id);

    let (status, _) = app.get(&uri, Some(&other_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, Some(&other_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(
            "/api/bot/toggle",
            Some(&other_token),
            json!({ "ea_id": artifact.id, "is_active": true }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&uri, Some(&app.token(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["license_key"], artifact.license_key.as_str());
}

#[tokio::test]
async fn test_delete_artifact() {
    let app = TestApp::new();
    let (owner, artifact) = {
        let conn = app.conn();
        let owner = create_approved_user(&conn, "owner@x.com");
        let artifact = create_test_artifact(&conn, &app.state.ledger, &owner.id);
        (owner, artifact)
    };
    let token = app.token(&owner);
    let uri = format!("/api/ea/{}", artifact.id);

    let (status, body) = app.delete(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = app.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_bot() {
    let app = TestApp::new();
    let (owner, artifact) = {
        let conn = app.conn();
        let owner = create_approved_user(&conn, "owner@x.com");
        let artifact = create_test_artifact(&conn, &app.state.ledger, &owner.id);
        (owner, artifact)
    };
    let token = app.token(&owner);

    let (status, body) = app
        .post(
            "/api/bot/toggle",
            Some(&token),
            json!({ "ea_id": artifact.id, "is_active": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);

    let (_, body) = app
        .get(&format!("/api/bot/status/{}", artifact.id), Some(&token))
        .await;
    assert_eq!(body["is_active"], true);
    assert_eq!(body["ea_id"], artifact.id.as_str());
}

#[tokio::test]
async fn test_connect_mt5_account_seals_password() {
    let app = TestApp::new();
    let user = create_approved_user(&app.conn(), "trader@x.com");
    let token = app.token(&user);
    let input = json!({ "account_number": "5001234", "server": "MetaQuotes-Demo", "password": "hunter22" });

    let (status, body) = app.post("/api/mt5/connect", Some(&token), input.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], true);
    assert!(body.get("password").is_none());
    assert!(body.get("password_encrypted").is_none());

    let (status, body) = app.post("/api/mt5/connect", Some(&token), input).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "MT5 account already connected");

    let stored = queries::get_mt5_account(&app.conn(), &user.id, "5001234")
        .unwrap()
        .unwrap();
    let context = Mt5Account::encryption_context(&user.id, "5001234");
    assert_ne!(stored.password_encrypted, b"hunter22");
    assert_eq!(
        app.state.master_key.decrypt(&context, &stored.password_encrypted).unwrap(),
        b"hunter22"
    );

    let (status, list) = app.get("/api/mt5/accounts", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}
