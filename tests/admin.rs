//! Admin account management over HTTP.

use axum::http::StatusCode;

mod common;
use common::*;

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new();
    let user = create_approved_user(&app.conn(), "user@x.com");
    let token = app.token(&user);

    let (status, _) = app.get("/api/admin/users", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/admin/email-logs", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_users_filters_and_paginates() {
    let app = TestApp::new();
    let admin = {
        let conn = app.conn();
        for i in 0..3 {
            create_test_user(&conn, &format!("pending{}@x.com", i), UserRole::User, UserStatus::Pending);
        }
        create_approved_user(&conn, "approved@x.com");
        create_admin(&conn, "admin@x.com")
    };
    let token = app.token(&admin);

    let (status, body) = app.get("/api/admin/users", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);

    let (status, body) = app
        .get("/api/admin/users?status=pending&limit=2&offset=0", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert!(
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|u| u["status"] == "pending")
    );

    let (status, _) = app.get("/api/admin/users?status=bogus", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_approve_user_unlocks_generation_and_sends_email() {
    let app = TestApp::new();
    let (admin, pending) = {
        let conn = app.conn();
        (
            create_admin(&conn, "admin@x.com"),
            create_test_user(&conn, "new@x.com", UserRole::User, UserStatus::Pending),
        )
    };

    let (status, body) = app
        .post(
            &format!("/api/admin/users/{}/approve", pending.id),
            Some(&app.token(&admin)),
            serde_json::json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, _) = app
        .post(
            "/api/ea/generate",
            Some(&app.token(&pending)),
            serde_json::json!({ "type": "ea", "description": "Breakout bot" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, logs) = app.get("/api/admin/email-logs", Some(&app.token(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["items"][0]["template"], "account_approved");
    assert_eq!(logs["items"][0]["recipient"], "new@x.com");
}

#[tokio::test]
async fn test_suspend_user() {
    let app = TestApp::new();
    let (admin, user) = {
        let conn = app.conn();
        (create_admin(&conn, "admin@x.com"), create_approved_user(&conn, "user@x.com"))
    };
    let admin_token = app.token(&admin);

    let (status, body) = app
        .post(
            &format!("/api/admin/users/{}/suspend", user.id),
            Some(&admin_token),
            serde_json::json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "suspended");

    let (status, _) = app.get("/api/auth/me", Some(&app.token(&user))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            &format!("/api/admin/users/{}/suspend", admin.id),
            Some(&admin_token),
            serde_json::json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/admin/users/no-such-user/approve", Some(&admin_token), serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn test_promote_admin() {
    let app = TestApp::new();
    let user = create_test_user(&app.conn(), "boss@x.com", UserRole::User, UserStatus::Pending);

    let promoted = app.state.credentials.promote_admin("BOSS@x.com").unwrap();
    assert_eq!(promoted.id, user.id);
    assert!(promoted.is_admin());
    assert_eq!(promoted.status, UserStatus::Approved);

    assert!(app.state.credentials.promote_admin("nobody@x.com").is_err());
}
