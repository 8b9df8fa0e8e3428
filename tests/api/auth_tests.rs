//! Authentication Middleware Tests
//!
//! These exercise the request paths that are decided before any
//! database access: missing, malformed, and wrongly signed tokens.

use axum::http::StatusCode;

use crate::common::{body_json, forge_token_with_secret, TestApp};

#[tokio::test]
async fn test_chat_routes_require_token() {
    let app = TestApp::new();

    let response = app.get("/api/v1/chat/rooms/active").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("authorization header"));
}

#[tokio::test]
async fn test_shipping_routes_require_token() {
    let app = TestApp::new();

    let response = app.get("/api/v1/shipping/orders").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_token_is_rejected() {
    let app = TestApp::new();

    let response = app.get_auth("/api/v1/chat/rooms/active", "").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::new();

    let response = app
        .get_auth("/api/v1/chat/rooms/active", "not.a.jwt")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_token_signed_with_wrong_secret_is_rejected() {
    let app = TestApp::new();

    let token = forge_token_with_secret(7, "wrong-secret-wrong-secret-wrong-sec!");
    let response = app.get_auth("/api/v1/chat/rooms/active", &token).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Unauthorized: Invalid token");
}

#[tokio::test]
async fn test_post_routes_are_protected_too() {
    let app = TestApp::new();

    let response = app
        .post_json("/api/v1/chat/messages", r#"{"room_id": "x", "content": "hi"}"#)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
