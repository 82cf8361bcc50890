use std::collections::HashMap;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;

mod common;
use common::mock_app::{MockApp, TEST_PASSWORD};

#[tokio::test]
async fn test_register_and_duplicate_username() {
    let app = MockApp::new().await;

    let request = app.request(
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"username": "new_user", "password": "password123"})),
    );
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert!(body["user_id"].is_i64());

    let request = app.request(
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"username": "new_user", "password": "other"})),
    );
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login() {
    let app = MockApp::new().await;
    let (user, _) = app.register_user("login_user").await;

    let request = app.request(
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"username": "login_user", "password": TEST_PASSWORD})),
    );
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user.id);

    let request = app.request(
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"username": "login_user", "password": "wrong_password"})),
    );
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = app.request(
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"username": "nobody", "password": TEST_PASSWORD})),
    );
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_routes_require_valid_token() {
    let app = MockApp::new().await;

    let request = app.request(Method::GET, "/api/sensor", None, None);
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = app.request(Method::GET, "/api/sensor", Some("garbage"), None);
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a well-formed token signed with the right key but for a deleted user
    let (user, token) = app.register_user("ghost").await;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(app.storage.get_pool())
        .await
        .unwrap();

    let request = app.request(Method::GET, "/api/sensor", Some(&token.token), None);
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = MockApp::new().await;
    let (user, _) = app.register_user("short_lived").await;

    let token = app
        .token_service
        .issue(&user, HashMap::new(), Some(0))
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let request = app.request(Method::GET, "/api/sensor", Some(&token.token), None);
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_account_deletion_cascades() {
    let app = MockApp::new().await;
    let (user, token) = app.register_user("doomed").await;
    let sensor = app.create_sensor(user.id, "s1").await;
    app.insert_reading(sensor.id, Some(1.0), Utc::now()).await;

    let request = app.request(Method::DELETE, "/api/auth/account", Some(&token.token), None);
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.count_sensors().await, 0);
    assert_eq!(app.count_readings().await, 0);
}
