// tests/auth_tests.rs

mod common;

use common::{PASSWORD, spawn_app, unique_name};
use serde_json::{Value, json};

#[tokio::test]
async fn unknown_route_is_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_hides_password() {
    // Arrange
    let app = spawn_app().await;
    let username = unique_name("u");

    // Act
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["username"], username.as_str());
    assert_eq!(body["role"], "student");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    // Arrange
    let app = spawn_app().await;
    let username = unique_name("u");
    let payload = json!({
        "username": username,
        "email": format!("{}@example.com", username),
        "password": PASSWORD,
    });

    let first = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    // Act: same username again
    let duplicate = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&payload)
        .send()
        .await
        .unwrap();

    // Act: username too short, email malformed
    let invalid = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({"username": "yo", "email": "nope", "password": PASSWORD}))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(duplicate.status().as_u16(), 409);
    assert_eq!(invalid.status().as_u16(), 400);
}

#[tokio::test]
async fn login_rejects_unknown_user_and_wrong_password() {
    // Arrange
    let app = spawn_app().await;
    let username = unique_name("u");
    app.client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    // Act
    let unknown = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"username": "nobody_here", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    let wrong = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"username": username, "password": "not-the-password"}))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(unknown.status().as_u16(), 401);
    assert_eq!(wrong.status().as_u16(), 401);
    let unknown: Value = unknown.json().await.unwrap();
    let wrong: Value = wrong.json().await.unwrap();
    assert_eq!(unknown["error"], wrong["error"]);
}

#[tokio::test]
async fn session_works_with_bearer_and_cookie() {
    // Arrange
    let app = spawn_app().await;
    let (id, token) = app.student().await;

    // Act: bearer header
    let (status, me) = app.get_json(&token, "/api/auth/me").await;

    // Act: cookie only
    let by_cookie = app
        .client
        .get(app.url("/api/auth/me"))
        .header(reqwest::header::COOKIE, format!("session={}", token))
        .send()
        .await
        .unwrap();

    // Act: nothing
    let anonymous = app.client.get(app.url("/api/auth/me")).send().await.unwrap();

    // Assert
    assert_eq!(status, 200);
    assert_eq!(me["id"].as_i64(), Some(id));
    assert_eq!(by_cookie.status().as_u16(), 200);
    assert_eq!(anonymous.status().as_u16(), 401);
}

#[tokio::test]
async fn login_sets_session_cookie_and_logout_clears_it() {
    // Arrange
    let app = spawn_app().await;
    let username = unique_name("u");
    app.client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    // Act
    let login = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"username": username, "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    let set_cookie = login
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());

    let logout = app
        .client
        .post(app.url("/api/auth/logout"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(login.status().as_u16(), 200);
    let set_cookie = set_cookie.expect("login should set the session cookie");
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert_eq!(logout.status().as_u16(), 204);
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    // Arrange
    let app = spawn_app().await;
    let (_, token) = app.student().await;
    let tampered = format!("{}x", token);

    // Act
    let (status, body) = app.get_json(&tampered, "/api/quizzes").await;

    // Assert
    assert_eq!(status, 401);
    assert!(body["error"].is_string());
}
