// tests/common/mod.rs

#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use quiz_backend::{
    config::Config,
    db,
    models::user::Role,
    routes,
    services::grading::{EssayGrader, InlineGrader},
    state::AppState,
    utils::hash::hash_password,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub cert_folder: PathBuf,
    /// Does not follow redirects so tests can inspect `Location`.
    pub client: reqwest::Client,
}

/// Spawns the app on a random port with inline essay grading.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|pool| Arc::new(InlineGrader::new(pool))).await
}

/// Spawns the app on a random port against a fresh SQLite file.
/// `grader` builds the essay grader installed in the state.
pub async fn spawn_app_with<F>(grader: F) -> TestApp
where
    F: FnOnce(SqlitePool) -> Arc<dyn EssayGrader>,
{
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let root = std::env::temp_dir().join(format!("quiz_test_{}", run_id));
    let cert_folder = root.join("certificates");
    std::fs::create_dir_all(&cert_folder).expect("Failed to create test folder");

    let database_url = format!("sqlite://{}", root.join("quiz.db").display());

    // 1. Create a pool and run migrations
    let pool = db::connect(&database_url)
        .await
        .expect("Failed to open test database");
    db::migrate(&pool).await.expect("Failed to migrate database");

    // 2. Create test configuration and state
    let config = Config {
        database_url,
        secret_key: "test_secret_for_integration_tests".to_string(),
        session_expiration: 600, // 10 minutes for tests
        broker_url: None,
        result_backend_url: None,
        cert_folder: cert_folder.clone(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        rust_log: "error".to_string(),
        admin_username: None,
        admin_email: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        grader: grader(pool.clone()),
    };

    let app = routes::create_router(state);

    // 3. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    // 4. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        cert_folder,
        client,
    }
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn login(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({"username": username, "password": PASSWORD}))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200, "login failed for {}", username);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Registers a student and returns (user id, session token).
    pub async fn student(&self) -> (i64, String) {
        let username = unique_name("stu");
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        let id = body["id"].as_i64().unwrap();
        (id, self.login(&username).await)
    }

    /// Inserts an admin directly and returns its session token.
    pub async fn admin(&self) -> String {
        let username = unique_name("adm");
        sqlx::query(
            "INSERT INTO users (username, email, password, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&username)
        .bind(format!("{}@example.com", username))
        .bind(hash_password(PASSWORD).unwrap())
        .bind(Role::Admin)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .expect("Failed to insert admin");

        self.login(&username).await
    }

    pub async fn create_quiz(&self, admin: &str, body: Value) -> i64 {
        let response = self
            .client
            .post(self.url("/api/admin/quizzes"))
            .bearer_auth(admin)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let quiz: Value = response.json().await.unwrap();
        quiz["id"].as_i64().unwrap()
    }

    pub async fn create_question(&self, admin: &str, quiz_id: i64, body: Value) -> Value {
        let response = self
            .client
            .post(self.url(&format!("/api/admin/quizzes/{}/questions", quiz_id)))
            .bearer_auth(admin)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        response.json().await.unwrap()
    }

    /// Creates an MCQ with one correct and one wrong choice.
    /// Returns (question id, correct choice id, wrong choice id).
    pub async fn create_mcq(&self, admin: &str, quiz_id: i64, content: &str) -> (i64, i64, i64) {
        let question = self
            .create_question(
                admin,
                quiz_id,
                json!({
                    "type": "mcq",
                    "content": content,
                    "explanation": "Because.",
                    "choices": [
                        {"content": "right", "is_correct": true},
                        {"content": "wrong", "is_correct": false},
                    ],
                }),
            )
            .await;

        let choices = question["choices"].as_array().unwrap();
        let correct = choices.iter().find(|c| c["is_correct"] == true).unwrap();
        let wrong = choices.iter().find(|c| c["is_correct"] == false).unwrap();

        (
            question["id"].as_i64().unwrap(),
            correct["id"].as_i64().unwrap(),
            wrong["id"].as_i64().unwrap(),
        )
    }

    /// Posts the quiz form and returns the `Location` of the redirect.
    pub async fn submit(&self, token: &str, quiz_id: i64, form: &[(String, String)]) -> String {
        let response = self
            .client
            .post(self.url(&format!("/api/quizzes/{}/submit", quiz_id)))
            .bearer_auth(token)
            .form(form)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 303);

        location(&response)
    }

    pub async fn get_json(&self, token: &str, path: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request");
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("Missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn answer(question_id: i64, value: impl ToString) -> (String, String) {
    (format!("q_{}", question_id), value.to_string())
}
