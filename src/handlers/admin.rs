// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::{Validate, ValidationError};

use crate::{
    config::Config,
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    handlers::auth::{USER_COLUMNS, find_user},
    models::{
        question::{
            ChoiceInput, CreateQuestionRequest, Question, QuestionWithChoices,
            UpdateQuestionRequest, validate_choices,
        },
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        user::{AdminCreateUserRequest, AdminUpdateUserRequest, User},
    },
    services::{
        certificate::certificate_path,
        grading::EssayGrader,
        submission::{load_choices, load_questions, load_quiz, load_submission},
    },
    utils::{
        hash::hash_password,
        html::{clean_html, clean_optional},
        jwt::Claims,
    },
};

fn invalid_choices(err: ValidationError) -> AppError {
    AppError::BadRequest(format!("Invalid choices: {}", err.code))
}

fn answered_question_conflict() -> AppError {
    AppError::Conflict("Question has recorded answers and cannot be deleted".to_string())
}

fn user_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Username or email already exists".to_string())
    } else {
        tracing::error!("Failed to write user: {:?}", e);
        AppError::from(e)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Lists all users in the system.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY id DESC",
        USER_COLUMNS
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Creates a new user with a specific role.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let id = sqlx::query(
        r#"
        INSERT INTO users (username, email, password, role, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&hashed_password)
    .bind(payload.role)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(user_conflict)?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(find_user(&pool, id).await?)))
}

/// Updates user information.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    // Check existence
    find_user(&pool, id).await?;

    if payload.username.is_none()
        && payload.email.is_none()
        && payload.role.is_none()
        && payload.password.is_none()
    {
        return Ok(Json(find_user(&pool, id).await?));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(username) = payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username);
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role);
    }

    if let Some(password) = payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(&password)?);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(user_conflict)?;

    Ok(Json(find_user(&pool, id).await?))
}

/// Deletes a user by ID. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

/// Lists every quiz, active or not, newest first.
pub async fn list_quizzes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, title, description, time_limit, mode, is_active, num_questions,
               pass_score, enable_certificate, show_explanation, created_by, created_at
        FROM quizzes
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_quiz(&pool, id).await?))
}

/// Creates a quiz owned by the calling admin.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let id = sqlx::query(
        r#"
        INSERT INTO quizzes
        (title, description, time_limit, mode, is_active, num_questions, pass_score,
         enable_certificate, show_explanation, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(clean_html(&payload.title))
    .bind(clean_optional(payload.description))
    .bind(payload.time_limit)
    .bind(payload.mode)
    .bind(payload.is_active.unwrap_or(true))
    .bind(payload.num_questions)
    .bind(payload.pass_score.unwrap_or(5.0))
    .bind(payload.enable_certificate)
    .bind(payload.show_explanation.unwrap_or(true))
    .bind(claims.user_id()?)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::from(e)
    })?
    .last_insert_rowid();

    tracing::info!(quiz_id = id, "Quiz created");

    Ok((StatusCode::CREATED, Json(load_quiz(&pool, id).await?)))
}

/// Updates a quiz by ID. Absent fields are left unchanged.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.is_empty() {
        return Ok(Json(load_quiz(&pool, id).await?));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(clean_html(&title));
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(&description));
    }

    if payload.clear_time_limit {
        separated.push("time_limit = NULL");
    } else if let Some(time_limit) = payload.time_limit {
        separated.push("time_limit = ");
        separated.push_bind_unseparated(time_limit);
    }

    if let Some(mode) = payload.mode {
        separated.push("mode = ");
        separated.push_bind_unseparated(mode);
    }

    if payload.clear_num_questions {
        separated.push("num_questions = NULL");
    } else if let Some(num_questions) = payload.num_questions {
        separated.push("num_questions = ");
        separated.push_bind_unseparated(num_questions);
    }

    if let Some(pass_score) = payload.pass_score {
        separated.push("pass_score = ");
        separated.push_bind_unseparated(pass_score);
    }

    if let Some(enable_certificate) = payload.enable_certificate {
        separated.push("enable_certificate = ");
        separated.push_bind_unseparated(enable_certificate);
    }

    if let Some(show_explanation) = payload.show_explanation {
        separated.push("show_explanation = ");
        separated.push_bind_unseparated(show_explanation);
    }

    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(Json(load_quiz(&pool, id).await?))
}

/// Deletes a quiz together with its questions, submissions and certificates.
pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let files = sqlx::query_scalar::<_, String>("SELECT file_path FROM certificates WHERE quiz_id = ?")
        .bind(id)
        .fetch_all(&pool)
        .await?;

    let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    for file in files {
        if let Some(path) = certificate_path(&config.cert_folder, &file) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Could not remove certificate file");
            }
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

async fn question_with_choices(
    pool: &SqlitePool,
    question_id: i64,
) -> Result<QuestionWithChoices, AppError> {
    let question = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, type, content, explanation, difficulty, time_limit
        FROM questions
        WHERE id = ?
        "#,
    )
    .bind(question_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let choices = load_choices(pool, &[question.id])
        .await?
        .remove(&question.id)
        .unwrap_or_default();

    Ok(QuestionWithChoices { question, choices })
}

async fn insert_choices(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    question_id: i64,
    choices: &[ChoiceInput],
) -> Result<(), AppError> {
    for choice in choices {
        sqlx::query("INSERT INTO choices (question_id, content, is_correct) VALUES (?, ?, ?)")
            .bind(question_id)
            .bind(clean_html(&choice.content))
            .bind(choice.is_correct)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Lists the quiz's questions with their choices (answer keys included).
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    load_quiz(&pool, quiz_id).await?;

    let questions = load_questions(&pool, quiz_id).await?;
    let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let mut choices = load_choices(&pool, &ids).await?;

    let body: Vec<QuestionWithChoices> = questions
        .into_iter()
        .map(|question| {
            let choices = choices.remove(&question.id).unwrap_or_default();
            QuestionWithChoices { question, choices }
        })
        .collect();

    Ok(Json(body))
}

/// Creates a question and its choices in one transaction.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.check_choices().map_err(invalid_choices)?;

    load_quiz(&pool, quiz_id).await?;

    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO questions
        (quiz_id, type, content, explanation, difficulty, time_limit)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(quiz_id)
    .bind(payload.question_type)
    .bind(clean_html(&payload.content))
    .bind(clean_optional(payload.explanation))
    .bind(payload.difficulty)
    .bind(payload.time_limit)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?
    .last_insert_rowid();

    insert_choices(&mut tx, id, &payload.choices).await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(question_with_choices(&pool, id).await?)))
}

/// Updates a question by ID. A `choices` array replaces the stored set.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = question_with_choices(&pool, id).await?;
    let question_type = payload
        .question_type
        .unwrap_or(current.question.question_type);

    // The choice invariants must hold for whatever set ends up stored.
    let checked = match &payload.choices {
        Some(choices) => validate_choices(question_type, choices),
        None => {
            let existing: Vec<ChoiceInput> = current
                .choices
                .iter()
                .map(|c| ChoiceInput {
                    content: c.content.clone(),
                    is_correct: c.is_correct,
                })
                .collect();
            validate_choices(question_type, &existing)
        }
    };
    checked.map_err(invalid_choices)?;

    let mut tx = pool.begin().await?;

    if payload.question_type.is_some()
        || payload.content.is_some()
        || payload.explanation.is_some()
        || payload.difficulty.is_some()
        || payload.time_limit.is_some()
    {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
        let mut separated = builder.separated(", ");

        if let Some(q_type) = payload.question_type {
            separated.push("type = ");
            separated.push_bind_unseparated(q_type);
        }

        if let Some(content) = payload.content {
            separated.push("content = ");
            separated.push_bind_unseparated(clean_html(&content));
        }

        if let Some(explanation) = payload.explanation {
            separated.push("explanation = ");
            separated.push_bind_unseparated(clean_html(&explanation));
        }

        if let Some(difficulty) = payload.difficulty {
            separated.push("difficulty = ");
            separated.push_bind_unseparated(difficulty);
        }

        if let Some(time_limit) = payload.time_limit {
            separated.push("time_limit = ");
            separated.push_bind_unseparated(time_limit);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        builder.build().execute(&mut *tx).await.map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::from(e)
        })?;
    }

    if let Some(choices) = &payload.choices {
        sqlx::query("DELETE FROM choices WHERE question_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_choices(&mut tx, id, choices).await?;
    }

    tx.commit().await?;

    Ok(Json(question_with_choices(&pool, id).await?))
}

/// Deletes a quiz question by ID.
///
/// Questions that already have recorded answers are kept (409) so past
/// results stay consistent with their stored totals.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let answered = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM answers WHERE question_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await?;

    if answered > 0 {
        return Err(answered_question_conflict());
    }

    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                answered_question_conflict()
            } else {
                tracing::error!("Failed to delete question: {:?}", e);
                AppError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

/// Hands the submission to the essay grader again.
pub async fn regrade_submission(
    State(pool): State<SqlitePool>,
    State(grader): State<Arc<dyn EssayGrader>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submission = load_submission(&pool, id).await?;
    grader.dispatch(submission.id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "submission_id": submission.id,
            "mode": grader.mode(),
        })),
    ))
}
