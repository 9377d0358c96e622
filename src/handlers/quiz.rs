// src/handlers/quiz.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;

use crate::{
    config::{ATTEMPT_TOKEN_TTL_SECS, Config, LEADERBOARD_SIZE},
    error::AppError,
    models::{
        question::PublicQuestion,
        quiz::QuizSummary,
        submission::{LeaderboardEntry, StartQuizResponse},
    },
    services::{
        grading::EssayGrader,
        submission::{
            self as submissions, SubmitOutcome, draw_questions, existing_attempt, load_choices,
            load_questions, load_quiz,
        },
    },
    utils::jwt::{Claims, sign_attempt, verify_attempt},
};

/// Form field carrying the token handed out by `start_quiz`.
pub const ATTEMPT_TOKEN_FIELD: &str = "attempt_token";

pub(crate) fn result_url(submission_id: i64) -> String {
    format!("/api/submissions/{}", submission_id)
}

/// Lists the active quizzes.
pub async fn list_quizzes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, QuizSummary>(
        r#"
        SELECT
            q.id, q.title, q.description, q.time_limit, q.mode, q.num_questions,
            q.pass_score, q.enable_certificate,
            (SELECT COUNT(*) FROM questions WHERE quiz_id = q.id) AS question_count
        FROM quizzes q
        WHERE q.is_active = 1
        ORDER BY q.created_at DESC, q.id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list quizzes: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(quizzes))
}

/// Starts an attempt.
///
/// * Exam-mode quizzes already attempted redirect to the earlier result.
/// * Otherwise draws the question sample and returns it without answer keys,
///   together with a signed token that pins the drawn questions.
pub async fn start_quiz(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user_id = claims.user_id()?;
    let quiz = load_quiz(&pool, id).await?;

    if quiz.is_exam() {
        if let Some(existing) = existing_attempt(&pool, user_id, quiz.id).await? {
            tracing::debug!(user_id, quiz_id = quiz.id, existing, "Exam already taken");
            return Ok(Redirect::to(&result_url(existing)).into_response());
        }
    }

    let presented = draw_questions(load_questions(&pool, quiz.id).await?, &quiz);
    let question_ids: Vec<i64> = presented.iter().map(|q| q.id).collect();
    let mut choices = load_choices(&pool, &question_ids).await?;

    let questions = presented
        .into_iter()
        .map(|q| {
            let options = choices.remove(&q.id).unwrap_or_default();
            PublicQuestion::new(q, options)
        })
        .collect();

    let attempt_token = sign_attempt(
        user_id,
        quiz.id,
        question_ids,
        &config.secret_key,
        ATTEMPT_TOKEN_TTL_SECS,
    )?;

    Ok(Json(StartQuizResponse {
        quiz,
        questions,
        attempt_token,
        expires_in: ATTEMPT_TOKEN_TTL_SECS,
    })
    .into_response())
}

/// Grades a posted attempt and redirects to its result. A repeat attempt at
/// an exam redirects to the first result instead.
///
/// The form carries one `q_{question_id}` field per question plus
/// `time_spent` and, optionally, the attempt token.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    State(grader): State<Arc<dyn EssayGrader>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let user_id = claims.user_id()?;
    let quiz = load_quiz(&pool, id).await?;

    if quiz.is_exam() {
        if let Some(existing) = existing_attempt(&pool, user_id, quiz.id).await? {
            return Ok(Redirect::to(&result_url(existing)).into_response());
        }
    }

    let pinned = form
        .get(ATTEMPT_TOKEN_FIELD)
        .and_then(|token| verify_attempt(token, &config.secret_key, user_id, quiz.id));

    let outcome =
        submissions::submit_quiz(&pool, grader.as_ref(), user_id, &quiz, &form, pinned).await?;

    let submission_id = match outcome {
        SubmitOutcome::Created(submission) => submission.id,
        SubmitOutcome::AlreadyTaken(existing) => existing,
    };

    Ok(Redirect::to(&result_url(submission_id)).into_response())
}

/// Best score of each user on the quiz, top 10.
pub async fn leaderboard(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(&pool, id).await?;

    let entries = sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT
            u.id AS user_id,
            u.username,
            MAX(s.score) AS best_score,
            COUNT(s.id) AS attempts
        FROM submissions s
        JOIN users u ON s.user_id = u.id
        WHERE s.quiz_id = ?
        GROUP BY u.id, u.username
        ORDER BY best_score DESC, attempts ASC, u.username ASC
        LIMIT ?
        "#,
    )
    .bind(quiz.id)
    .bind(LEADERBOARD_SIZE)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(entries))
}
