// src/handlers/submission.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::submission::{AnswerDetail, HistoryEntry, ScorePoint, SubmissionResult},
    services::{
        certificate::ensure_certificate,
        submission::{load_quiz, load_submission},
    },
    utils::jwt::Claims,
};

/// The caller's submissions, newest first.
pub async fn history(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let entries = sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT
            s.id, s.quiz_id, q.title AS quiz_title, s.total_questions,
            s.correct_answers, s.score, s.time_spent, s.created_at
        FROM submissions s
        JOIN quizzes q ON s.quiz_id = q.id
        WHERE s.user_id = ?
        ORDER BY s.created_at DESC, s.id DESC
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(entries))
}

/// Result view of one submission.
///
/// Visible to its owner and to admins. Issues the certificate on first view
/// when the quiz awards one and the score passes.
pub async fn view_result(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submission = load_submission(&pool, id).await?;
    claims.require_view(submission.user_id)?;

    let quiz = load_quiz(&pool, submission.quiz_id).await?;

    let mut answers = sqlx::query_as::<_, AnswerDetail>(
        r#"
        SELECT
            a.id, a.question_id, q.type, q.content, a.user_answer,
            a.is_correct, a.score, a.checked, q.explanation
        FROM answers a
        JOIN questions q ON a.question_id = q.id
        WHERE a.submission_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(submission.id)
    .fetch_all(&pool)
    .await?;

    if !quiz.show_explanation {
        for answer in &mut answers {
            answer.explanation = None;
        }
    }

    let history = sqlx::query_as::<_, ScorePoint>(
        r#"
        SELECT id AS submission_id, score, created_at
        FROM submissions
        WHERE user_id = ? AND quiz_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(submission.user_id)
    .bind(submission.quiz_id)
    .fetch_all(&pool)
    .await?;

    let certificate = if quiz.awards_certificate(submission.score) {
        Some(ensure_certificate(&pool, &config.cert_folder, &submission).await?)
    } else {
        None
    };

    Ok(Json(SubmissionResult {
        passed: submission.score >= quiz.pass_score,
        submission,
        quiz,
        answers,
        certificate,
        history,
    }))
}
