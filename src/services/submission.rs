// src/services/submission.rs

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::{
        question::{Choice, Question, QuestionType, answer_field_name},
        quiz::Quiz,
        submission::Submission,
    },
    services::{
        grading::EssayGrader,
        scoring::{self, GradedAnswer},
    },
};

/// Form field carrying the client-measured duration in seconds.
pub const TIME_SPENT_FIELD: &str = "time_spent";

const QUIZ_COLUMNS: &str = "id, title, description, time_limit, mode, is_active, num_questions, \
     pass_score, enable_certificate, show_explanation, created_by, created_at";

const SUBMISSION_COLUMNS: &str = "id, user_id, quiz_id, total_questions, correct_answers, score, \
     time_spent, created_at, finished_at";

pub async fn load_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {} FROM quizzes WHERE id = ?", QUIZ_COLUMNS))
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

pub async fn load_submission(pool: &SqlitePool, submission_id: i64) -> Result<Submission, AppError> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {} FROM submissions WHERE id = ?",
        SUBMISSION_COLUMNS
    ))
    .bind(submission_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Submission not found".to_string()))
}

/// The user's first submission to the quiz, if any. Exam-mode quizzes send
/// repeat attempts here instead of grading again.
pub async fn existing_attempt(
    pool: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
) -> Result<Option<i64>, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM submissions WHERE user_id = ? AND quiz_id = ? ORDER BY id ASC LIMIT 1",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

pub async fn load_questions(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, type, content, explanation, difficulty, time_limit
        FROM questions
        WHERE quiz_id = ?
        ORDER BY id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

/// Choices of the given questions, grouped by question id.
pub async fn load_choices(
    pool: &SqlitePool,
    question_ids: &[i64],
) -> Result<HashMap<i64, Vec<Choice>>, AppError> {
    if question_ids.is_empty() {
        return Ok(HashMap::new());
    }

    // Use QueryBuilder for dynamic IN clause
    let mut query_builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, question_id, content, is_correct FROM choices WHERE question_id IN (",
    );

    let mut separated = query_builder.separated(",");
    for id in question_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let choices: Vec<Choice> = query_builder.build_query_as().fetch_all(pool).await?;

    let mut grouped: HashMap<i64, Vec<Choice>> = HashMap::new();
    for choice in choices {
        grouped.entry(choice.question_id).or_default().push(choice);
    }

    Ok(grouped)
}

/// Questions to present for a new attempt: a random sample of the bank,
/// capped at the quiz's `num_questions`.
pub fn draw_questions(bank: Vec<Question>, quiz: &Quiz) -> Vec<Question> {
    scoring::select_questions(bank, quiz.num_questions, &mut rand::thread_rng())
}

/// Questions to grade for a submission. When the start endpoint pinned the
/// presented set, grade exactly those that still exist; otherwise draw afresh.
fn questions_to_grade(bank: Vec<Question>, quiz: &Quiz, pinned: Option<Vec<i64>>) -> Vec<Question> {
    let Some(ids) = pinned else {
        return draw_questions(bank, quiz);
    };

    let mut by_id: HashMap<i64, Question> = bank.into_iter().map(|q| (q.id, q)).collect();
    let picked: Vec<Question> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

    if picked.is_empty() && !by_id.is_empty() {
        return draw_questions(by_id.into_values().collect(), quiz);
    }

    picked
}

fn posted_answer<'a>(form: &'a HashMap<String, String>, question_id: i64) -> Option<&'a str> {
    form.get(&answer_field_name(question_id))
        .or_else(|| form.get(&question_id.to_string()))
        .map(String::as_str)
}

/// What became of a posted attempt.
#[derive(Debug)]
pub enum SubmitOutcome {
    Created(Submission),
    /// Exam already attempted; carries the earlier submission id.
    AlreadyTaken(i64),
}

/// Grades a posted quiz form and stores the submission with its answers in
/// one transaction. Essay grading is dispatched after the commit.
///
/// `pinned` is the question set signed into the attempt token, if the client
/// sent a valid one.
pub async fn submit_quiz(
    pool: &SqlitePool,
    grader: &dyn EssayGrader,
    user_id: i64,
    quiz: &Quiz,
    form: &HashMap<String, String>,
    pinned: Option<Vec<i64>>,
) -> Result<SubmitOutcome, AppError> {
    let bank = load_questions(pool, quiz.id).await?;
    let questions = questions_to_grade(bank, quiz, pinned);

    let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let choices = load_choices(pool, &question_ids).await?;

    let graded: Vec<GradedAnswer> = questions
        .iter()
        .map(|q| {
            let options = choices.get(&q.id).map(Vec::as_slice).unwrap_or_default();
            scoring::grade_answer(q, posted_answer(form, q.id), options)
        })
        .collect();

    let (correct_answers, total_questions) = scoring::tally(&graded);
    let score = scoring::compute_score(correct_answers, total_questions);
    let time_spent =
        scoring::parse_time_spent(form.get(TIME_SPENT_FIELD).map(String::as_str));
    let has_essay = questions
        .iter()
        .any(|q| q.question_type == QuestionType::Essay);
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    // Must stay the first statement of the transaction: the write lock is
    // taken before the exam check reads, so concurrent attempts serialize.
    let inserted = sqlx::query(
        r#"
        INSERT INTO submissions
        (user_id, quiz_id, total_questions, correct_answers, score, time_spent, created_at, finished_at)
        SELECT ?, ?, ?, ?, ?, ?, ?, ?
        WHERE NOT ? OR NOT EXISTS (
            SELECT 1 FROM submissions WHERE user_id = ? AND quiz_id = ?
        )
        "#,
    )
    .bind(user_id)
    .bind(quiz.id)
    .bind(total_questions)
    .bind(correct_answers)
    .bind(score)
    .bind(time_spent)
    .bind(now)
    .bind(now)
    .bind(quiz.is_exam())
    .bind(user_id)
    .bind(quiz.id)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        drop(tx);
        let existing = existing_attempt(pool, user_id, quiz.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Exam attempt vanished".to_string()))?;
        tracing::debug!(user_id, quiz_id = quiz.id, existing, "Exam already taken");
        return Ok(SubmitOutcome::AlreadyTaken(existing));
    }

    let submission_id = inserted.last_insert_rowid();

    for answer in &graded {
        sqlx::query(
            r#"
            INSERT INTO answers
            (submission_id, question_id, user_answer, is_correct, score, checked)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(submission_id)
        .bind(answer.question_id)
        .bind(&answer.user_answer)
        .bind(answer.is_correct)
        .bind(answer.score)
        .bind(answer.checked)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        submission_id,
        user_id,
        quiz_id = quiz.id,
        correct_answers,
        total_questions,
        score,
        "Quiz submitted"
    );

    if has_essay {
        // The submission is already durable; a failed dispatch is retried
        // through the admin re-grade endpoint rather than failing the attempt.
        if let Err(e) = grader.dispatch(submission_id).await {
            tracing::error!(submission_id, mode = grader.mode(), error = %e, "Essay grading dispatch failed");
        }
    }

    Ok(SubmitOutcome::Created(
        load_submission(pool, submission_id).await?,
    ))
}
