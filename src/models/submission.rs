// src/models/submission.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{certificate::Certificate, question::QuestionType, quiz::Quiz};

/// Represents the 'submissions' table in the database.
/// One graded attempt of a user at a quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub total_questions: i64,
    pub correct_answers: i64,
    /// 0-10 scale.
    pub score: f64,
    /// Seconds, as reported by the client.
    pub time_spent: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'answers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub submission_id: i64,
    pub question_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
    pub score: f64,
    /// False for essay answers until the grading task has run.
    pub checked: bool,
}

/// Answer row joined with the question it belongs to, for the result view.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnswerDetail {
    pub id: i64,
    pub question_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub user_answer: String,
    pub is_correct: bool,
    pub score: f64,
    pub checked: bool,
    pub explanation: Option<String>,
}

/// One point of the per-quiz score chart.
#[derive(Debug, Serialize, FromRow)]
pub struct ScorePoint {
    pub submission_id: i64,
    pub score: f64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Row of the submission history list.
#[derive(Debug, Serialize, FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub score: f64,
    pub time_spent: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Aggregated struct for displaying the leaderboard.
/// Best score of each user on one quiz.
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: String,
    pub best_score: f64,
    pub attempts: i64,
}

/// Everything the result screen shows.
#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub submission: Submission,
    pub quiz: Quiz,
    pub passed: bool,
    pub answers: Vec<AnswerDetail>,
    pub certificate: Option<Certificate>,
    pub history: Vec<ScorePoint>,
}

/// Response of the quiz start endpoint.
#[derive(Debug, Serialize)]
pub struct StartQuizResponse {
    pub quiz: Quiz,
    pub questions: Vec<crate::models::question::PublicQuestion>,
    pub attempt_token: String,
    pub expires_in: u64, // seconds
}
