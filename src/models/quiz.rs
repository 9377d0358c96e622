// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// `exam` quizzes can be attempted once per user; `practice` quizzes any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuizMode {
    #[default]
    Exam,
    Practice,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Minutes. `None` means no limit.
    pub time_limit: Option<i64>,

    pub mode: QuizMode,
    pub is_active: bool,

    /// How many questions are drawn per attempt. `None` draws all of them.
    pub num_questions: Option<i64>,

    /// Passing score on the 0-10 scale.
    pub pass_score: f64,

    pub enable_certificate: bool,
    pub show_explanation: bool,
    pub created_by: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Quiz {
    pub fn is_exam(&self) -> bool {
        self.mode == QuizMode::Exam
    }

    /// Whether a submission with this score earns a certificate.
    pub fn awards_certificate(&self, score: f64) -> bool {
        self.enable_certificate && score >= self.pass_score
    }
}

/// Public listing row for students.
#[derive(Debug, Serialize, FromRow)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_limit: Option<i64>,
    pub mode: QuizMode,
    pub num_questions: Option<i64>,
    pub pass_score: f64,
    pub enable_certificate: bool,
    pub question_count: i64,
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i64>,
    #[serde(default)]
    pub mode: QuizMode,
    #[validate(range(min = 1, message = "num_questions must be at least 1"))]
    pub num_questions: Option<i64>,
    #[validate(range(min = 0.0, max = 10.0, message = "pass_score must be between 0 and 10"))]
    pub pass_score: Option<f64>,
    #[serde(default)]
    pub enable_certificate: bool,
    pub show_explanation: Option<bool>,
    pub is_active: Option<bool>,
}

/// DTO for updating a quiz. Fields are optional.
///
/// A missing `num_questions`/`time_limit` leaves the column alone; use
/// `clear_num_questions`/`clear_time_limit` to reset them to unset.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i64>,
    #[serde(default)]
    pub clear_time_limit: bool,
    pub mode: Option<QuizMode>,
    #[validate(range(min = 1, message = "num_questions must be at least 1"))]
    pub num_questions: Option<i64>,
    #[serde(default)]
    pub clear_num_questions: bool,
    #[validate(range(min = 0.0, max = 10.0, message = "pass_score must be between 0 and 10"))]
    pub pass_score: Option<f64>,
    pub enable_certificate: Option<bool>,
    pub show_explanation: Option<bool>,
    pub is_active: Option<bool>,
}

impl UpdateQuizRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.time_limit.is_none()
            && !self.clear_time_limit
            && self.mode.is_none()
            && self.num_questions.is_none()
            && !self.clear_num_questions
            && self.pass_score.is_none()
            && self.enable_certificate.is_none()
            && self.show_explanation.is_none()
            && self.is_active.is_none()
    }
}
