// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::{Validate, ValidationError};

/// Question kinds. Only `mcq` and `true_false` are graded automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Mcq,
    TrueFalse,
    Essay,
}

impl QuestionType {
    pub fn is_auto_graded(self) -> bool {
        !matches!(self, QuestionType::Essay)
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub content: String,

    /// Explanation of the correct answer, shown after submission when the quiz allows it.
    pub explanation: Option<String>,

    /// Free text: easy / medium / hard.
    pub difficulty: Option<String>,

    /// Seconds.
    pub time_limit: Option<i64>,
}

/// Represents the 'choices' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub content: String,
    pub is_correct: bool,
}

/// Admin view of a question together with its choices.
#[derive(Debug, Serialize)]
pub struct QuestionWithChoices {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
}

/// Choice as shown to a student taking the quiz (no correctness flag).
#[derive(Debug, Serialize)]
pub struct PublicChoice {
    pub id: i64,
    pub content: String,
}

/// Question as shown to a student taking the quiz.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub difficulty: Option<String>,
    pub time_limit: Option<i64>,
    /// Name of the form field the answer must be posted under.
    pub field: String,
    pub choices: Vec<PublicChoice>,
}

impl PublicQuestion {
    pub fn new(question: Question, choices: Vec<Choice>) -> Self {
        Self {
            id: question.id,
            field: answer_field_name(question.id),
            question_type: question.question_type,
            content: question.content,
            difficulty: question.difficulty,
            time_limit: question.time_limit,
            choices: choices
                .into_iter()
                .map(|c| PublicChoice {
                    id: c.id,
                    content: c.content,
                })
                .collect(),
        }
    }
}

/// Form field carrying the answer for a question.
pub fn answer_field_name(question_id: i64) -> String {
    format!("q_{}", question_id)
}

/// A choice in a create/update question request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChoiceInput {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    #[validate(length(max = 20))]
    pub difficulty: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i64>,
    #[validate(nested)]
    #[serde(default)]
    pub choices: Vec<ChoiceInput>,
}

impl CreateQuestionRequest {
    pub fn check_choices(&self) -> Result<(), ValidationError> {
        validate_choices(self.question_type, &self.choices)
    }
}

/// DTO for updating a question. Fields are optional; `choices` replaces the whole set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    #[validate(length(min = 1, max = 5000))]
    pub content: Option<String>,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    #[validate(length(max = 20))]
    pub difficulty: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i64>,
    #[validate(nested)]
    pub choices: Option<Vec<ChoiceInput>>,
}

/// Enforces the choice invariants when a question's choices are written:
/// at most one correct choice for auto-graded questions, exactly two choices
/// for true/false, and no correct choice on an essay question.
pub fn validate_choices(
    question_type: QuestionType,
    choices: &[ChoiceInput],
) -> Result<(), ValidationError> {
    let correct = choices.iter().filter(|c| c.is_correct).count();

    match question_type {
        QuestionType::Essay => {
            if correct > 0 {
                return Err(ValidationError::new("essay_has_no_correct_choice"));
            }
        }
        QuestionType::Mcq | QuestionType::TrueFalse => {
            if correct > 1 {
                return Err(ValidationError::new("multiple_correct_choices"));
            }
            if question_type == QuestionType::TrueFalse && !choices.is_empty() && choices.len() != 2
            {
                return Err(ValidationError::new("true_false_needs_two_choices"));
            }
        }
    }

    Ok(())
}
