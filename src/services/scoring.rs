// src/services/scoring.rs
//
// Pure grading arithmetic. No database access happens here.

use rand::{Rng, seq::SliceRandom};

use crate::models::question::{Choice, Question};

/// Outcome of grading one posted answer, ready to be stored as an `answers` row.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
    pub score: f64,
    pub checked: bool,
}

/// Shuffles the question bank and keeps the first `limit` entries.
///
/// A missing or non-positive `limit`, or one at least as large as the bank,
/// keeps every question (in shuffled order).
pub fn select_questions<T, R>(mut questions: Vec<T>, limit: Option<i64>, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    questions.shuffle(rng);

    if let Some(limit) = limit.filter(|n| *n > 0) {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if limit < questions.len() {
            questions.truncate(limit);
        }
    }

    questions
}

/// Grades a single answer.
///
/// `choices` are the choices stored for `question`. For mcq/true-false the raw
/// value must parse as the id of one of them and that choice must be flagged
/// correct; anything else (absent, non-numeric, foreign id) is simply wrong.
/// Essay answers are stored unchecked with a zero score until graded.
pub fn grade_answer(question: &Question, raw: Option<&str>, choices: &[Choice]) -> GradedAnswer {
    let user_answer = raw.unwrap_or_default().to_string();

    if !question.question_type.is_auto_graded() {
        return GradedAnswer {
            question_id: question.id,
            user_answer,
            is_correct: false,
            score: 0.0,
            checked: false,
        };
    }

    let is_correct = raw
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|choice_id| {
            choices
                .iter()
                .find(|c| c.id == choice_id && c.question_id == question.id)
        })
        .is_some_and(|choice| choice.is_correct);

    GradedAnswer {
        question_id: question.id,
        user_answer,
        is_correct,
        score: if is_correct { 1.0 } else { 0.0 },
        checked: true,
    }
}

/// Score on the 0-10 scale.
pub fn compute_score(correct_answers: i64, total_questions: i64) -> f64 {
    if total_questions > 0 {
        (correct_answers as f64 / total_questions as f64) * 10.0
    } else {
        0.0
    }
}

/// Seconds spent as reported by the client. Garbage and negatives become 0.
pub fn parse_time_spent(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .map(|secs| secs.max(0))
        .unwrap_or(0)
}

/// Returns `(correct_answers, total_questions)`.
pub fn tally(answers: &[GradedAnswer]) -> (i64, i64) {
    let correct = answers.iter().filter(|a| a.is_correct).count() as i64;
    (correct, answers.len() as i64)
}
