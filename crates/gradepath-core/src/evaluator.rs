//! Single-answer evaluation against a question definition.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{Correctness, Question, QuestionType, SubmittedAnswer};

/// Outcome of grading one answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub correctness: Correctness,
    pub points_earned: f64,
}

impl Evaluation {
    fn graded(correct: bool, points: u32) -> Self {
        Self {
            correctness: Correctness::from_bool(correct),
            points_earned: if correct { points as f64 } else { 0.0 },
        }
    }

    fn pending() -> Self {
        Self {
            correctness: Correctness::PendingReview,
            points_earned: 0.0,
        }
    }
}

/// Grades objective answers. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerEvaluator;

impl AnswerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Grade `answer` against `question`.
    ///
    /// Option questions need an exact set match. Text questions compare
    /// trimmed strings, lower-cased unless the question is case sensitive.
    /// Essays, uploads, and text questions without any reference answer
    /// come back as [`Correctness::PendingReview`] with zero points.
    pub fn evaluate(&self, question: &Question, answer: &SubmittedAnswer) -> Evaluation {
        match question.question_type {
            QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                Self::evaluate_options(question, answer)
            }
            QuestionType::ShortAnswer | QuestionType::Enumeration => {
                Self::evaluate_text(question, answer)
            }
            QuestionType::Essay | QuestionType::FileUpload => Evaluation::pending(),
        }
    }

    fn evaluate_options(question: &Question, answer: &SubmittedAnswer) -> Evaluation {
        let correct: BTreeSet<&str> = question.correct_option_ids().into_iter().collect();

        if correct.is_empty() {
            tracing::warn!(
                "question {} has no correct option, answer from {} marked incorrect",
                question.id,
                answer.student_id
            );
            return Evaluation::graded(false, question.points);
        }
        if question.question_type == QuestionType::TrueFalse && question.options.len() != 2 {
            tracing::warn!(
                "true/false question {} has {} options, answer from {} marked incorrect",
                question.id,
                question.options.len(),
                answer.student_id
            );
            return Evaluation::graded(false, question.points);
        }

        let selected: BTreeSet<&str> = answer
            .selected_option_ids
            .iter()
            .map(String::as_str)
            .collect();

        Evaluation::graded(selected == correct, question.points)
    }

    fn evaluate_text(question: &Question, answer: &SubmittedAnswer) -> Evaluation {
        let submitted = answer.answer_text.as_deref().unwrap_or("").trim();
        if submitted.is_empty() {
            return Evaluation::graded(false, question.points);
        }

        let references: Vec<&str> = if question
            .acceptable_answers
            .iter()
            .any(|a| !a.trim().is_empty())
        {
            question
                .acceptable_answers
                .iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .collect()
        } else {
            question
                .correct_answer
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .into_iter()
                .collect()
        };

        if references.is_empty() {
            return Evaluation::pending();
        }

        let matches = |reference: &str| {
            if question.case_sensitive {
                reference == submitted
            } else {
                reference.to_lowercase() == submitted.to_lowercase()
            }
        };

        Evaluation::graded(references.into_iter().any(matches), question.points)
    }
}
