//! Activity-level aggregation of per-question results.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};
use crate::evaluator::AnswerEvaluator;
use crate::model::{
    round2, Activity, ActivityResult, ActivityStatus, Correctness, Question, SubmittedAnswer,
};

/// A grade entered by a human for work without discrete questions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualGrade {
    pub score: f64,
    pub max_score: f64,
}

/// Aggregated score of one student's work on one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityScore {
    pub score: f64,
    pub max_score: f64,
    pub percentage_score: f64,
    /// Answers still waiting for a human grader.
    pub pending_review: usize,
    /// The submitted answers with their evaluation applied.
    #[serde(default)]
    pub graded_answers: Vec<SubmittedAnswer>,
}

impl ActivityScore {
    pub fn has_pending_review(&self) -> bool {
        self.pending_review > 0
    }
}

/// `score / max * 100` rounded to two decimals, zero when nothing is possible.
pub fn percentage(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 {
        round2(score / max_score * 100.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityScorer {
    evaluator: AnswerEvaluator,
}

impl ActivityScorer {
    pub fn new() -> Self {
        Self {
            evaluator: AnswerEvaluator::new(),
        }
    }

    /// Score every answer a student submitted for `activity`.
    ///
    /// `max_score` counts all of the activity's questions, answered or not.
    /// Manually graded answers keep their stored points. Answers to
    /// questions outside the activity are dropped and logged.
    pub fn score(
        &self,
        activity: &Activity,
        questions: &[Question],
        answers: &[SubmittedAnswer],
    ) -> ActivityScore {
        let mut owned: HashMap<&str, &Question> = HashMap::new();
        for question in questions {
            if question.activity_id == activity.id {
                owned.insert(question.id.as_str(), question);
            } else {
                tracing::warn!(
                    "{}",
                    GradeError::InconsistentState(format!(
                        "question {} belongs to activity {}, not {}",
                        question.id, question.activity_id, activity.id
                    ))
                );
            }
        }

        let max_score = owned.values().fold(0.0, |acc, q| acc + q.points as f64);

        // Later submissions for the same question replace earlier ones.
        let mut latest: HashMap<&str, &SubmittedAnswer> = HashMap::new();
        for answer in answers {
            if owned.contains_key(answer.question_id.as_str()) {
                latest.insert(answer.question_id.as_str(), answer);
            } else {
                tracing::warn!(
                    "{}",
                    GradeError::InconsistentState(format!(
                        "answer from {} references question {} outside activity {}",
                        answer.student_id, answer.question_id, activity.id
                    ))
                );
            }
        }

        let mut score = 0.0;
        let mut pending_review = 0;
        let mut graded_answers = Vec::with_capacity(latest.len());

        let mut seen: HashSet<&str> = HashSet::with_capacity(owned.len());
        for question in questions.iter().filter(|q| owned.contains_key(q.id.as_str())) {
            if !seen.insert(question.id.as_str()) {
                continue;
            }
            let Some(answer) = latest.get(question.id.as_str()) else {
                continue;
            };
            let mut graded = (*answer).clone();

            if answer.is_manually_graded() {
                graded.points_earned = answer.points_earned.clamp(0.0, question.points as f64);
            } else {
                let evaluation = self.evaluator.evaluate(question, answer);
                graded.correctness = evaluation.correctness;
                graded.points_earned = evaluation.points_earned;
                if evaluation.correctness == Correctness::PendingReview {
                    pending_review += 1;
                }
            }

            score += graded.points_earned;
            graded_answers.push(graded);
        }

        tracing::debug!(
            "scored activity {}: {score}/{max_score} ({pending_review} pending review)",
            activity.id
        );

        ActivityScore {
            score,
            max_score,
            percentage_score: percentage(score, max_score),
            pending_review,
            graded_answers,
        }
    }

    /// Pass a human-entered grade through the same rounding rule.
    pub fn score_manual(&self, grade: ManualGrade) -> GradeResult<ActivityScore> {
        if !grade.max_score.is_finite() || grade.max_score < 0.0 {
            return Err(GradeError::Validation(format!(
                "max score must be non-negative, got {}",
                grade.max_score
            )));
        }
        if !grade.score.is_finite() || grade.score < 0.0 || grade.score > grade.max_score {
            return Err(GradeError::Validation(format!(
                "score {} outside 0..={}",
                grade.score, grade.max_score
            )));
        }

        Ok(ActivityScore {
            score: grade.score,
            max_score: grade.max_score,
            percentage_score: percentage(grade.score, grade.max_score),
            pending_review: 0,
            graded_answers: Vec::new(),
        })
    }

    /// Build the stored result. Pending answers leave the activity `submitted`.
    pub fn to_result(
        &self,
        student_id: &str,
        activity: &Activity,
        score: &ActivityScore,
    ) -> ActivityResult {
        let status = if score.has_pending_review() {
            ActivityStatus::Submitted
        } else {
            ActivityStatus::Graded
        };

        ActivityResult {
            student_id: student_id.to_string(),
            activity_id: activity.id.clone(),
            score: score.score,
            max_score: score.max_score,
            percentage_score: score.percentage_score,
            status,
            passed: activity
                .passing_score
                .map(|passing| score.percentage_score >= passing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityType, QuestionOption, QuestionType};
    use chrono::Utc;

    fn quiz() -> Activity {
        Activity {
            id: "quiz-1".into(),
            module_id: "m1".into(),
            title: "Quiz".into(),
            activity_type: ActivityType::Quiz,
            passing_score: Some(60.0),
        }
    }

    fn mc(id: &str, points: u32) -> Question {
        Question {
            id: id.into(),
            activity_id: "quiz-1".into(),
            question_type: QuestionType::MultipleChoice,
            points,
            correct_answer: None,
            acceptable_answers: vec![],
            case_sensitive: false,
            options: vec![
                QuestionOption {
                    id: format!("{id}-a"),
                    option_text: "A".into(),
                    is_correct: true,
                },
                QuestionOption {
                    id: format!("{id}-b"),
                    option_text: "B".into(),
                    is_correct: false,
                },
            ],
        }
    }

    fn essay(id: &str, points: u32) -> Question {
        Question {
            id: id.into(),
            activity_id: "quiz-1".into(),
            question_type: QuestionType::Essay,
            points,
            correct_answer: None,
            acceptable_answers: vec![],
            case_sensitive: false,
            options: vec![],
        }
    }

    #[test]
    fn max_score_counts_unanswered_questions() {
        let questions = vec![mc("q1", 2), mc("q2", 3), mc("q3", 5)];
        let answers = vec![SubmittedAnswer::new("s1", "q1").with_options(&["q1-a"])];
        let score = ActivityScorer::new().score(&quiz(), &questions, &answers);
        assert_eq!(score.score, 2.0);
        assert_eq!(score.max_score, 10.0);
        assert_eq!(score.percentage_score, 20.0);
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let questions = vec![mc("q1", 1), mc("q2", 1), mc("q3", 1)];
        let answers = vec![
            SubmittedAnswer::new("s1", "q1").with_options(&["q1-a"]),
            SubmittedAnswer::new("s1", "q2").with_options(&["q2-a"]),
            SubmittedAnswer::new("s1", "q3").with_options(&["q3-b"]),
        ];
        let score = ActivityScorer::new().score(&quiz(), &questions, &answers);
        assert_eq!(score.percentage_score, 66.67);
    }

    #[test]
    fn pending_essay_contributes_zero_until_regraded() {
        let questions = vec![mc("q1", 5), essay("q2", 5)];
        let mut answers = vec![
            SubmittedAnswer::new("s1", "q1").with_options(&["q1-a"]),
            SubmittedAnswer::new("s1", "q2").with_text("my essay"),
        ];
        let scorer = ActivityScorer::new();

        let before = scorer.score(&quiz(), &questions, &answers);
        assert_eq!(before.score, 5.0);
        assert!(before.has_pending_review());
        assert_eq!(
            scorer.to_result("s1", &quiz(), &before).status,
            ActivityStatus::Submitted
        );

        answers[1].points_earned = 4.0;
        answers[1].correctness = Correctness::Correct;
        answers[1].graded_at = Some(Utc::now());
        let after = scorer.score(&quiz(), &questions, &answers);
        assert_eq!(after.score, 9.0);
        assert!(!after.has_pending_review());
        let result = scorer.to_result("s1", &quiz(), &after);
        assert_eq!(result.status, ActivityStatus::Graded);
        assert_eq!(result.percentage_score, 90.0);
        assert_eq!(result.passed, Some(true));
    }

    #[test]
    fn foreign_answers_are_excluded() {
        let questions = vec![mc("q1", 5)];
        let answers = vec![
            SubmittedAnswer::new("s1", "q1").with_options(&["q1-a"]),
            SubmittedAnswer::new("s1", "elsewhere").with_options(&["x"]),
        ];
        let score = ActivityScorer::new().score(&quiz(), &questions, &answers);
        assert_eq!(score.score, 5.0);
        assert_eq!(score.graded_answers.len(), 1);
    }

    #[test]
    fn no_questions_scores_zero_percent() {
        let score = ActivityScorer::new().score(&quiz(), &[], &[]);
        assert_eq!(score.max_score, 0.0);
        assert!(score.max_score.is_sign_positive());
        assert_eq!(score.percentage_score, 0.0);
    }

    #[test]
    fn repeated_question_counts_once() {
        let questions = vec![mc("q1", 2), mc("q1", 2), mc("q2", 2)];
        let answers = vec![
            SubmittedAnswer::new("s1", "q1").with_options(&["q1-a"]),
            SubmittedAnswer::new("s1", "q2").with_options(&["q2-b"]),
        ];
        let score = ActivityScorer::new().score(&quiz(), &questions, &answers);
        assert_eq!(score.score, 2.0);
        assert_eq!(score.max_score, 4.0);
        assert_eq!(score.percentage_score, 50.0);
        assert_eq!(score.graded_answers.len(), 2);
    }

    #[test]
    fn manual_grade_passes_through() {
        let scorer = ActivityScorer::new();
        let score = scorer
            .score_manual(ManualGrade {
                score: 45.0,
                max_score: 60.0,
            })
            .unwrap();
        assert_eq!(score.percentage_score, 75.0);

        let err = scorer
            .score_manual(ManualGrade {
                score: 70.0,
                max_score: 60.0,
            })
            .unwrap_err();
        assert!(matches!(err, GradeError::Validation(_)));
    }
}
