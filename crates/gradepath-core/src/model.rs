//! Core data model types for gradepath.
//!
//! These are snapshot types handed to the computation services by the
//! persistence layer. They carry no behaviour beyond small classification
//! helpers; every derived value is produced by a service.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GradeError;

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Questions and answers
// ---------------------------------------------------------------------------

/// Supported question types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Enumeration,
    Essay,
    FileUpload,
}

impl QuestionType {
    /// Essay and file-upload questions always need a human grader.
    pub fn is_auto_gradable(self) -> bool {
        !matches!(self, QuestionType::Essay | QuestionType::FileUpload)
    }

    /// Whether the answer is picked from a fixed option list.
    pub fn is_option_based(self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::MultipleChoice => write!(f, "multiple_choice"),
            QuestionType::TrueFalse => write!(f, "true_false"),
            QuestionType::ShortAnswer => write!(f, "short_answer"),
            QuestionType::Enumeration => write!(f, "enumeration"),
            QuestionType::Essay => write!(f, "essay"),
            QuestionType::FileUpload => write!(f, "file_upload"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "multiple_choice" | "multiple-choice" => Ok(QuestionType::MultipleChoice),
            "true_false" | "true-false" => Ok(QuestionType::TrueFalse),
            "short_answer" | "short-answer" => Ok(QuestionType::ShortAnswer),
            "enumeration" => Ok(QuestionType::Enumeration),
            "essay" => Ok(QuestionType::Essay),
            "file_upload" | "file-upload" => Ok(QuestionType::FileUpload),
            other => Err(GradeError::Validation(format!(
                "unknown question type: {other}"
            ))),
        }
    }
}

/// One selectable option of a multiple-choice or true/false question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// A question belonging to an activity's quiz or assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub activity_id: String,
    pub question_type: QuestionType,
    /// Points awarded for a correct answer. Always positive.
    pub points: u32,
    #[serde(default)]
    pub correct_answer: Option<String>,
    /// Alternative correct strings, checked before `correct_answer`.
    #[serde(default)]
    pub acceptable_answers: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Ids of the options flagged correct.
    pub fn correct_option_ids(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.as_str())
            .collect()
    }
}

/// Tri-state correctness of a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Correct,
    Incorrect,
    /// Automatic grading could not decide; a human grader must finalize it.
    #[default]
    PendingReview,
}

impl Correctness {
    pub fn from_bool(correct: bool) -> Self {
        if correct {
            Correctness::Correct
        } else {
            Correctness::Incorrect
        }
    }
}

/// A student's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub student_id: String,
    pub question_id: String,
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub correctness: Correctness,
    #[serde(default)]
    pub points_earned: f64,
    /// Set when a human grader finalized the answer; auto-grading leaves it alone.
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
}

impl SubmittedAnswer {
    pub fn new(student_id: &str, question_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            question_id: question_id.to_string(),
            selected_option_ids: Vec::new(),
            answer_text: None,
            correctness: Correctness::PendingReview,
            points_earned: 0.0,
            graded_at: None,
        }
    }

    pub fn with_options(mut self, ids: &[&str]) -> Self {
        self.selected_option_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.answer_text = Some(text.to_string());
        self
    }

    pub fn is_manually_graded(&self) -> bool {
        self.graded_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// Kind of gradable work attached to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Quiz,
    Assignment,
    Project,
    Assessment,
    Exercise,
}

impl ActivityType {
    /// The weight category this activity type is counted under.
    pub fn category(self) -> ActivityCategory {
        match self {
            ActivityType::Quiz => ActivityCategory::Quiz,
            ActivityType::Assignment | ActivityType::Project => ActivityCategory::Assignment,
            ActivityType::Assessment => ActivityCategory::Assessment,
            ActivityType::Exercise => ActivityCategory::Exercise,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityType::Quiz => write!(f, "quiz"),
            ActivityType::Assignment => write!(f, "assignment"),
            ActivityType::Project => write!(f, "project"),
            ActivityType::Assessment => write!(f, "assessment"),
            ActivityType::Exercise => write!(f, "exercise"),
        }
    }
}

/// Activity-type weight keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivityCategory {
    Quiz,
    Assignment,
    Assessment,
    Exercise,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 4] = [
        ActivityCategory::Quiz,
        ActivityCategory::Assignment,
        ActivityCategory::Assessment,
        ActivityCategory::Exercise,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ActivityCategory::Quiz => "Quiz",
            ActivityCategory::Assignment => "Assignment",
            ActivityCategory::Assessment => "Assessment",
            ActivityCategory::Exercise => "Exercise",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub module_id: String,
    pub title: String,
    pub activity_type: ActivityType,
    /// Minimum percentage for the result to count as passed.
    #[serde(default)]
    pub passing_score: Option<f64>,
}

/// Lifecycle of a student's work on an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Submitted,
    Graded,
}

impl ActivityStatus {
    /// Completed, submitted, and graded all count as done.
    pub fn is_done(self) -> bool {
        matches!(
            self,
            ActivityStatus::Completed | ActivityStatus::Submitted | ActivityStatus::Graded
        )
    }
}

/// Per student+activity aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub student_id: String,
    pub activity_id: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage_score: f64,
    pub status: ActivityStatus,
    #[serde(default)]
    pub passed: Option<bool>,
}

impl ActivityResult {
    /// A status-only result, e.g. an activity marked completed without a grade.
    pub fn with_status(student_id: &str, activity_id: &str, status: ActivityStatus) -> Self {
        Self {
            student_id: student_id.to_string(),
            activity_id: activity_id.to_string(),
            score: 0.0,
            max_score: 0.0,
            percentage_score: 0.0,
            status,
            passed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Courses, modules, lessons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub module_id: String,
    pub title: String,
}

/// Unique per student+module+course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCompletionRecord {
    pub student_id: String,
    pub module_id: String,
    pub course_id: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub completion_data: serde_json::Value,
}

impl ModuleCompletionRecord {
    pub fn key(&self) -> (String, String, String) {
        (
            self.student_id.clone(),
            self.module_id.clone(),
            self.course_id.clone(),
        )
    }
}

/// Stored course progress for an enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentProgress {
    pub student_id: String,
    pub course_id: String,
    pub progress: f64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter, bumped by every write.
    #[serde(default)]
    pub version: u64,
}

impl EnrollmentProgress {
    pub fn new(student_id: &str, course_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            progress: 0.0,
            is_completed: false,
            completed_at: None,
            version: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Views handed to the engines
// ---------------------------------------------------------------------------

/// Everything needed to judge one module for one student.
#[derive(Debug, Clone, Default)]
pub struct ModuleView {
    pub student_id: String,
    pub course_id: String,
    pub module_id: String,
    pub module_title: String,
    pub lesson_ids: Vec<String>,
    pub activities: Vec<Activity>,
    /// Lessons the student finished. May contain ids from other modules.
    pub completed_lesson_ids: HashSet<String>,
    /// Results keyed by activity id.
    pub results: HashMap<String, ActivityResult>,
}

/// Everything needed to recompute course progress for one student.
#[derive(Debug, Clone, Default)]
pub struct CourseView {
    pub student_id: String,
    pub course_id: String,
    pub course_title: String,
    /// Module ids in course order.
    pub module_ids: Vec<String>,
    /// All activities of every module in the course.
    pub activities: Vec<Activity>,
    /// Results keyed by activity id.
    pub results: HashMap<String, ActivityResult>,
    pub completion_records: Vec<ModuleCompletionRecord>,
}

/// An activity snapshot with the questions it owns.
#[derive(Debug, Clone)]
pub struct ActivitySnapshot {
    pub activity: Activity,
    pub course_id: String,
    pub questions: Vec<Question>,
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub competency_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillActivityLink {
    pub skill_id: String,
    pub activity_id: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    NotMet,
    Met,
    Exceeds,
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasteryLevel::NotMet => write!(f, "not_met"),
            MasteryLevel::Met => write!(f, "met"),
            MasteryLevel::Exceeds => write!(f, "exceeds"),
        }
    }
}

/// Unique per student+skill. Recomputation replaces every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAssessment {
    pub student_id: String,
    pub skill_id: String,
    pub normalized_score: f64,
    pub attempt_count: u32,
    pub improvement_factor: f64,
    pub days_late: i64,
    pub final_score: f64,
    pub mastery_level: MasteryLevel,
    pub assessed_at: DateTime<Utc>,
}

/// Skill plus the linked activities' results for one student.
#[derive(Debug, Clone)]
pub struct SkillView {
    pub student_id: String,
    pub skill: Skill,
    pub links: Vec<SkillActivityLink>,
    /// Results keyed by activity id.
    pub results: HashMap<String, ActivityResult>,
}

// ---------------------------------------------------------------------------
// Weight settings
// ---------------------------------------------------------------------------

/// Which grading dimension a weight belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightDimension {
    /// Keys `lessons` and `activities`.
    ModuleComponents,
    /// Keys `Quiz`, `Assignment`, `Assessment`, `Exercise`.
    ActivityTypes,
}

impl fmt::Display for WeightDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightDimension::ModuleComponents => write!(f, "module_components"),
            WeightDimension::ActivityTypes => write!(f, "activity_types"),
        }
    }
}

/// A stored weight row. `course_id = None` is the global scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSetting {
    pub id: String,
    #[serde(default)]
    pub course_id: Option<String>,
    pub dimension: WeightDimension,
    pub key: String,
    pub weight: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
