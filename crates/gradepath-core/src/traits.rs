//! Collaborator traits: persistence and notification.
//!
//! The computation services never touch storage. The pipeline reads
//! snapshots through [`GradeStore`] and issues every write explicitly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{
    ActivityResult, ActivitySnapshot, CourseView, EnrollmentProgress, GradeSetting,
    ModuleCompletionRecord, ModuleView, SkillAssessment, SkillView, SubmittedAnswer,
};

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Read snapshots and accept write instructions.
///
/// Implementations report missing rows as `GradeError::NotFound` and stale
/// enrollment writes as `GradeError::ConcurrencyConflict`, wrapped in
/// `anyhow::Error`.
#[async_trait]
pub trait GradeStore: Send + Sync {
    /// The activity, its owning course, and all of its questions.
    async fn load_activity(&self, activity_id: &str) -> anyhow::Result<ActivitySnapshot>;

    /// Snapshot of the activity that owns `question_id`.
    async fn load_question_activity(&self, question_id: &str) -> anyhow::Result<ActivitySnapshot>;

    /// Every answer `student_id` submitted to questions of `activity_id`.
    async fn load_answers(
        &self,
        student_id: &str,
        activity_id: &str,
    ) -> anyhow::Result<Vec<SubmittedAnswer>>;

    /// Replace stored answers with their graded versions.
    async fn save_answers(&self, answers: &[SubmittedAnswer]) -> anyhow::Result<()>;

    async fn upsert_activity_result(&self, result: &ActivityResult) -> anyhow::Result<()>;

    async fn load_module_view(&self, student_id: &str, module_id: &str)
        -> anyhow::Result<ModuleView>;

    async fn find_completion_record(
        &self,
        student_id: &str,
        module_id: &str,
        course_id: &str,
    ) -> anyhow::Result<Option<ModuleCompletionRecord>>;

    /// Insert unless the student+module+course triple exists; returns whether it inserted.
    async fn insert_completion_record(&self, record: &ModuleCompletionRecord)
        -> anyhow::Result<bool>;

    /// Returns whether a record was removed.
    async fn remove_completion_record(
        &self,
        student_id: &str,
        module_id: &str,
        course_id: &str,
    ) -> anyhow::Result<bool>;

    async fn load_course_view(&self, student_id: &str, course_id: &str)
        -> anyhow::Result<CourseView>;

    /// The stored enrollment, or a fresh version-0 row if none exists yet.
    async fn load_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> anyhow::Result<EnrollmentProgress>;

    /// Write `progress` if the stored version still equals `expected_version`.
    /// Returns the new version. A missing enrollment row is `NotFound`.
    async fn update_enrollment(
        &self,
        progress: &EnrollmentProgress,
        expected_version: u64,
    ) -> anyhow::Result<u64>;

    async fn load_skill_view(&self, student_id: &str, skill_id: &str)
        -> anyhow::Result<SkillView>;

    /// One assessment per student+skill; replaces any previous one.
    async fn upsert_skill_assessment(&self, assessment: &SkillAssessment) -> anyhow::Result<()>;

    async fn load_grade_settings(&self) -> anyhow::Result<Vec<GradeSetting>>;
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Trigger points the notification collaborator is told about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GradingEvent {
    ActivityGraded {
        student_id: String,
        activity_id: String,
        percentage_score: f64,
        pending_review: bool,
    },
    ModuleCompleted {
        student_id: String,
        module_id: String,
        course_id: String,
    },
    CourseCompleted {
        student_id: String,
        course_id: String,
    },
}

/// Fire-and-forget notification sink.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &GradingEvent);
}

/// Logs events and does nothing else.
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, event: &GradingEvent) {
        match event {
            GradingEvent::ActivityGraded {
                student_id,
                activity_id,
                percentage_score,
                pending_review,
            } => tracing::info!(
                "graded {activity_id} for {student_id}: {percentage_score:.2}%{}",
                if *pending_review { " (pending review)" } else { "" }
            ),
            GradingEvent::ModuleCompleted {
                student_id,
                module_id,
                ..
            } => tracing::info!("{student_id} completed module {module_id}"),
            GradingEvent::CourseCompleted {
                student_id,
                course_id,
            } => tracing::info!("{student_id} completed course {course_id}"),
        }
    }
}
