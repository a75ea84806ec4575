//! Grading pipeline orchestrator.
//!
//! Runs the pure services in dependency order (answers, activity result,
//! module completion, course progress) and issues every persistence write
//! and notification explicitly. Concurrent-update conflicts on the
//! enrollment row are retried with a fresh read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::completion::{CompletionDecision, ModuleCompletionEngine, ModuleTally};
use crate::error::GradeError;
use crate::model::{
    ActivityResult, ActivitySnapshot, ActivityStatus, Correctness, SkillAssessment,
};
use crate::progress::{CourseProgress, CourseProgressEngine};
use crate::report::{ActivityLine, CourseSummary, GradeReport, ModuleReport};
use crate::scorer::{ActivityScore, ActivityScorer, ManualGrade};
use crate::skill::{LatePenalty, SkillAssessmentEngine, SkillInputs};
use crate::traits::{GradeStore, GradingEvent, NotificationSink};
use crate::weights::WeightResolver;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configuration for the grading pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum concurrent recomputations in a batch.
    pub parallelism: usize,
    /// Retries after a concurrent-update conflict.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further one.
    pub retry_delay: Duration,
    pub late_penalty: LatePenalty,
    pub mastery_multiplier: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
            late_penalty: LatePenalty::default(),
            mastery_multiplier: 1.15,
        }
    }
}

/// Module state after a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutcome {
    pub student_id: String,
    pub course_id: String,
    pub module_id: String,
    /// A completion record exists after this refresh.
    pub is_complete: bool,
    /// This refresh inserted the completion record.
    pub newly_completed: bool,
    /// Weighted module score in percent.
    pub module_score: f64,
    pub tally: ModuleTally,
}

/// Everything a submission changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub result: ActivityResult,
    pub pending_review: usize,
    pub module: ModuleOutcome,
    pub course: CourseProgress,
}

/// Every module of a course refreshed, then the course recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRefresh {
    pub modules: Vec<ModuleOutcome>,
    pub progress: CourseProgress,
}

/// A student+course pair whose refresh failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub student_id: String,
    pub course_id: String,
    pub error: String,
}

/// Result of [`GradingPipeline::recompute_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub refreshed: Vec<CourseRefresh>,
    pub failures: Vec<BatchFailure>,
    pub duration_ms: u64,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Batch progress reporting trait.
pub trait BatchReporter: Send + Sync {
    fn on_refresh_complete(&self, refresh: &CourseRefresh);
    fn on_refresh_error(&self, student_id: &str, course_id: &str, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op batch reporter.
pub struct NoopReporter;

impl BatchReporter for NoopReporter {
    fn on_refresh_complete(&self, _: &CourseRefresh) {}
    fn on_refresh_error(&self, _: &str, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The grading pipeline.
pub struct GradingPipeline {
    store: Arc<dyn GradeStore>,
    notifier: Arc<dyn NotificationSink>,
    resolver: Arc<WeightResolver>,
    config: PipelineConfig,
    scorer: ActivityScorer,
    completion: ModuleCompletionEngine,
    progress: CourseProgressEngine,
    skills: SkillAssessmentEngine,
}

impl GradingPipeline {
    pub fn new(
        store: Arc<dyn GradeStore>,
        notifier: Arc<dyn NotificationSink>,
        resolver: Arc<WeightResolver>,
        config: PipelineConfig,
    ) -> Self {
        let skills = SkillAssessmentEngine::new(config.late_penalty, config.mastery_multiplier);
        Self {
            store,
            notifier,
            resolver,
            config,
            scorer: ActivityScorer::new(),
            completion: ModuleCompletionEngine::new(),
            progress: CourseProgressEngine::new(),
            skills,
        }
    }

    pub fn resolver(&self) -> &WeightResolver {
        &self.resolver
    }

    /// Replace the resolver's settings with the store's current table.
    pub async fn reload_settings(&self) -> Result<()> {
        let settings = self
            .store
            .load_grade_settings()
            .await
            .context("failed to load grade settings")?;
        tracing::debug!("reloaded {} grade settings", settings.len());
        self.resolver.reload(settings);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Activity grading
    // -----------------------------------------------------------------------

    /// Grade everything `student_id` submitted for `activity_id` and
    /// propagate the result to the module and the course.
    pub async fn submit_activity(
        &self,
        student_id: &str,
        activity_id: &str,
    ) -> Result<SubmissionOutcome> {
        let snapshot = self
            .store
            .load_activity(activity_id)
            .await
            .with_context(|| format!("failed to load activity {activity_id}"))?;
        if snapshot.questions.is_empty() {
            return self.record_submission(student_id, &snapshot).await;
        }

        let answers = self
            .store
            .load_answers(student_id, activity_id)
            .await
            .with_context(|| format!("failed to load answers of {student_id} for {activity_id}"))?;

        let score = self
            .scorer
            .score(&snapshot.activity, &snapshot.questions, &answers);
        self.store.save_answers(&score.graded_answers).await?;

        self.record_score(student_id, &snapshot, &score).await
    }

    /// Hand-in of work without questions. The result stays `submitted`
    /// with no percentage until [`Self::grade_activity_manually`] runs.
    async fn record_submission(
        &self,
        student_id: &str,
        snapshot: &ActivitySnapshot,
    ) -> Result<SubmissionOutcome> {
        let activity_id = snapshot.activity.id.as_str();
        let view = self
            .store
            .load_module_view(student_id, &snapshot.activity.module_id)
            .await?;
        if view
            .results
            .get(activity_id)
            .is_some_and(|r| r.status == ActivityStatus::Graded)
        {
            return Err(GradeError::Validation(format!(
                "activity {activity_id} is already graded for {student_id}"
            ))
            .into());
        }

        let result =
            ActivityResult::with_status(student_id, activity_id, ActivityStatus::Submitted);
        self.store.upsert_activity_result(&result).await?;
        tracing::info!("{student_id} submitted {activity_id}, awaiting a manual grade");
        self.notifier.notify(&GradingEvent::ActivityGraded {
            student_id: student_id.to_string(),
            activity_id: activity_id.to_string(),
            percentage_score: result.percentage_score,
            pending_review: true,
        });

        let module = self
            .refresh_module(student_id, &snapshot.activity.module_id)
            .await?;
        let course = self
            .recompute_course(student_id, &snapshot.course_id)
            .await?;

        Ok(SubmissionOutcome {
            result,
            pending_review: 1,
            module,
            course,
        })
    }

    /// Finalize one answer by hand and rescore its activity.
    ///
    /// `points` must lie within the question's points and `correctness`
    /// must be decided.
    pub async fn grade_answer_manually(
        &self,
        student_id: &str,
        question_id: &str,
        points: f64,
        correctness: Correctness,
    ) -> Result<SubmissionOutcome> {
        let snapshot = self
            .store
            .load_question_activity(question_id)
            .await
            .with_context(|| format!("failed to load the activity of question {question_id}"))?;
        let question = snapshot
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| GradeError::NotFound(format!("question {question_id}")))?;

        if correctness == Correctness::PendingReview {
            return Err(GradeError::Validation(format!(
                "manual grade for {question_id} must decide correctness"
            ))
            .into());
        }
        if !points.is_finite() || points < 0.0 || points > question.points as f64 {
            return Err(GradeError::Validation(format!(
                "{points} points outside 0..={} for question {question_id}",
                question.points
            ))
            .into());
        }

        let mut answers = self
            .store
            .load_answers(student_id, &snapshot.activity.id)
            .await?;
        let answer = answers
            .iter_mut()
            .rev()
            .find(|a| a.question_id == question_id)
            .ok_or_else(|| {
                GradeError::NotFound(format!("answer of {student_id} to question {question_id}"))
            })?;
        if answer.is_manually_graded() {
            return Err(GradeError::Validation(format!(
                "answer of {student_id} to question {question_id} is already graded"
            ))
            .into());
        }
        answer.points_earned = points;
        answer.correctness = correctness;
        answer.graded_at = Some(Utc::now());
        tracing::info!("{question_id} for {student_id} graded manually: {points} points");

        let score = self
            .scorer
            .score(&snapshot.activity, &snapshot.questions, &answers);
        self.store.save_answers(&score.graded_answers).await?;

        self.record_score(student_id, &snapshot, &score).await
    }

    /// Record a human-entered grade for work without discrete questions.
    pub async fn grade_activity_manually(
        &self,
        student_id: &str,
        activity_id: &str,
        grade: ManualGrade,
    ) -> Result<SubmissionOutcome> {
        let snapshot = self
            .store
            .load_activity(activity_id)
            .await
            .with_context(|| format!("failed to load activity {activity_id}"))?;
        if !snapshot.questions.is_empty() {
            return Err(GradeError::Validation(format!(
                "activity {activity_id} has questions; grade its answers instead"
            ))
            .into());
        }

        let score = self.scorer.score_manual(grade)?;
        self.record_score(student_id, &snapshot, &score).await
    }

    async fn record_score(
        &self,
        student_id: &str,
        snapshot: &ActivitySnapshot,
        score: &ActivityScore,
    ) -> Result<SubmissionOutcome> {
        let result = self.scorer.to_result(student_id, &snapshot.activity, score);
        self.store.upsert_activity_result(&result).await?;
        self.notifier.notify(&GradingEvent::ActivityGraded {
            student_id: student_id.to_string(),
            activity_id: result.activity_id.clone(),
            percentage_score: result.percentage_score,
            pending_review: score.has_pending_review(),
        });

        let module = self
            .refresh_module(student_id, &snapshot.activity.module_id)
            .await?;
        let course = self
            .recompute_course(student_id, &snapshot.course_id)
            .await?;

        Ok(SubmissionOutcome {
            result,
            pending_review: score.pending_review,
            module,
            course,
        })
    }

    // -----------------------------------------------------------------------
    // Module and course
    // -----------------------------------------------------------------------

    /// Idempotent completion check plus weighted score for one module.
    pub async fn refresh_module(&self, student_id: &str, module_id: &str) -> Result<ModuleOutcome> {
        let view = self
            .store
            .load_module_view(student_id, module_id)
            .await
            .with_context(|| format!("failed to load module {module_id} for {student_id}"))?;
        let existing = self
            .store
            .find_completion_record(student_id, module_id, &view.course_id)
            .await?;

        let (is_complete, newly_completed) =
            match self
                .completion
                .evaluate(&view, existing.as_ref(), Utc::now())
            {
                CompletionDecision::AlreadyRecorded => (true, false),
                CompletionDecision::Incomplete => (false, false),
                CompletionDecision::NewlyCompleted(record) => {
                    let inserted = self.store.insert_completion_record(&record).await?;
                    if inserted {
                        tracing::info!("{student_id} completed module {module_id}");
                        self.notifier.notify(&GradingEvent::ModuleCompleted {
                            student_id: student_id.to_string(),
                            module_id: module_id.to_string(),
                            course_id: view.course_id.clone(),
                        });
                    }
                    (true, inserted)
                }
            };

        let components = self
            .resolver
            .resolve_module_component_weights(&view.course_id);
        let types = self.resolver.resolve_activity_type_weights(&view.course_id);

        Ok(ModuleOutcome {
            student_id: student_id.to_string(),
            course_id: view.course_id.clone(),
            module_id: module_id.to_string(),
            is_complete,
            newly_completed,
            module_score: self
                .completion
                .compute_module_score(&view, &components, &types),
            tally: self.completion.tally(&view),
        })
    }

    /// Full course recompute, retried with a fresh read when a concurrent
    /// writer bumped the enrollment version first.
    pub async fn recompute_course(&self, student_id: &str, course_id: &str) -> Result<CourseProgress> {
        let mut retry_delay = self.config.retry_delay;
        let mut attempt = 0u32;
        loop {
            match self.try_recompute_course(student_id, course_id).await {
                Ok(progress) => return Ok(progress),
                Err(e) if attempt < self.config.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        "recompute of {student_id}/{course_id} conflicted, retry {attempt}/{}: {e:#}",
                        self.config.max_retries
                    );
                    tokio::time::sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_recompute_course(&self, student_id: &str, course_id: &str) -> Result<CourseProgress> {
        let enrollment = self.store.load_enrollment(student_id, course_id).await?;
        let view = self
            .store
            .load_course_view(student_id, course_id)
            .await
            .with_context(|| format!("failed to load course {course_id} for {student_id}"))?;

        let progress = self
            .progress
            .recompute_progress(&view, Some(&enrollment), Utc::now());
        self.store
            .update_enrollment(&progress.apply_to(&enrollment), enrollment.version)
            .await?;

        if progress.is_completed && !enrollment.is_completed {
            tracing::info!("{student_id} completed course {course_id}");
            self.notifier.notify(&GradingEvent::CourseCompleted {
                student_id: student_id.to_string(),
                course_id: course_id.to_string(),
            });
        }
        Ok(progress)
    }

    /// Refresh every module of the course in order, then the course itself.
    pub async fn refresh_course(&self, student_id: &str, course_id: &str) -> Result<CourseRefresh> {
        let view = self.store.load_course_view(student_id, course_id).await?;
        let mut modules = Vec::with_capacity(view.module_ids.len());
        for module_id in &view.module_ids {
            modules.push(self.refresh_module(student_id, module_id).await?);
        }
        let progress = self.recompute_course(student_id, course_id).await?;
        Ok(CourseRefresh { modules, progress })
    }

    /// Refresh independent student+course pairs concurrently.
    ///
    /// A failing pair is logged and listed in the outcome; the others
    /// still run to completion.
    pub async fn recompute_batch(
        &self,
        pairs: &[(String, String)],
        reporter: &dyn BatchReporter,
    ) -> BatchOutcome {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let mut futures = FuturesUnordered::new();
        for (student_id, course_id) in pairs {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let inner = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    self.refresh_course(student_id, course_id).await
                };
                (student_id, course_id, inner.await)
            });
        }

        let total = futures.len();
        let mut outcome = BatchOutcome::default();
        while let Some((student_id, course_id, result)) = futures.next().await {
            match result {
                Ok(refresh) => {
                    reporter.on_refresh_complete(&refresh);
                    outcome.refreshed.push(refresh);
                }
                Err(e) => {
                    tracing::error!("refresh failed for {student_id}/{course_id}: {e:#}");
                    reporter.on_refresh_error(student_id, course_id, &format!("{e:#}"));
                    outcome.failures.push(BatchFailure {
                        student_id: student_id.clone(),
                        course_id: course_id.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        reporter.on_batch_complete(
            total,
            outcome.refreshed.len(),
            outcome.failures.len(),
            elapsed,
        );
        outcome.duration_ms = elapsed.as_millis() as u64;
        outcome
    }

    // -----------------------------------------------------------------------
    // Skills and reports
    // -----------------------------------------------------------------------

    /// Recompute and store the student's assessment for one skill.
    pub async fn assess_skill(
        &self,
        student_id: &str,
        skill_id: &str,
        inputs: SkillInputs,
    ) -> Result<SkillAssessment> {
        let view = self
            .store
            .load_skill_view(student_id, skill_id)
            .await
            .with_context(|| format!("failed to load skill {skill_id} for {student_id}"))?;
        let assessment = self
            .skills
            .compute_skill_assessment(&view, inputs, Utc::now())?;
        self.store.upsert_skill_assessment(&assessment).await?;
        Ok(assessment)
    }

    /// Read-only report of the student's standing in a course.
    pub async fn build_report(&self, student_id: &str, course_id: &str) -> Result<GradeReport> {
        let enrollment = self.store.load_enrollment(student_id, course_id).await?;
        let course_view = self
            .store
            .load_course_view(student_id, course_id)
            .await
            .with_context(|| format!("failed to load course {course_id} for {student_id}"))?;
        let progress = self
            .progress
            .recompute_progress(&course_view, Some(&enrollment), Utc::now());

        let components = self.resolver.resolve_module_component_weights(course_id);
        let types = self.resolver.resolve_activity_type_weights(course_id);

        let mut module_reports = Vec::with_capacity(course_view.module_ids.len());
        for module_id in &course_view.module_ids {
            let view = self.store.load_module_view(student_id, module_id).await?;
            let is_complete = course_view
                .completion_records
                .iter()
                .any(|r| &r.module_id == module_id);
            module_reports.push(ModuleReport {
                module_id: module_id.clone(),
                title: view.module_title.clone(),
                is_complete,
                module_score: self
                    .completion
                    .compute_module_score(&view, &components, &types),
                tally: self.completion.tally(&view),
                activities: view
                    .activities
                    .iter()
                    .map(|a| ActivityLine::new(a, view.results.get(&a.id)))
                    .collect(),
            });
        }

        Ok(GradeReport::new(
            student_id,
            CourseSummary {
                id: course_view.course_id.clone(),
                title: course_view.course_title.clone(),
                module_count: course_view.module_ids.len(),
                activity_count: course_view.activities.len(),
            },
            progress,
            module_reports,
        ))
    }
}

fn is_retryable(e: &anyhow::Error) -> bool {
    e.downcast_ref::<GradeError>()
        .is_some_and(GradeError::is_retryable)
}
