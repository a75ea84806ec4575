//! End-to-end grading scenarios against the in-memory store.
//!
//! Each test loads a small gradebook, drives the pipeline the way the CLI
//! does, and checks what ends up in the store.

use std::path::Path;
use std::sync::Arc;

use gradepath_core::engine::{GradingPipeline, NoopReporter, PipelineConfig};
use gradepath_core::model::{Correctness, MasteryLevel, SubmittedAnswer};
use gradepath_core::parser::parse_gradebook_str;
use gradepath_core::skill::SkillInputs;
use gradepath_core::traits::{GradeStore, GradingEvent};
use gradepath_core::weights::{WeightDefaults, WeightResolver};
use gradepath_store::{MemoryStore, RecordingNotifier};

struct Scenario {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    pipeline: GradingPipeline,
}

fn scenario(toml: &str) -> Scenario {
    scenario_with(toml, PipelineConfig::default())
}

fn scenario_with(toml: &str, config: PipelineConfig) -> Scenario {
    let book = parse_gradebook_str(toml, Path::new("scenario.toml")).unwrap();
    let store = Arc::new(MemoryStore::from_gradebook(&book));
    let notifier = Arc::new(RecordingNotifier::new());
    let resolver = Arc::new(WeightResolver::new(
        book.settings.clone(),
        WeightDefaults::default(),
    ));
    let pipeline = GradingPipeline::new(store.clone(), notifier.clone(), resolver, config);
    Scenario {
        store,
        notifier,
        pipeline,
    }
}

fn module_completions(event: &GradingEvent) -> bool {
    matches!(event, GradingEvent::ModuleCompleted { .. })
}

fn course_completions(event: &GradingEvent) -> bool {
    matches!(event, GradingEvent::CourseCompleted { .. })
}

const EIGHT_EXERCISES: &str = r#"
[course]
id = "c1"
title = "Eight exercises"

[[modules]]
id = "m1"
title = "First"

[[modules]]
id = "m2"
title = "Second"

[[activities]]
id = "e1"
module = "m1"
title = "E1"
type = "exercise"

[[activities]]
id = "e2"
module = "m1"
title = "E2"
type = "exercise"

[[activities]]
id = "e3"
module = "m1"
title = "E3"
type = "exercise"

[[activities]]
id = "e4"
module = "m1"
title = "E4"
type = "exercise"

[[activities]]
id = "e5"
module = "m2"
title = "E5"
type = "exercise"

[[activities]]
id = "e6"
module = "m2"
title = "E6"
type = "exercise"

[[activities]]
id = "e7"
module = "m2"
title = "E7"
type = "exercise"

[[activities]]
id = "e8"
module = "m2"
title = "E8"
type = "exercise"

[[students]]
id = "s1"

[[students.statuses]]
activity = "e1"
status = "completed"

[[students.statuses]]
activity = "e2"
status = "graded"

[[students.statuses]]
activity = "e5"
status = "submitted"

[[students.statuses]]
activity = "e6"
status = "in_progress"
"#;

#[tokio::test]
async fn partial_progress_counts_done_activities() {
    let s = scenario(EIGHT_EXERCISES);

    let refresh = s.pipeline.refresh_course("s1", "c1").await.unwrap();
    assert_eq!(refresh.progress.progress, 37.5);
    assert_eq!(refresh.progress.completed_activities, 3);
    assert_eq!(refresh.progress.total_activities, 8);
    assert!(!refresh.progress.is_completed);
    assert!(refresh.modules.iter().all(|m| !m.is_complete));
}

#[tokio::test]
async fn recompute_twice_is_identical() {
    let s = scenario(EIGHT_EXERCISES);

    let first = s.pipeline.recompute_course("s1", "c1").await.unwrap();
    let second = s.pipeline.recompute_course("s1", "c1").await.unwrap();
    assert_eq!(first, second);

    let enrollment = s.store.load_enrollment("s1", "c1").await.unwrap();
    assert_eq!(enrollment.progress, 37.5);
    assert_eq!(enrollment.version, 2);
}

#[tokio::test]
async fn deleting_an_activity_shrinks_the_denominator() {
    let s = scenario(EIGHT_EXERCISES);

    let removed = s.store.delete_activity("e8").await.unwrap();
    assert_eq!(removed.activities, 1);

    let progress = s.pipeline.recompute_course("s1", "c1").await.unwrap();
    assert_eq!(progress.total_activities, 7);
    assert_eq!(progress.progress, 42.86);
}

const TWO_MODULE_COURSE: &str = r#"
[course]
id = "c1"
title = "Two modules"

[[modules]]
id = "m1"
title = "One"

[[modules]]
id = "m2"
title = "Two"

[[lessons]]
id = "l1"
module = "m1"
title = "L1"

[[lessons]]
id = "l2"
module = "m2"
title = "L2"

[[activities]]
id = "a1"
module = "m1"
title = "A1"
type = "assignment"

[[activities]]
id = "a2"
module = "m2"
title = "A2"
type = "assignment"

[[students]]
id = "s1"
completed_lessons = ["l1", "l2"]

[[students.statuses]]
activity = "a1"
status = "completed"

[[students.statuses]]
activity = "a2"
status = "completed"
"#;

#[tokio::test]
async fn full_course_completion_is_recorded_once() {
    let s = scenario(TWO_MODULE_COURSE);

    let refresh = s.pipeline.refresh_course("s1", "c1").await.unwrap();
    assert!(refresh.modules.iter().all(|m| m.is_complete && m.newly_completed));
    assert_eq!(refresh.progress.progress, 100.0);
    assert!(refresh.progress.is_completed);
    let completed_at = refresh.progress.completed_at.unwrap();

    let again = s.pipeline.refresh_course("s1", "c1").await.unwrap();
    assert!(again.modules.iter().all(|m| m.is_complete && !m.newly_completed));
    assert_eq!(again.progress.completed_at, Some(completed_at));

    assert_eq!(s.store.completion_records("s1").await.len(), 2);
    assert_eq!(s.notifier.count(module_completions), 2);
    assert_eq!(s.notifier.count(course_completions), 1);
}

#[tokio::test]
async fn concurrent_refreshes_of_one_enrollment_all_land() {
    let config = PipelineConfig {
        parallelism: 4,
        max_retries: 8,
        ..PipelineConfig::default()
    };
    let s = scenario_with(TWO_MODULE_COURSE, config);

    let pairs = vec![("s1".to_string(), "c1".to_string()); 4];
    let outcome = s.pipeline.recompute_batch(&pairs, &NoopReporter).await;
    assert!(outcome.is_clean(), "failures: {:?}", outcome.failures);
    assert_eq!(outcome.refreshed.len(), 4);

    let enrollment = s.store.load_enrollment("s1", "c1").await.unwrap();
    assert_eq!(enrollment.version, 4);
    assert!(enrollment.is_completed);
    assert_eq!(s.store.completion_records("s1").await.len(), 2);
    assert_eq!(s.notifier.count(course_completions), 1);
}

#[tokio::test]
async fn batch_failure_does_not_stop_other_pairs() {
    let s = scenario(TWO_MODULE_COURSE);

    let pairs = vec![
        ("s1".to_string(), "c1".to_string()),
        ("s1".to_string(), "no-such-course".to_string()),
    ];
    let outcome = s.pipeline.recompute_batch(&pairs, &NoopReporter).await;
    assert_eq!(outcome.refreshed.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].course_id, "no-such-course");
}

const QUIZ_COURSE: &str = r#"
[course]
id = "geo"
title = "Geography"

[[modules]]
id = "europe"
title = "Europe"

[[activities]]
id = "capitals"
module = "europe"
title = "Capitals"
type = "quiz"
passing_score = 50.0

[[questions]]
id = "france"
activity = "capitals"
type = "short_answer"
correct_answer = "Paris"

[[questions]]
id = "france-strict"
activity = "capitals"
type = "short_answer"
correct_answer = "Paris"
case_sensitive = true

[[questions]]
id = "pick"
activity = "capitals"
type = "multiple_choice"
points = 2

[[questions.options]]
id = "A"
text = "Berlin"
correct = true

[[questions.options]]
id = "B"
text = "Munich"

[[questions]]
id = "essay"
activity = "capitals"
type = "essay"
points = 4

[[skills]]
id = "capitals"
name = "European capitals"
competency_threshold = 70.0

[[skill_links]]
skill = "capitals"
activity = "capitals"

[[students]]
id = "s1"
"#;

#[tokio::test]
async fn short_answer_respects_case_sensitivity() {
    let s = scenario(QUIZ_COURSE);
    s.store
        .submit_answer(SubmittedAnswer::new("s1", "france").with_text("  paris "))
        .await
        .unwrap();
    s.store
        .submit_answer(SubmittedAnswer::new("s1", "france-strict").with_text("  paris "))
        .await
        .unwrap();

    let outcome = s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    assert_eq!(outcome.result.score, 1.0);
    assert_eq!(outcome.result.max_score, 8.0);

    let lenient = s.store.answer("s1", "france").await.unwrap();
    assert_eq!(lenient.correctness, Correctness::Correct);
    let strict = s.store.answer("s1", "france-strict").await.unwrap();
    assert_eq!(strict.correctness, Correctness::Incorrect);
}

#[tokio::test]
async fn multiple_choice_needs_the_exact_set() {
    let s = scenario(QUIZ_COURSE);

    s.store
        .submit_answer(SubmittedAnswer::new("s1", "pick").with_options(&["A"]))
        .await
        .unwrap();
    let outcome = s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    assert_eq!(outcome.result.score, 2.0);

    s.store
        .submit_answer(SubmittedAnswer::new("s1", "pick").with_options(&["A", "B"]))
        .await
        .unwrap();
    let outcome = s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    assert_eq!(outcome.result.score, 0.0);
    let answer = s.store.answer("s1", "pick").await.unwrap();
    assert_eq!(answer.correctness, Correctness::Incorrect);
}

#[tokio::test]
async fn essay_waits_for_review_then_grades() {
    let s = scenario(QUIZ_COURSE);
    for answer in [
        SubmittedAnswer::new("s1", "france").with_text("Paris"),
        SubmittedAnswer::new("s1", "france-strict").with_text("Paris"),
        SubmittedAnswer::new("s1", "pick").with_options(&["A"]),
        SubmittedAnswer::new("s1", "essay").with_text("Berlin became the capital in 1990."),
    ] {
        s.store.submit_answer(answer).await.unwrap();
    }

    let outcome = s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    assert_eq!(outcome.pending_review, 1);
    assert_eq!(outcome.result.percentage_score, 50.0);
    assert_eq!(
        outcome.result.status,
        gradepath_core::model::ActivityStatus::Submitted
    );
    assert_eq!(outcome.course.completed_activities, 1);

    let err = s
        .pipeline
        .grade_answer_manually("s1", "essay", 5.0, Correctness::Correct)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("outside"));

    let outcome = s
        .pipeline
        .grade_answer_manually("s1", "essay", 3.0, Correctness::Correct)
        .await
        .unwrap();
    assert_eq!(outcome.pending_review, 0);
    assert_eq!(outcome.result.score, 7.0);
    assert_eq!(outcome.result.percentage_score, 87.5);
    assert_eq!(outcome.result.passed, Some(true));
    assert_eq!(
        outcome.result.status,
        gradepath_core::model::ActivityStatus::Graded
    );
    assert!(outcome.module.is_complete);
    assert!(outcome.course.is_completed);

    // A rescore keeps the reviewed points.
    let outcome = s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    assert_eq!(outcome.result.score, 7.0);
}

#[tokio::test]
async fn mastery_boundaries_through_the_late_penalty() {
    let s = scenario(QUIZ_COURSE);
    for answer in [
        SubmittedAnswer::new("s1", "france").with_text("Paris"),
        SubmittedAnswer::new("s1", "france-strict").with_text("Paris"),
        SubmittedAnswer::new("s1", "pick").with_options(&["A"]),
        SubmittedAnswer::new("s1", "essay").with_text("..."),
    ] {
        s.store.submit_answer(answer).await.unwrap();
    }
    s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    s.pipeline
        .grade_answer_manually("s1", "essay", 4.0, Correctness::Correct)
        .await
        .unwrap();

    let assess = |days_late: i64, improvement_factor: f64| SkillInputs {
        attempt_count: 1,
        days_late,
        improvement_factor,
    };

    let exact = s
        .pipeline
        .assess_skill("s1", "capitals", assess(6, 1.0))
        .await
        .unwrap();
    assert_eq!(exact.normalized_score, 100.0);
    assert_eq!(exact.final_score, 70.0);
    assert_eq!(exact.mastery_level, MasteryLevel::Met);

    let below = s
        .pipeline
        .assess_skill("s1", "capitals", assess(0, 0.6999))
        .await
        .unwrap();
    assert_eq!(below.final_score, 69.99);
    assert_eq!(below.mastery_level, MasteryLevel::NotMet);

    let exceeds = s
        .pipeline
        .assess_skill("s1", "capitals", assess(0, 0.805))
        .await
        .unwrap();
    assert_eq!(exceeds.final_score, 80.5);
    assert_eq!(exceeds.mastery_level, MasteryLevel::Exceeds);

    // Recomputation replaces the stored row.
    let stored = s.store.skill_assessment("s1", "capitals").await.unwrap();
    assert_eq!(stored.final_score, 80.5);
}

const WEIGHTED_COURSE: &str = r#"
[course]
id = "c1"
title = "Weighted"

[[modules]]
id = "m1"
title = "Only"

[[lessons]]
id = "l1"
module = "m1"
title = "L1"

[[lessons]]
id = "l2"
module = "m1"
title = "L2"

[[activities]]
id = "quiz"
module = "m1"
title = "Quiz"
type = "quiz"

[[activities]]
id = "project"
module = "m1"
title = "Project"
type = "project"

[[settings]]
scope = "global"
dimension = "module_components"
weights = { lessons = 40.0, activities = 60.0 }

[[settings]]
scope = "global"
dimension = "activity_types"
weights = { Quiz = 50.0, Assignment = 50.0, Assessment = 0.0, Exercise = 0.0 }

[[students]]
id = "s1"
completed_lessons = ["l1", "l2"]

[[students.manual_grades]]
activity = "project"
score = 60.0
max_score = 100.0
"#;

#[tokio::test]
async fn global_weights_apply_without_course_rows() {
    let s = scenario(WEIGHTED_COURSE);

    let weights = s.pipeline.resolver().resolve_module_component_weights("c1");
    assert_eq!(weights.lessons, 40.0);
    assert_eq!(weights.activities, 60.0);

    let outcome = s
        .pipeline
        .grade_activity_manually(
            "s1",
            "project",
            gradepath_core::scorer::ManualGrade {
                score: 60.0,
                max_score: 100.0,
            },
        )
        .await
        .unwrap();

    // lessons 100 * 0.4 + (quiz 0 * 50 + project 60 * 50) / 100 * 0.6
    assert_eq!(outcome.module.module_score, 58.0);
    assert!(!outcome.module.is_complete);

    let report = s.pipeline.build_report("s1", "c1").await.unwrap();
    assert_eq!(report.module_reports[0].module_score, 58.0);
    assert_eq!(report.average_module_score, 58.0);
    assert_eq!(report.progress.progress, 50.0);
}

#[tokio::test]
async fn manual_grade_rejected_for_question_activities() {
    let s = scenario(QUIZ_COURSE);
    let err = s
        .pipeline
        .grade_activity_manually(
            "s1",
            "capitals",
            gradepath_core::scorer::ManualGrade {
                score: 1.0,
                max_score: 1.0,
            },
        )
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("has questions"));
}

#[tokio::test]
async fn course_settings_take_effect_after_reload() {
    let s = scenario(WEIGHTED_COURSE);
    let row = |key: &str, weight: f64| gradepath_core::model::GradeSetting {
        id: format!("c1-{key}"),
        course_id: Some("c1".into()),
        dimension: gradepath_core::model::WeightDimension::ModuleComponents,
        key: key.into(),
        weight,
        is_active: true,
    };
    s.store
        .save_grade_settings(&[row("lessons", 0.0), row("activities", 100.0)])
        .await;

    // Still the global rows until the resolver reloads.
    let before = s.pipeline.refresh_module("s1", "m1").await.unwrap();
    assert_eq!(before.module_score, 40.0);

    s.pipeline.reload_settings().await.unwrap();
    let weights = s.pipeline.resolver().resolve_module_component_weights("c1");
    assert_eq!(weights.lessons, 0.0);

    let after = s.pipeline.refresh_module("s1", "m1").await.unwrap();
    assert_eq!(after.module_score, 0.0);
}

#[tokio::test]
async fn removed_completion_record_is_recreated() {
    let s = scenario(TWO_MODULE_COURSE);
    s.pipeline.refresh_course("s1", "c1").await.unwrap();

    assert!(s
        .store
        .remove_completion_record("s1", "m1", "c1")
        .await
        .unwrap());
    assert_eq!(s.store.completion_records("s1").await.len(), 1);

    let outcome = s.pipeline.refresh_module("s1", "m1").await.unwrap();
    assert!(outcome.newly_completed);
    assert_eq!(s.store.completion_records("s1").await.len(), 2);
    assert_eq!(s.notifier.count(module_completions), 3);
}

#[tokio::test]
async fn reviewed_answer_is_final() {
    let s = scenario(QUIZ_COURSE);
    s.store
        .submit_answer(SubmittedAnswer::new("s1", "essay").with_text("Rome, then Florence."))
        .await
        .unwrap();
    s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    s.pipeline
        .grade_answer_manually("s1", "essay", 3.0, Correctness::Correct)
        .await
        .unwrap();

    let err = s
        .store
        .submit_answer(SubmittedAnswer::new("s1", "essay").with_text("A better essay."))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("already graded"));

    let err = s
        .pipeline
        .grade_answer_manually("s1", "essay", 1.0, Correctness::Incorrect)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("already graded"));

    let essay = s.store.answer("s1", "essay").await.unwrap();
    assert_eq!(essay.points_earned, 3.0);
    assert_eq!(essay.correctness, Correctness::Correct);
    assert_eq!(essay.answer_text.as_deref(), Some("Rome, then Florence."));

    let outcome = s.pipeline.submit_activity("s1", "capitals").await.unwrap();
    assert_eq!(outcome.result.score, 3.0);
    assert_eq!(outcome.pending_review, 0);
}

const PROJECT_COURSE: &str = r#"
[course]
id = "c1"
title = "Capstone"

[[modules]]
id = "m1"
title = "Build"

[[activities]]
id = "proj"
module = "m1"
title = "Project"
type = "project"
passing_score = 50.0

[[students]]
id = "s1"
"#;

#[tokio::test]
async fn project_hand_in_waits_for_a_manual_grade() {
    let s = scenario(PROJECT_COURSE);

    let outcome = s.pipeline.submit_activity("s1", "proj").await.unwrap();
    assert_eq!(
        outcome.result.status,
        gradepath_core::model::ActivityStatus::Submitted
    );
    assert_eq!(outcome.result.passed, None);
    assert_eq!(outcome.result.percentage_score, 0.0);
    assert!(outcome.result.max_score.is_sign_positive());
    assert_eq!(outcome.pending_review, 1);
    assert!(s.notifier.events().iter().any(|e| matches!(
        e,
        GradingEvent::ActivityGraded {
            pending_review: true,
            ..
        }
    )));

    let outcome = s
        .pipeline
        .grade_activity_manually(
            "s1",
            "proj",
            gradepath_core::scorer::ManualGrade {
                score: 72.0,
                max_score: 100.0,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        outcome.result.status,
        gradepath_core::model::ActivityStatus::Graded
    );
    assert_eq!(outcome.result.percentage_score, 72.0);
    assert_eq!(outcome.result.passed, Some(true));

    // Handing in again cannot undo the grade.
    let err = s.pipeline.submit_activity("s1", "proj").await.unwrap_err();
    assert!(format!("{err:#}").contains("already graded"));
    let stored = s.store.activity_result("s1", "proj").await.unwrap();
    assert_eq!(stored.percentage_score, 72.0);
}
