use std::collections::HashMap;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gradepath_core::completion::ModuleCompletionEngine;
use gradepath_core::model::{
    Activity, ActivityResult, ActivityStatus, ActivityType, CourseView, ModuleCompletionRecord,
    ModuleView,
};
use gradepath_core::progress::CourseProgressEngine;
use gradepath_core::weights::{ActivityTypeWeights, ModuleComponentWeights};

const TYPES: [ActivityType; 5] = [
    ActivityType::Quiz,
    ActivityType::Assignment,
    ActivityType::Project,
    ActivityType::Assessment,
    ActivityType::Exercise,
];

fn activities(module: &str, count: usize) -> Vec<Activity> {
    (0..count)
        .map(|i| Activity {
            id: format!("{module}-a{i}"),
            module_id: module.into(),
            title: format!("Activity {i}"),
            activity_type: TYPES[i % TYPES.len()],
            passing_score: None,
        })
        .collect()
}

fn results(activities: &[Activity]) -> HashMap<String, ActivityResult> {
    activities
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(i, a)| {
            let pct = (i * 7 % 100) as f64;
            (
                a.id.clone(),
                ActivityResult {
                    student_id: "s1".into(),
                    activity_id: a.id.clone(),
                    score: pct,
                    max_score: 100.0,
                    percentage_score: pct,
                    status: ActivityStatus::Graded,
                    passed: None,
                },
            )
        })
        .collect()
}

fn bench_module_score(c: &mut Criterion) {
    let engine = ModuleCompletionEngine::new();
    let acts = activities("m1", 40);
    let view = ModuleView {
        student_id: "s1".into(),
        course_id: "c1".into(),
        module_id: "m1".into(),
        lesson_ids: (0..20).map(|i| format!("l{i}")).collect(),
        completed_lesson_ids: (0..15).map(|i| format!("l{i}")).collect(),
        results: results(&acts),
        activities: acts,
        ..Default::default()
    };
    let components = ModuleComponentWeights::default();
    let types = ActivityTypeWeights::default();

    c.bench_function("module_score_40", |b| {
        b.iter(|| engine.compute_module_score(black_box(&view), &components, &types))
    });
}

fn bench_course_progress(c: &mut Criterion) {
    let engine = CourseProgressEngine::new();
    let module_ids: Vec<String> = (0..12).map(|i| format!("m{i}")).collect();
    let acts: Vec<Activity> = module_ids.iter().flat_map(|m| activities(m, 25)).collect();
    let now = Utc::now();
    let view = CourseView {
        student_id: "s1".into(),
        course_id: "c1".into(),
        results: results(&acts),
        completion_records: module_ids
            .iter()
            .take(6)
            .map(|m| ModuleCompletionRecord {
                student_id: "s1".into(),
                module_id: m.clone(),
                course_id: "c1".into(),
                completed_at: now,
                completion_data: serde_json::Value::Null,
            })
            .collect(),
        module_ids,
        activities: acts,
        ..Default::default()
    };

    c.bench_function("course_progress_300", |b| {
        b.iter(|| engine.recompute_progress(black_box(&view), None, now))
    });
}

criterion_group!(benches, bench_module_score, bench_course_progress);
criterion_main!(benches);
