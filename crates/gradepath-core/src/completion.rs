//! Module completion and weighted module scoring.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{round2, ActivityCategory, ModuleCompletionRecord, ModuleView};
use crate::weights::{ActivityTypeWeights, ModuleComponentWeights};

/// What the completion check decided for a student+module.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionDecision {
    /// A record already exists; nothing to write.
    AlreadyRecorded,
    /// Requirements are met for the first time; persist this record.
    NewlyCompleted(ModuleCompletionRecord),
    /// Requirements are not met.
    Incomplete,
}

/// Lesson and activity counters behind a completion decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTally {
    pub lessons_total: usize,
    pub lessons_completed: usize,
    pub activities_total: usize,
    pub activities_done: usize,
}

impl ModuleTally {
    /// Empty requirement sets are vacuously met.
    pub fn is_complete(&self) -> bool {
        self.lessons_completed == self.lessons_total
            && self.activities_done == self.activities_total
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleCompletionEngine;

impl ModuleCompletionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Count distinct completed lessons and done activities of the module.
    ///
    /// Completions and results for lessons or activities outside the module
    /// are not counted.
    pub fn tally(&self, view: &ModuleView) -> ModuleTally {
        let mut lesson_ids: Vec<&str> = view.lesson_ids.iter().map(String::as_str).collect();
        lesson_ids.sort_unstable();
        lesson_ids.dedup();

        let mut activity_ids: Vec<&str> = view.activities.iter().map(|a| a.id.as_str()).collect();
        activity_ids.sort_unstable();
        activity_ids.dedup();

        let lessons_completed = lesson_ids
            .iter()
            .filter(|id| view.completed_lesson_ids.contains(**id))
            .count();
        let activities_done = activity_ids
            .iter()
            .filter(|id| {
                view.results
                    .get(**id)
                    .is_some_and(|r| r.status.is_done())
            })
            .count();

        ModuleTally {
            lessons_total: lesson_ids.len(),
            lessons_completed,
            activities_total: activity_ids.len(),
            activities_done,
        }
    }

    pub fn is_module_complete(&self, view: &ModuleView) -> bool {
        self.tally(view).is_complete()
    }

    /// Idempotent completion check.
    ///
    /// An existing record for the student+module+course triple short-circuits
    /// to [`CompletionDecision::AlreadyRecorded`], so `completed_at` is never
    /// re-stamped.
    pub fn evaluate(
        &self,
        view: &ModuleView,
        existing: Option<&ModuleCompletionRecord>,
        now: DateTime<Utc>,
    ) -> CompletionDecision {
        if existing.is_some() {
            return CompletionDecision::AlreadyRecorded;
        }

        let tally = self.tally(view);
        if !tally.is_complete() {
            return CompletionDecision::Incomplete;
        }

        CompletionDecision::NewlyCompleted(ModuleCompletionRecord {
            student_id: view.student_id.clone(),
            module_id: view.module_id.clone(),
            course_id: view.course_id.clone(),
            completed_at: now,
            completion_data: serde_json::json!({
                "lessons_completed": tally.lessons_completed,
                "activities_completed": tally.activities_done,
            }),
        })
    }

    /// Weighted module score in percent.
    ///
    /// `lessons% * lesson_part + activities% * activity_part`, where the
    /// lesson part is 100 once every lesson is done (proportional before),
    /// and the activity part averages each category present in the module,
    /// weighted by its category weight renormalized over those categories.
    pub fn compute_module_score(
        &self,
        view: &ModuleView,
        components: &ModuleComponentWeights,
        types: &ActivityTypeWeights,
    ) -> f64 {
        let tally = self.tally(view);
        let lesson_part = if tally.lessons_total == 0 || tally.lessons_completed == tally.lessons_total
        {
            100.0
        } else {
            tally.lessons_completed as f64 / tally.lessons_total as f64 * 100.0
        };

        let activity_part = self.weighted_activity_score(view, types);

        round2(
            components.lessons / 100.0 * lesson_part
                + components.activities / 100.0 * activity_part,
        )
    }

    /// Category-weighted average of activity percentages. Activities without
    /// a result count as zero; a module without activities scores 100.
    pub fn weighted_activity_score(&self, view: &ModuleView, types: &ActivityTypeWeights) -> f64 {
        let mut by_category: BTreeMap<ActivityCategory, Vec<f64>> = BTreeMap::new();
        for activity in &view.activities {
            let pct = view
                .results
                .get(&activity.id)
                .map(|r| r.percentage_score)
                .unwrap_or(0.0);
            by_category
                .entry(activity.activity_type.category())
                .or_default()
                .push(pct);
        }

        if by_category.is_empty() {
            return 100.0;
        }

        let averages: Vec<(f64, f64)> = by_category
            .iter()
            .map(|(category, scores)| {
                let avg = scores.iter().sum::<f64>() / scores.len() as f64;
                (types.get(*category), avg)
            })
            .collect();

        let weight_sum: f64 = averages.iter().map(|(w, _)| w).sum();
        if weight_sum <= 0.0 {
            tracing::warn!(
                "module {} has no weight for any of its activity types, using a plain average",
                view.module_id
            );
            return averages.iter().map(|(_, avg)| avg).sum::<f64>() / averages.len() as f64;
        }

        averages.iter().map(|(w, avg)| w * avg).sum::<f64>() / weight_sum
    }
}
