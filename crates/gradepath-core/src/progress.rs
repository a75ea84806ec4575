//! Course-level progress and completion.
//!
//! Two signals answer "how much of the course is done": the count-based
//! `progress` computed here, and the weighted module scores from
//! [`completion`](crate::completion). Progress bars read the former, grade
//! reports the latter; both are kept.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{round2, CourseView, EnrollmentProgress};

/// Recomputed progress for one enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub student_id: String,
    pub course_id: String,
    /// Done activities over all activities, 0-100 with two decimals.
    pub progress: f64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_activities: usize,
    pub total_activities: usize,
    pub completed_modules: usize,
    pub total_modules: usize,
}

impl CourseProgress {
    /// Carry the recomputed values onto a stored enrollment row.
    pub fn apply_to(&self, enrollment: &EnrollmentProgress) -> EnrollmentProgress {
        EnrollmentProgress {
            student_id: enrollment.student_id.clone(),
            course_id: enrollment.course_id.clone(),
            progress: self.progress,
            is_completed: self.is_completed,
            completed_at: self.completed_at,
            version: enrollment.version,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CourseProgressEngine;

impl CourseProgressEngine {
    pub fn new() -> Self {
        Self
    }

    /// Full recompute from the current snapshot; never incremental.
    ///
    /// `previous` only decides `completed_at`: it is kept while the course
    /// stays complete, set to `now` on the incomplete → complete transition,
    /// and cleared on complete → incomplete.
    pub fn recompute_progress(
        &self,
        view: &CourseView,
        previous: Option<&EnrollmentProgress>,
        now: DateTime<Utc>,
    ) -> CourseProgress {
        let mut activity_ids: Vec<&str> = view.activities.iter().map(|a| a.id.as_str()).collect();
        activity_ids.sort_unstable();
        activity_ids.dedup();

        let total_activities = activity_ids.len();
        let completed_activities = activity_ids
            .iter()
            .filter(|id| {
                view.results
                    .get(**id)
                    .is_some_and(|r| r.status.is_done())
            })
            .count();

        let module_ids: HashSet<&str> = view.module_ids.iter().map(String::as_str).collect();
        let completed_modules = view
            .completion_records
            .iter()
            .filter(|r| r.student_id == view.student_id && r.course_id == view.course_id)
            .map(|r| r.module_id.as_str())
            .filter(|id| module_ids.contains(id))
            .collect::<HashSet<_>>()
            .len();
        let total_modules = module_ids.len();

        let is_completed = completed_modules >= total_modules;

        let progress = if total_activities > 0 {
            round2(completed_activities as f64 / total_activities as f64 * 100.0)
        } else if is_completed {
            100.0
        } else {
            0.0
        };

        let completed_at = match (is_completed, previous) {
            (false, _) => None,
            (true, Some(prev)) if prev.is_completed && prev.completed_at.is_some() => {
                prev.completed_at
            }
            (true, _) => Some(now),
        };

        CourseProgress {
            student_id: view.student_id.clone(),
            course_id: view.course_id.clone(),
            progress,
            is_completed,
            completed_at,
            completed_activities,
            total_activities,
            completed_modules,
            total_modules,
        }
    }
}
