//! Skill-mastery assessment from weighted activity results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};
use crate::model::{round2, MasteryLevel, SkillAssessment, SkillView};

/// Linear lateness penalty in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatePenalty {
    pub per_day: f64,
    /// Upper bound on the total penalty, if any.
    #[serde(default)]
    pub max_penalty: Option<f64>,
}

impl Default for LatePenalty {
    fn default() -> Self {
        Self {
            per_day: 5.0,
            max_penalty: None,
        }
    }
}

impl LatePenalty {
    /// Zero for `days_late <= 0`, non-decreasing afterwards.
    pub fn penalty(&self, days_late: i64) -> f64 {
        if days_late <= 0 {
            return 0.0;
        }
        let raw = self.per_day.max(0.0) * days_late as f64;
        match self.max_penalty {
            Some(cap) => raw.min(cap.max(0.0)),
            None => raw,
        }
    }
}

/// Caller-supplied attempt information.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillInputs {
    pub attempt_count: u32,
    pub days_late: i64,
    /// 1.0 means no bonus. History analysis is the caller's job.
    pub improvement_factor: f64,
}

impl Default for SkillInputs {
    fn default() -> Self {
        Self {
            attempt_count: 1,
            days_late: 0,
            improvement_factor: 1.0,
        }
    }
}

/// Classify `final_score` against `threshold`; `exceeds` starts at `threshold * multiplier`.
pub fn classify_mastery(final_score: f64, threshold: f64, multiplier: f64) -> MasteryLevel {
    let score = round2(final_score);
    if score >= round2(threshold * multiplier) {
        MasteryLevel::Exceeds
    } else if score >= round2(threshold) {
        MasteryLevel::Met
    } else {
        MasteryLevel::NotMet
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SkillAssessmentEngine {
    late_penalty: LatePenalty,
    mastery_multiplier: f64,
}

impl Default for SkillAssessmentEngine {
    fn default() -> Self {
        Self::new(LatePenalty::default(), 1.15)
    }
}

impl SkillAssessmentEngine {
    pub fn new(late_penalty: LatePenalty, mastery_multiplier: f64) -> Self {
        Self {
            late_penalty,
            mastery_multiplier,
        }
    }

    /// Weighted average of linked results' percentages.
    ///
    /// Only links with a result contribute, and the divisor is the sum of
    /// those links' weights. No contributing link yields zero.
    pub fn normalized_score(&self, view: &SkillView) -> f64 {
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for link in view.links.iter().filter(|l| l.skill_id == view.skill.id) {
            let Some(result) = view.results.get(&link.activity_id) else {
                continue;
            };
            if link.weight <= 0.0 {
                continue;
            }
            weighted += result.percentage_score * link.weight;
            weight_sum += link.weight;
        }

        if weight_sum > 0.0 {
            round2(weighted / weight_sum)
        } else {
            0.0
        }
    }

    /// Build the complete replacement assessment for student+skill.
    pub fn compute_skill_assessment(
        &self,
        view: &SkillView,
        inputs: SkillInputs,
        now: DateTime<Utc>,
    ) -> GradeResult<SkillAssessment> {
        if !inputs.improvement_factor.is_finite() || inputs.improvement_factor <= 0.0 {
            return Err(GradeError::Validation(format!(
                "improvement factor must be positive, got {}",
                inputs.improvement_factor
            )));
        }

        let normalized_score = self.normalized_score(view);
        let final_score = round2(
            (normalized_score * inputs.improvement_factor
                - self.late_penalty.penalty(inputs.days_late))
            .clamp(0.0, 100.0),
        );
        let mastery_level = classify_mastery(
            final_score,
            view.skill.competency_threshold,
            self.mastery_multiplier,
        );

        tracing::debug!(
            "skill {} for {}: normalized {normalized_score}, final {final_score}, {mastery_level}",
            view.skill.id,
            view.student_id
        );

        Ok(SkillAssessment {
            student_id: view.student_id.clone(),
            skill_id: view.skill.id.clone(),
            normalized_score,
            attempt_count: inputs.attempt_count,
            improvement_factor: inputs.improvement_factor,
            days_late: inputs.days_late,
            final_score,
            mastery_level,
            assessed_at: now,
        })
    }
}
