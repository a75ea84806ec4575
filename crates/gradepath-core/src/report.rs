//! Grade report types with JSON persistence and change detection.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::completion::ModuleTally;
use crate::model::{round2, Activity, ActivityResult, ActivityStatus, ActivityType, SkillAssessment};
use crate::progress::CourseProgress;

/// A student's standing in one course.
///
/// Carries both progress signals: the count-based course `progress` and
/// the weighted per-module scores with their average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub student_id: String,
    pub course: CourseSummary,
    pub progress: CourseProgress,
    /// Mean of the module scores, zero for a course without modules.
    pub average_module_score: f64,
    pub module_reports: Vec<ModuleReport>,
    #[serde(default)]
    pub skill_assessments: Vec<SkillAssessment>,
}

/// Summary of a course (without its full structure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub module_count: usize,
    pub activity_count: usize,
}

/// One module row of a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    pub module_id: String,
    pub title: String,
    /// A completion record exists for the module.
    pub is_complete: bool,
    /// Weighted module score in percent.
    pub module_score: f64,
    pub tally: ModuleTally,
    pub activities: Vec<ActivityLine>,
}

/// One activity row of a module report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLine {
    pub activity_id: String,
    pub title: String,
    pub activity_type: ActivityType,
    pub status: ActivityStatus,
    pub score: f64,
    pub max_score: f64,
    pub percentage_score: f64,
    #[serde(default)]
    pub passed: Option<bool>,
}

impl ActivityLine {
    /// An activity without a result reads as not started with zero points.
    pub fn new(activity: &Activity, result: Option<&ActivityResult>) -> Self {
        Self {
            activity_id: activity.id.clone(),
            title: activity.title.clone(),
            activity_type: activity.activity_type,
            status: result.map(|r| r.status).unwrap_or(ActivityStatus::NotStarted),
            score: result.map(|r| r.score).unwrap_or(0.0),
            max_score: result.map(|r| r.max_score).unwrap_or(0.0),
            percentage_score: result.map(|r| r.percentage_score).unwrap_or(0.0),
            passed: result.and_then(|r| r.passed),
        }
    }
}

impl GradeReport {
    pub fn new(
        student_id: &str,
        course: CourseSummary,
        progress: CourseProgress,
        module_reports: Vec<ModuleReport>,
    ) -> Self {
        let average_module_score = if module_reports.is_empty() {
            0.0
        } else {
            round2(
                module_reports.iter().map(|m| m.module_score).sum::<f64>()
                    / module_reports.len() as f64,
            )
        };

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            student_id: student_id.to_string(),
            course,
            progress,
            average_module_score,
            module_reports,
            skill_assessments: Vec::new(),
        }
    }

    pub fn with_skill_assessments(mut self, assessments: Vec<SkillAssessment>) -> Self {
        self.skill_assessments = assessments;
        self
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradeReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare module scores against a baseline report.
    ///
    /// Changes of at most `threshold` percentage points count as unchanged.
    pub fn compare(&self, baseline: &GradeReport, threshold: f64) -> GradeChangeReport {
        let score_map = |report: &GradeReport| -> HashMap<String, (String, f64)> {
            report
                .module_reports
                .iter()
                .map(|m| (m.module_id.clone(), (m.title.clone(), m.module_score)))
                .collect()
        };

        let baseline_scores = score_map(baseline);
        let current_scores = score_map(self);

        let mut drops = Vec::new();
        let mut gains = Vec::new();
        let mut unchanged = 0usize;
        let mut new_modules = Vec::new();

        for module in &self.module_reports {
            let current = module.module_score;
            let Some((_, baseline_val)) = baseline_scores.get(&module.module_id) else {
                new_modules.push(module.module_id.clone());
                continue;
            };
            let delta = round2(current - baseline_val);
            let change = ScoreChange {
                module_id: module.module_id.clone(),
                title: module.title.clone(),
                baseline_score: *baseline_val,
                current_score: current,
                delta,
            };
            if delta < -threshold {
                drops.push(change);
            } else if delta > threshold {
                gains.push(change);
            } else {
                unchanged += 1;
            }
        }

        let mut removed_modules: Vec<String> = baseline_scores
            .keys()
            .filter(|k| !current_scores.contains_key(*k))
            .cloned()
            .collect();
        removed_modules.sort();

        GradeChangeReport {
            student_id: self.student_id.clone(),
            course_id: self.course.id.clone(),
            drops,
            gains,
            unchanged,
            new_modules,
            removed_modules,
            progress_delta: round2(self.progress.progress - baseline.progress.progress),
            average_delta: round2(self.average_module_score - baseline.average_module_score),
        }
    }
}

/// Result of comparing two grade reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeChangeReport {
    pub student_id: String,
    pub course_id: String,
    /// Modules whose score went down by more than the threshold.
    pub drops: Vec<ScoreChange>,
    /// Modules whose score went up by more than the threshold.
    pub gains: Vec<ScoreChange>,
    /// Modules with no significant change.
    pub unchanged: usize,
    /// Modules in current but not baseline.
    pub new_modules: Vec<String>,
    /// Modules in baseline but not current.
    pub removed_modules: Vec<String>,
    /// Change of the count-based course progress.
    pub progress_delta: f64,
    pub average_delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreChange {
    pub module_id: String,
    pub title: String,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
}

impl GradeChangeReport {
    /// Format the change report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} drops, {} gains, {} unchanged (progress {:+.2}, average {:+.2})\n\n",
            self.drops.len(),
            self.gains.len(),
            self.unchanged,
            self.progress_delta,
            self.average_delta
        ));

        for (heading, changes) in [("Drops", &self.drops), ("Gains", &self.gains)] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {heading}\n\n"));
            md.push_str("| Module | Baseline | Current | Delta |\n");
            md.push_str("|--------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {:.2}% | {:.2}% | {:+.2} |\n",
                    c.title, c.baseline_score, c.current_score, c.delta
                ));
            }
            md.push('\n');
        }

        if !self.new_modules.is_empty() {
            md.push_str(&format!("New modules: {}\n", self.new_modules.join(", ")));
        }
        if !self.removed_modules.is_empty() {
            md.push_str(&format!(
                "Removed modules: {}\n",
                self.removed_modules.join(", ")
            ));
        }

        md
    }

    /// Returns true if any module score dropped beyond the threshold.
    pub fn has_drops(&self) -> bool {
        !self.drops.is_empty()
    }
}
