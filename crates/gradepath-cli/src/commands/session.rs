//! Loads gradebooks into a store and replays their recorded work through
//! the grading pipeline. Shared by `grade` and `skills`.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use gradepath_core::config::{load_config_from, GradepathConfig};
use gradepath_core::engine::{BatchOutcome, BatchReporter, CourseRefresh, GradingPipeline};
use gradepath_core::parser::{self, Gradebook, StudentRecord};
use gradepath_core::scorer::ManualGrade;
use gradepath_core::traits::{GradeStore, TracingNotifier};
use gradepath_core::weights::WeightResolver;
use gradepath_store::MemoryStore;

/// Console batch reporter.
struct ConsoleReporter;

impl BatchReporter for ConsoleReporter {
    fn on_refresh_complete(&self, refresh: &CourseRefresh) {
        let p = &refresh.progress;
        eprintln!(
            "  Done: {} :: {} progress {:.2}% ({}/{} modules complete){}",
            p.student_id,
            p.course_id,
            p.progress,
            p.completed_modules,
            p.total_modules,
            if p.is_completed { " COMPLETED" } else { "" }
        );
    }

    fn on_refresh_error(&self, student_id: &str, course_id: &str, error: &str) {
        eprintln!("  ERROR: {student_id} :: {course_id}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} refreshed, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

/// Gradebooks loaded into a memory store with a pipeline over it.
pub struct Session {
    pub books: Vec<Gradebook>,
    pub pipeline: GradingPipeline,
}

impl Session {
    pub async fn open(gradebook_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config: GradepathConfig = load_config_from(config_path)?;

        let books = if gradebook_path.is_dir() {
            parser::load_gradebook_directory(gradebook_path)?
        } else {
            vec![parser::parse_gradebook(gradebook_path)?]
        };
        anyhow::ensure!(
            !books.is_empty(),
            "no gradebooks found in {}",
            gradebook_path.display()
        );

        let store = Arc::new(MemoryStore::new());
        for book in &books {
            store.add_gradebook(book).await;
        }

        let settings = store
            .load_grade_settings()
            .await
            .context("failed to load grade settings")?;
        let resolver = Arc::new(WeightResolver::new(
            settings,
            config.default_weights.clone(),
        ));
        let pipeline = GradingPipeline::new(
            store,
            Arc::new(TracingNotifier),
            resolver,
            config.pipeline_config(),
        );

        Ok(Self { books, pipeline })
    }

    /// Student+course pairs in gradebook order, optionally for one student.
    pub fn pairs(&self, student: Option<&str>) -> Result<Vec<(String, String)>> {
        let pairs: Vec<(String, String)> = self
            .books
            .iter()
            .flat_map(|book| {
                book.students
                    .iter()
                    .filter(|s| student.map_or(true, |id| s.id == id))
                    .map(|s| (s.id.clone(), book.course.id.clone()))
            })
            .collect();

        if let Some(id) = student {
            anyhow::ensure!(!pairs.is_empty(), "student {id} not found in any gradebook");
        }
        Ok(pairs)
    }

    /// Grade the recorded work of every selected student, then refresh
    /// each student+course pair.
    pub async fn replay(&self, student: Option<&str>) -> Result<BatchOutcome> {
        let pairs = self.pairs(student)?;
        for book in &self.books {
            for record in &book.students {
                if student.map_or(true, |id| record.id == id) {
                    self.replay_student(book, record).await;
                }
            }
        }
        Ok(self.pipeline.recompute_batch(&pairs, &ConsoleReporter).await)
    }

    /// Bad entries are logged and skipped; the rest of the record still counts.
    async fn replay_student(&self, book: &Gradebook, record: &StudentRecord) {
        let answered: BTreeSet<&str> = record
            .answers
            .iter()
            .filter_map(|a| {
                book.questions
                    .iter()
                    .find(|q| q.id == a.question_id)
                    .map(|q| q.activity_id.as_str())
            })
            .collect();

        for activity in book.activities_in_order() {
            if !answered.contains(activity.id.as_str()) {
                continue;
            }
            if let Err(e) = self.pipeline.submit_activity(&record.id, &activity.id).await {
                tracing::warn!("skipping submission of {} by {}: {e:#}", activity.id, record.id);
            }
        }

        for review in &record.reviews {
            if let Err(e) = self
                .pipeline
                .grade_answer_manually(
                    &record.id,
                    &review.question_id,
                    review.points,
                    review.correctness,
                )
                .await
            {
                tracing::warn!(
                    "skipping review of {} for {}: {e:#}",
                    review.question_id,
                    record.id
                );
            }
        }

        for entry in &record.manual_grades {
            let grade = ManualGrade {
                score: entry.score,
                max_score: entry.max_score,
            };
            if let Err(e) = self
                .pipeline
                .grade_activity_manually(&record.id, &entry.activity_id, grade)
                .await
            {
                tracing::warn!(
                    "skipping manual grade of {} for {}: {e:#}",
                    entry.activity_id,
                    record.id
                );
            }
        }
    }

    pub fn book(&self, course_id: &str) -> Option<&Gradebook> {
        self.books.iter().find(|b| b.course.id == course_id)
    }
}
