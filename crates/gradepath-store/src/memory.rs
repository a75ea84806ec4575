//! In-memory grade store.
//!
//! Holds every table behind one `tokio::sync::RwLock`. Enrollment rows
//! carry a version that each write must match, completion records are
//! unique per student+module+course, and deletes cascade explicitly
//! through the functions at the bottom of this file.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use gradepath_core::error::GradeError;
use gradepath_core::model::{
    Activity, ActivityResult, ActivitySnapshot, ActivityStatus, Course, CourseView,
    EnrollmentProgress, GradeSetting, Lesson, Module, ModuleCompletionRecord, ModuleView,
    Question, Skill, SkillActivityLink, SkillAssessment, SkillView, SubmittedAnswer,
};
use gradepath_core::parser::Gradebook;
use gradepath_core::traits::GradeStore;

type StudentKey = (String, String);
type CompletionKey = (String, String, String);

#[derive(Debug, Default)]
struct Tables {
    courses: HashMap<String, Course>,
    modules: HashMap<String, Module>,
    lessons: HashMap<String, Lesson>,
    /// In insertion order; views keep it.
    activities: Vec<Activity>,
    questions: Vec<Question>,
    /// Keyed by (student, question).
    answers: HashMap<StudentKey, SubmittedAnswer>,
    /// Keyed by (student, activity).
    results: HashMap<StudentKey, ActivityResult>,
    /// (student, lesson) pairs.
    lesson_completions: HashSet<StudentKey>,
    completion_records: HashMap<CompletionKey, ModuleCompletionRecord>,
    /// Keyed by (student, course).
    enrollments: HashMap<StudentKey, EnrollmentProgress>,
    skills: HashMap<String, Skill>,
    skill_links: Vec<SkillActivityLink>,
    /// Keyed by (student, skill).
    skill_assessments: HashMap<StudentKey, SkillAssessment>,
    settings: Vec<GradeSetting>,
}

/// Row counts removed by a cascading delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removed {
    pub courses: usize,
    pub modules: usize,
    pub lessons: usize,
    pub lesson_completions: usize,
    pub activities: usize,
    pub questions: usize,
    pub answers: usize,
    pub results: usize,
    pub skill_links: usize,
    pub completion_records: usize,
    pub enrollments: usize,
    pub settings: usize,
}

/// A [`GradeStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a gradebook snapshot.
    ///
    /// Student answers, lesson completions and activity statuses are stored
    /// as submitted; manual grades and reviews are left for the pipeline.
    pub fn from_gradebook(book: &Gradebook) -> Self {
        let mut tables = Tables::default();
        tables.insert_gradebook(book);
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Merge another course snapshot into the store.
    pub async fn add_gradebook(&self, book: &Gradebook) {
        self.tables.write().await.insert_gradebook(book);
    }

    pub async fn course_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.read().await.courses.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Students with an enrollment row in `course_id`, sorted.
    pub async fn enrolled_students(&self, course_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tables
            .read()
            .await
            .enrollments
            .keys()
            .filter(|(_, course)| course == course_id)
            .map(|(student, _)| student.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Create a version-0 enrollment row if none exists.
    pub async fn enroll(&self, student_id: &str, course_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(course_id) {
            return Err(GradeError::NotFound(format!("course {course_id}")).into());
        }
        tables
            .enrollments
            .entry((student_id.to_string(), course_id.to_string()))
            .or_insert_with(|| EnrollmentProgress::new(student_id, course_id));
        Ok(())
    }

    /// Store or replace a student's answer to a question. A manually
    /// graded answer is final and rejects resubmission.
    pub async fn submit_answer(&self, answer: SubmittedAnswer) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.questions.iter().any(|q| q.id == answer.question_id) {
            return Err(GradeError::NotFound(format!("question {}", answer.question_id)).into());
        }
        let key = (answer.student_id.clone(), answer.question_id.clone());
        if tables.answers.get(&key).is_some_and(|a| a.is_manually_graded()) {
            return Err(GradeError::Validation(format!(
                "answer of {} to question {} is already graded",
                answer.student_id, answer.question_id
            ))
            .into());
        }
        tables.answers.insert(key, answer);
        Ok(())
    }

    pub async fn complete_lesson(&self, student_id: &str, lesson_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.lessons.contains_key(lesson_id) {
            return Err(GradeError::NotFound(format!("lesson {lesson_id}")).into());
        }
        tables
            .lesson_completions
            .insert((student_id.to_string(), lesson_id.to_string()));
        Ok(())
    }

    /// Record a status without a grade, keeping any stored score.
    pub async fn set_activity_status(
        &self,
        student_id: &str,
        activity_id: &str,
        status: ActivityStatus,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.activities.iter().any(|a| a.id == activity_id) {
            return Err(GradeError::NotFound(format!("activity {activity_id}")).into());
        }
        tables
            .results
            .entry((student_id.to_string(), activity_id.to_string()))
            .and_modify(|r| r.status = status)
            .or_insert_with(|| ActivityResult::with_status(student_id, activity_id, status));
        Ok(())
    }

    /// Replace the stored weight rows of the scopes and dimensions in `rows`.
    pub async fn save_grade_settings(&self, rows: &[GradeSetting]) {
        let mut tables = self.tables.write().await;
        tables.settings.retain(|s| {
            !rows
                .iter()
                .any(|r| r.course_id == s.course_id && r.dimension == s.dimension)
        });
        tables.settings.extend(rows.iter().cloned());
    }

    pub async fn activity_result(&self, student_id: &str, activity_id: &str) -> Option<ActivityResult> {
        self.tables
            .read()
            .await
            .results
            .get(&(student_id.to_string(), activity_id.to_string()))
            .cloned()
    }

    pub async fn answer(&self, student_id: &str, question_id: &str) -> Option<SubmittedAnswer> {
        self.tables
            .read()
            .await
            .answers
            .get(&(student_id.to_string(), question_id.to_string()))
            .cloned()
    }

    pub async fn completion_records(&self, student_id: &str) -> Vec<ModuleCompletionRecord> {
        self.tables
            .read()
            .await
            .completion_records
            .values()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect()
    }

    pub async fn skill_assessment(&self, student_id: &str, skill_id: &str) -> Option<SkillAssessment> {
        self.tables
            .read()
            .await
            .skill_assessments
            .get(&(student_id.to_string(), skill_id.to_string()))
            .cloned()
    }

    pub async fn skill_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.read().await.skills.keys().cloned().collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Cascading deletes
    // -----------------------------------------------------------------------

    /// Delete a question and its answers.
    pub async fn delete_question(&self, question_id: &str) -> Result<Removed> {
        let mut removed = Removed::default();
        self.tables
            .write()
            .await
            .delete_question(question_id, &mut removed)?;
        Ok(removed)
    }

    /// Delete an activity with its questions, answers, results, and skill links.
    pub async fn delete_activity(&self, activity_id: &str) -> Result<Removed> {
        let mut removed = Removed::default();
        self.tables
            .write()
            .await
            .delete_activity(activity_id, &mut removed)?;
        Ok(removed)
    }

    /// Delete a module with its lessons, activities, and completion records.
    pub async fn delete_module(&self, module_id: &str) -> Result<Removed> {
        let mut removed = Removed::default();
        self.tables
            .write()
            .await
            .delete_module(module_id, &mut removed)?;
        Ok(removed)
    }

    /// Delete a course with its modules, enrollments, and course-scoped settings.
    pub async fn delete_course(&self, course_id: &str) -> Result<Removed> {
        let mut removed = Removed::default();
        self.tables
            .write()
            .await
            .delete_course(course_id, &mut removed)?;
        Ok(removed)
    }
}

impl Tables {
    fn insert_gradebook(&mut self, book: &Gradebook) {
        let course_id = book.course.id.clone();
        self.courses.insert(course_id.clone(), book.course.clone());
        for module in &book.modules {
            self.modules.insert(module.id.clone(), module.clone());
        }
        for lesson in &book.lessons {
            self.lessons.insert(lesson.id.clone(), lesson.clone());
        }
        self.activities.extend(book.activities.iter().cloned());
        self.questions.extend(book.questions.iter().cloned());
        self.settings.extend(book.settings.iter().cloned());
        for skill in &book.skills {
            self.skills.insert(skill.id.clone(), skill.clone());
        }
        self.skill_links.extend(book.skill_links.iter().cloned());

        for student in &book.students {
            self.enrollments
                .entry((student.id.clone(), course_id.clone()))
                .or_insert_with(|| EnrollmentProgress::new(&student.id, &course_id));
            for lesson in &student.completed_lessons {
                self.lesson_completions
                    .insert((student.id.clone(), lesson.clone()));
            }
            for answer in &student.answers {
                self.answers.insert(
                    (student.id.clone(), answer.question_id.clone()),
                    answer.clone(),
                );
            }
            for (activity_id, status) in &student.statuses {
                self.results.insert(
                    (student.id.clone(), activity_id.clone()),
                    ActivityResult::with_status(&student.id, activity_id, *status),
                );
            }
        }

        tracing::debug!(
            "loaded course {course_id}: {} modules, {} activities, {} students",
            book.modules.len(),
            book.activities.len(),
            book.students.len()
        );
    }

    fn activity(&self, activity_id: &str) -> Result<&Activity, GradeError> {
        self.activities
            .iter()
            .find(|a| a.id == activity_id)
            .ok_or_else(|| GradeError::NotFound(format!("activity {activity_id}")))
    }

    fn snapshot(&self, activity_id: &str) -> Result<ActivitySnapshot, GradeError> {
        let activity = self.activity(activity_id)?;
        let module = self.modules.get(&activity.module_id).ok_or_else(|| {
            GradeError::InconsistentState(format!(
                "activity {activity_id} belongs to missing module {}",
                activity.module_id
            ))
        })?;
        Ok(ActivitySnapshot {
            activity: activity.clone(),
            course_id: module.course_id.clone(),
            questions: self
                .questions
                .iter()
                .filter(|q| q.activity_id == activity_id)
                .cloned()
                .collect(),
        })
    }

    fn results_for<'a>(
        &self,
        student_id: &str,
        activities: impl Iterator<Item = &'a str>,
    ) -> HashMap<String, ActivityResult> {
        activities
            .filter_map(|id| {
                self.results
                    .get(&(student_id.to_string(), id.to_string()))
                    .map(|r| (id.to_string(), r.clone()))
            })
            .collect()
    }

    fn module_ids_in_order(&self, course_id: &str) -> Vec<String> {
        let mut modules: Vec<&Module> = self
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .collect();
        modules.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        modules.into_iter().map(|m| m.id.clone()).collect()
    }

    fn delete_question(&mut self, question_id: &str, removed: &mut Removed) -> Result<(), GradeError> {
        let before = self.questions.len();
        self.questions.retain(|q| q.id != question_id);
        if self.questions.len() == before {
            return Err(GradeError::NotFound(format!("question {question_id}")));
        }
        removed.questions += 1;

        let before = self.answers.len();
        self.answers.retain(|(_, question), _| question != question_id);
        removed.answers += before - self.answers.len();
        Ok(())
    }

    fn delete_activity(&mut self, activity_id: &str, removed: &mut Removed) -> Result<(), GradeError> {
        self.activity(activity_id)?;

        let question_ids: Vec<String> = self
            .questions
            .iter()
            .filter(|q| q.activity_id == activity_id)
            .map(|q| q.id.clone())
            .collect();
        for question_id in &question_ids {
            self.delete_question(question_id, removed)?;
        }

        self.activities.retain(|a| a.id != activity_id);
        removed.activities += 1;

        let before = self.results.len();
        self.results.retain(|(_, activity), _| activity != activity_id);
        removed.results += before - self.results.len();

        let before = self.skill_links.len();
        self.skill_links.retain(|l| l.activity_id != activity_id);
        removed.skill_links += before - self.skill_links.len();
        Ok(())
    }

    fn delete_module(&mut self, module_id: &str, removed: &mut Removed) -> Result<(), GradeError> {
        if self.modules.remove(module_id).is_none() {
            return Err(GradeError::NotFound(format!("module {module_id}")));
        }
        removed.modules += 1;

        let lesson_ids: HashSet<String> = self
            .lessons
            .values()
            .filter(|l| l.module_id == module_id)
            .map(|l| l.id.clone())
            .collect();
        self.lessons.retain(|id, _| !lesson_ids.contains(id));
        removed.lessons += lesson_ids.len();

        let before = self.lesson_completions.len();
        self.lesson_completions
            .retain(|(_, lesson)| !lesson_ids.contains(lesson));
        removed.lesson_completions += before - self.lesson_completions.len();

        let activity_ids: Vec<String> = self
            .activities
            .iter()
            .filter(|a| a.module_id == module_id)
            .map(|a| a.id.clone())
            .collect();
        for activity_id in &activity_ids {
            self.delete_activity(activity_id, removed)?;
        }

        let before = self.completion_records.len();
        self.completion_records
            .retain(|(_, module, _), _| module != module_id);
        removed.completion_records += before - self.completion_records.len();
        Ok(())
    }

    fn delete_course(&mut self, course_id: &str, removed: &mut Removed) -> Result<(), GradeError> {
        if self.courses.remove(course_id).is_none() {
            return Err(GradeError::NotFound(format!("course {course_id}")));
        }
        removed.courses += 1;

        for module_id in self.module_ids_in_order(course_id) {
            self.delete_module(&module_id, removed)?;
        }

        let before = self.enrollments.len();
        self.enrollments.retain(|(_, course), _| course != course_id);
        removed.enrollments += before - self.enrollments.len();

        let before = self.settings.len();
        self.settings
            .retain(|s| s.course_id.as_deref() != Some(course_id));
        removed.settings += before - self.settings.len();
        Ok(())
    }
}

#[async_trait]
impl GradeStore for MemoryStore {
    async fn load_activity(&self, activity_id: &str) -> Result<ActivitySnapshot> {
        Ok(self.tables.read().await.snapshot(activity_id)?)
    }

    async fn load_question_activity(&self, question_id: &str) -> Result<ActivitySnapshot> {
        let tables = self.tables.read().await;
        let question = tables
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| GradeError::NotFound(format!("question {question_id}")))?;
        Ok(tables.snapshot(&question.activity_id)?)
    }

    async fn load_answers(&self, student_id: &str, activity_id: &str) -> Result<Vec<SubmittedAnswer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .iter()
            .filter(|q| q.activity_id == activity_id)
            .filter_map(|q| {
                tables
                    .answers
                    .get(&(student_id.to_string(), q.id.clone()))
                    .cloned()
            })
            .collect())
    }

    async fn save_answers(&self, answers: &[SubmittedAnswer]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for answer in answers {
            tables.answers.insert(
                (answer.student_id.clone(), answer.question_id.clone()),
                answer.clone(),
            );
        }
        Ok(())
    }

    async fn upsert_activity_result(&self, result: &ActivityResult) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.activity(&result.activity_id)?;
        tables.results.insert(
            (result.student_id.clone(), result.activity_id.clone()),
            result.clone(),
        );
        Ok(())
    }

    async fn load_module_view(&self, student_id: &str, module_id: &str) -> Result<ModuleView> {
        let tables = self.tables.read().await;
        let module = tables
            .modules
            .get(module_id)
            .ok_or_else(|| GradeError::NotFound(format!("module {module_id}")))?;

        let mut lesson_ids: Vec<String> = tables
            .lessons
            .values()
            .filter(|l| l.module_id == module_id)
            .map(|l| l.id.clone())
            .collect();
        lesson_ids.sort();
        let completed_lesson_ids = lesson_ids
            .iter()
            .filter(|id| {
                tables
                    .lesson_completions
                    .contains(&(student_id.to_string(), (*id).clone()))
            })
            .cloned()
            .collect();

        let activities: Vec<Activity> = tables
            .activities
            .iter()
            .filter(|a| a.module_id == module_id)
            .cloned()
            .collect();
        let results = tables.results_for(student_id, activities.iter().map(|a| a.id.as_str()));

        Ok(ModuleView {
            student_id: student_id.to_string(),
            course_id: module.course_id.clone(),
            module_id: module_id.to_string(),
            module_title: module.title.clone(),
            lesson_ids,
            activities,
            completed_lesson_ids,
            results,
        })
    }

    async fn find_completion_record(
        &self,
        student_id: &str,
        module_id: &str,
        course_id: &str,
    ) -> Result<Option<ModuleCompletionRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .completion_records
            .get(&(
                student_id.to_string(),
                module_id.to_string(),
                course_id.to_string(),
            ))
            .cloned())
    }

    async fn insert_completion_record(&self, record: &ModuleCompletionRecord) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.completion_records.contains_key(&record.key()) {
            tracing::debug!(
                "completion record for {}/{} already exists",
                record.student_id,
                record.module_id
            );
            return Ok(false);
        }
        tables
            .completion_records
            .insert(record.key(), record.clone());
        Ok(true)
    }

    async fn remove_completion_record(
        &self,
        student_id: &str,
        module_id: &str,
        course_id: &str,
    ) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .completion_records
            .remove(&(
                student_id.to_string(),
                module_id.to_string(),
                course_id.to_string(),
            ))
            .is_some())
    }

    async fn load_course_view(&self, student_id: &str, course_id: &str) -> Result<CourseView> {
        let tables = self.tables.read().await;
        let course = tables
            .courses
            .get(course_id)
            .ok_or_else(|| GradeError::NotFound(format!("course {course_id}")))?;

        let module_ids = tables.module_ids_in_order(course_id);
        let activities: Vec<Activity> = module_ids
            .iter()
            .flat_map(|m| tables.activities.iter().filter(move |a| &a.module_id == m))
            .cloned()
            .collect();
        let results = tables.results_for(student_id, activities.iter().map(|a| a.id.as_str()));
        let completion_records = tables
            .completion_records
            .values()
            .filter(|r| r.student_id == student_id && r.course_id == course_id)
            .cloned()
            .collect();

        Ok(CourseView {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            course_title: course.title.clone(),
            module_ids,
            activities,
            results,
            completion_records,
        })
    }

    async fn load_enrollment(&self, student_id: &str, course_id: &str) -> Result<EnrollmentProgress> {
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .get(&(student_id.to_string(), course_id.to_string()))
            .cloned()
            .unwrap_or_else(|| EnrollmentProgress::new(student_id, course_id)))
    }

    async fn update_enrollment(
        &self,
        progress: &EnrollmentProgress,
        expected_version: u64,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let key = (progress.student_id.clone(), progress.course_id.clone());
        let found = tables
            .enrollments
            .get(&key)
            .map(|e| e.version)
            .ok_or_else(|| {
                GradeError::NotFound(format!(
                    "enrollment {}/{}",
                    progress.student_id, progress.course_id
                ))
            })?;
        if found != expected_version {
            return Err(GradeError::ConcurrencyConflict {
                entity: format!("enrollment {}/{}", progress.student_id, progress.course_id),
                expected: expected_version,
                found,
            }
            .into());
        }

        let version = found + 1;
        tables.enrollments.insert(
            key,
            EnrollmentProgress {
                version,
                ..progress.clone()
            },
        );
        Ok(version)
    }

    async fn load_skill_view(&self, student_id: &str, skill_id: &str) -> Result<SkillView> {
        let tables = self.tables.read().await;
        let skill = tables
            .skills
            .get(skill_id)
            .ok_or_else(|| GradeError::NotFound(format!("skill {skill_id}")))?;
        let links: Vec<SkillActivityLink> = tables
            .skill_links
            .iter()
            .filter(|l| l.skill_id == skill_id)
            .cloned()
            .collect();
        let results = tables.results_for(student_id, links.iter().map(|l| l.activity_id.as_str()));

        Ok(SkillView {
            student_id: student_id.to_string(),
            skill: skill.clone(),
            links,
            results,
        })
    }

    async fn upsert_skill_assessment(&self, assessment: &SkillAssessment) -> Result<()> {
        self.tables.write().await.skill_assessments.insert(
            (assessment.student_id.clone(), assessment.skill_id.clone()),
            assessment.clone(),
        );
        Ok(())
    }

    async fn load_grade_settings(&self) -> Result<Vec<GradeSetting>> {
        Ok(self.tables.read().await.settings.clone())
    }
}
