//! TOML gradebook parser.
//!
//! A gradebook is a snapshot of one course: its structure, questions,
//! weight settings, skills, and what each student has submitted so far.
//! Loads gradebooks from files and directories, and validates them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    Activity, ActivityStatus, ActivityType, Correctness, Course, GradeSetting, Lesson, Module,
    Question, QuestionOption, QuestionType, Skill, SkillActivityLink, SubmittedAnswer,
    WeightDimension,
};
use crate::weights::{is_known_key, weights_sum_to_100};

/// A parsed course snapshot.
#[derive(Debug, Clone)]
pub struct Gradebook {
    pub course: Course,
    pub modules: Vec<Module>,
    pub lessons: Vec<Lesson>,
    pub activities: Vec<Activity>,
    pub questions: Vec<Question>,
    pub settings: Vec<GradeSetting>,
    pub skills: Vec<Skill>,
    pub skill_links: Vec<SkillActivityLink>,
    pub students: Vec<StudentRecord>,
}

/// Everything one student has done in the course.
#[derive(Debug, Clone, Default)]
pub struct StudentRecord {
    pub id: String,
    pub completed_lessons: Vec<String>,
    pub answers: Vec<SubmittedAnswer>,
    /// Grades for activities without questions.
    pub manual_grades: Vec<ManualGradeEntry>,
    /// Human decisions on individual answers.
    pub reviews: Vec<AnswerReview>,
    /// Status-only progress, e.g. an exercise marked completed.
    pub statuses: Vec<(String, ActivityStatus)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManualGradeEntry {
    pub activity_id: String,
    pub score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerReview {
    pub question_id: String,
    pub points: f64,
    pub correctness: Correctness,
}

impl Gradebook {
    pub fn student(&self, id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.id == id)
    }

    /// Activities ordered by module position, then file order.
    pub fn activities_in_order(&self) -> Vec<&Activity> {
        let position: HashMap<&str, u32> = self
            .modules
            .iter()
            .map(|m| (m.id.as_str(), m.position))
            .collect();
        let mut activities: Vec<&Activity> = self.activities.iter().collect();
        activities.sort_by_key(|a| position.get(a.module_id.as_str()).copied().unwrap_or(u32::MAX));
        activities
    }
}

// ---------------------------------------------------------------------------
// TOML layout
// ---------------------------------------------------------------------------

/// Intermediate TOML structure for parsing gradebook files.
#[derive(Debug, Deserialize)]
struct TomlGradebook {
    course: TomlCourse,
    #[serde(default)]
    modules: Vec<TomlModule>,
    #[serde(default)]
    lessons: Vec<TomlLesson>,
    #[serde(default)]
    activities: Vec<TomlActivity>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
    #[serde(default)]
    settings: Vec<TomlSetting>,
    #[serde(default)]
    skills: Vec<TomlSkill>,
    #[serde(default)]
    skill_links: Vec<TomlSkillLink>,
    #[serde(default)]
    students: Vec<TomlStudent>,
}

#[derive(Debug, Deserialize)]
struct TomlCourse {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct TomlModule {
    id: String,
    title: String,
    #[serde(default)]
    position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TomlLesson {
    id: String,
    module: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct TomlActivity {
    id: String,
    module: String,
    title: String,
    #[serde(rename = "type")]
    activity_type: ActivityType,
    #[serde(default)]
    passing_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    activity: String,
    #[serde(rename = "type")]
    question_type: String,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default)]
    correct_answer: Option<String>,
    #[serde(default)]
    acceptable_answers: Vec<String>,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(default)]
    options: Vec<TomlOption>,
}

fn default_points() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    id: String,
    text: String,
    #[serde(default)]
    correct: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TomlScope {
    Global,
    Course,
}

#[derive(Debug, Deserialize)]
struct TomlSetting {
    scope: TomlScope,
    dimension: WeightDimension,
    weights: BTreeMap<String, f64>,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TomlSkill {
    id: String,
    name: String,
    competency_threshold: f64,
}

#[derive(Debug, Deserialize)]
struct TomlSkillLink {
    skill: String,
    activity: String,
    #[serde(default = "default_link_weight")]
    weight: f64,
}

fn default_link_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct TomlStudent {
    id: String,
    #[serde(default)]
    completed_lessons: Vec<String>,
    #[serde(default)]
    answers: Vec<TomlAnswer>,
    #[serde(default)]
    manual_grades: Vec<TomlManualGrade>,
    #[serde(default)]
    reviews: Vec<TomlReview>,
    #[serde(default)]
    statuses: Vec<TomlStatus>,
}

#[derive(Debug, Deserialize)]
struct TomlAnswer {
    question: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlManualGrade {
    activity: String,
    score: f64,
    max_score: f64,
}

#[derive(Debug, Deserialize)]
struct TomlReview {
    question: String,
    points: f64,
    correct: bool,
}

#[derive(Debug, Deserialize)]
struct TomlStatus {
    activity: String,
    status: ActivityStatus,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a single TOML file into a `Gradebook`.
pub fn parse_gradebook(path: &Path) -> Result<Gradebook> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read gradebook file: {}", path.display()))?;

    parse_gradebook_str(&content, path)
}

/// Parse a TOML string into a `Gradebook` (useful for testing).
pub fn parse_gradebook_str(content: &str, source_path: &Path) -> Result<Gradebook> {
    let parsed: TomlGradebook = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let course = Course {
        id: parsed.course.id,
        title: parsed.course.title,
    };

    let modules = parsed
        .modules
        .into_iter()
        .enumerate()
        .map(|(index, m)| Module {
            id: m.id,
            course_id: course.id.clone(),
            title: m.title,
            position: m.position.unwrap_or(index as u32),
        })
        .collect();

    let lessons = parsed
        .lessons
        .into_iter()
        .map(|l| Lesson {
            id: l.id,
            module_id: l.module,
            title: l.title,
        })
        .collect();

    let activities = parsed
        .activities
        .into_iter()
        .map(|a| Activity {
            id: a.id,
            module_id: a.module,
            title: a.title,
            activity_type: a.activity_type,
            passing_score: a.passing_score,
        })
        .collect();

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .with_context(|| format!("question {}", q.id))?;
            Ok(Question {
                id: q.id,
                activity_id: q.activity,
                question_type,
                points: q.points,
                correct_answer: q.correct_answer,
                acceptable_answers: q.acceptable_answers,
                case_sensitive: q.case_sensitive,
                options: q
                    .options
                    .into_iter()
                    .map(|o| QuestionOption {
                        id: o.id,
                        option_text: o.text,
                        is_correct: o.correct,
                    })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let settings = parsed
        .settings
        .into_iter()
        .enumerate()
        .flat_map(|(index, s)| {
            let course_id = match s.scope {
                TomlScope::Global => None,
                TomlScope::Course => Some(course.id.clone()),
            };
            s.weights.into_iter().map(move |(key, weight)| GradeSetting {
                id: format!("setting-{index}-{key}"),
                course_id: course_id.clone(),
                dimension: s.dimension,
                key,
                weight,
                is_active: s.active,
            })
        })
        .collect();

    let skills = parsed
        .skills
        .into_iter()
        .map(|s| Skill {
            id: s.id,
            name: s.name,
            competency_threshold: s.competency_threshold,
        })
        .collect();

    let skill_links = parsed
        .skill_links
        .into_iter()
        .map(|l| SkillActivityLink {
            skill_id: l.skill,
            activity_id: l.activity,
            weight: l.weight,
        })
        .collect();

    let students = parsed
        .students
        .into_iter()
        .map(|s| StudentRecord {
            answers: s
                .answers
                .into_iter()
                .map(|a| SubmittedAnswer {
                    selected_option_ids: a.options,
                    answer_text: a.text,
                    ..SubmittedAnswer::new(&s.id, &a.question)
                })
                .collect(),
            manual_grades: s
                .manual_grades
                .into_iter()
                .map(|g| ManualGradeEntry {
                    activity_id: g.activity,
                    score: g.score,
                    max_score: g.max_score,
                })
                .collect(),
            reviews: s
                .reviews
                .into_iter()
                .map(|r| AnswerReview {
                    question_id: r.question,
                    points: r.points,
                    correctness: Correctness::from_bool(r.correct),
                })
                .collect(),
            statuses: s
                .statuses
                .into_iter()
                .map(|st| (st.activity, st.status))
                .collect(),
            completed_lessons: s.completed_lessons,
            id: s.id,
        })
        .collect();

    Ok(Gradebook {
        course,
        modules,
        lessons,
        activities,
        questions,
        settings,
        skills,
        skill_links,
        students,
    })
}

/// Recursively load all `.toml` gradebook files from a directory.
pub fn load_gradebook_directory(dir: &Path) -> Result<Vec<Gradebook>> {
    let mut books = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            books.extend(load_gradebook_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_gradebook(&path) {
                Ok(book) => books.push(book),
                Err(e) => {
                    tracing::warn!("skipping {}: {e:#}", path.display());
                }
            }
        }
    }

    Ok(books)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A warning from gradebook validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The offending item's id (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(item_id: &str, message: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.to_string()),
            message: message.into(),
        }
    }
}

fn duplicates<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
    warnings: &mut Vec<ValidationWarning>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            warnings.push(ValidationWarning::new(id, format!("duplicate {kind} ID: {id}")));
        }
    }
    seen
}

/// Validate a gradebook for common issues.
pub fn validate_gradebook(book: &Gradebook) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let module_ids = duplicates("module", book.modules.iter().map(|m| m.id.as_str()), &mut warnings);
    let lesson_ids = duplicates("lesson", book.lessons.iter().map(|l| l.id.as_str()), &mut warnings);
    let activity_ids = duplicates(
        "activity",
        book.activities.iter().map(|a| a.id.as_str()),
        &mut warnings,
    );
    let question_ids = duplicates(
        "question",
        book.questions.iter().map(|q| q.id.as_str()),
        &mut warnings,
    );
    let skill_ids = duplicates("skill", book.skills.iter().map(|s| s.id.as_str()), &mut warnings);
    duplicates("student", book.students.iter().map(|s| s.id.as_str()), &mut warnings);

    for lesson in &book.lessons {
        if !module_ids.contains(lesson.module_id.as_str()) {
            warnings.push(ValidationWarning::new(
                &lesson.id,
                format!("lesson references unknown module {}", lesson.module_id),
            ));
        }
    }

    for activity in &book.activities {
        if !module_ids.contains(activity.module_id.as_str()) {
            warnings.push(ValidationWarning::new(
                &activity.id,
                format!("activity references unknown module {}", activity.module_id),
            ));
        }
        if let Some(passing) = activity.passing_score {
            if !(0.0..=100.0).contains(&passing) {
                warnings.push(ValidationWarning::new(
                    &activity.id,
                    format!("passing score {passing} outside 0..=100"),
                ));
            }
        }
    }

    for question in &book.questions {
        validate_question(question, &activity_ids, &mut warnings);
    }

    validate_settings(&book.settings, &mut warnings);

    for skill in &book.skills {
        if !(0.0..=100.0).contains(&skill.competency_threshold) {
            warnings.push(ValidationWarning::new(
                &skill.id,
                format!(
                    "competency threshold {} outside 0..=100",
                    skill.competency_threshold
                ),
            ));
        }
    }
    for link in &book.skill_links {
        if !skill_ids.contains(link.skill_id.as_str()) {
            warnings.push(ValidationWarning::new(
                &link.skill_id,
                "skill link references unknown skill",
            ));
        }
        if !activity_ids.contains(link.activity_id.as_str()) {
            warnings.push(ValidationWarning::new(
                &link.activity_id,
                format!("skill {} links unknown activity", link.skill_id),
            ));
        }
        if link.weight <= 0.0 {
            warnings.push(ValidationWarning::new(
                &link.skill_id,
                format!(
                    "link to {} has non-positive weight and will be ignored",
                    link.activity_id
                ),
            ));
        }
    }

    let activities_with_questions: HashSet<&str> = book
        .questions
        .iter()
        .map(|q| q.activity_id.as_str())
        .collect();

    for student in &book.students {
        for lesson in &student.completed_lessons {
            if !lesson_ids.contains(lesson.as_str()) {
                warnings.push(ValidationWarning::new(
                    &student.id,
                    format!("completed unknown lesson {lesson}"),
                ));
            }
        }
        for answer in &student.answers {
            if !question_ids.contains(answer.question_id.as_str()) {
                warnings.push(ValidationWarning::new(
                    &student.id,
                    format!("answered unknown question {}", answer.question_id),
                ));
            }
        }
        for review in &student.reviews {
            if !student.answers.iter().any(|a| a.question_id == review.question_id) {
                warnings.push(ValidationWarning::new(
                    &student.id,
                    format!("review of {} without an answer", review.question_id),
                ));
            }
        }
        for grade in &student.manual_grades {
            if !activity_ids.contains(grade.activity_id.as_str()) {
                warnings.push(ValidationWarning::new(
                    &student.id,
                    format!("manual grade for unknown activity {}", grade.activity_id),
                ));
            } else if activities_with_questions.contains(grade.activity_id.as_str()) {
                warnings.push(ValidationWarning::new(
                    &student.id,
                    format!(
                        "manual grade for {} which has questions",
                        grade.activity_id
                    ),
                ));
            }
            if grade.score < 0.0 || grade.score > grade.max_score {
                warnings.push(ValidationWarning::new(
                    &student.id,
                    format!(
                        "manual grade {} outside 0..={} for {}",
                        grade.score, grade.max_score, grade.activity_id
                    ),
                ));
            }
        }
        for (activity, _) in &student.statuses {
            if !activity_ids.contains(activity.as_str()) {
                warnings.push(ValidationWarning::new(
                    &student.id,
                    format!("status for unknown activity {activity}"),
                ));
            }
        }
    }

    warnings
}

fn validate_question(
    question: &Question,
    activity_ids: &HashSet<&str>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if !activity_ids.contains(question.activity_id.as_str()) {
        warnings.push(ValidationWarning::new(
            &question.id,
            format!("question references unknown activity {}", question.activity_id),
        ));
    }
    if question.points == 0 {
        warnings.push(ValidationWarning::new(&question.id, "points must be positive"));
    }

    match question.question_type {
        QuestionType::MultipleChoice => {
            if question.correct_option_ids().is_empty() {
                warnings.push(ValidationWarning::new(
                    &question.id,
                    "multiple choice question has no correct option",
                ));
            }
        }
        QuestionType::TrueFalse => {
            if question.options.len() != 2 {
                warnings.push(ValidationWarning::new(
                    &question.id,
                    format!(
                        "true/false question needs exactly 2 options, has {}",
                        question.options.len()
                    ),
                ));
            }
            if question.correct_option_ids().len() != 1 {
                warnings.push(ValidationWarning::new(
                    &question.id,
                    "true/false question needs exactly one correct option",
                ));
            }
        }
        QuestionType::ShortAnswer | QuestionType::Enumeration => {
            if question.correct_answer.is_none() && question.acceptable_answers.is_empty() {
                warnings.push(ValidationWarning::new(
                    &question.id,
                    "no reference answer; answers will wait for review",
                ));
            }
        }
        QuestionType::Essay | QuestionType::FileUpload => {}
    }
}

fn validate_settings(settings: &[GradeSetting], warnings: &mut Vec<ValidationWarning>) {
    let mut scopes: BTreeMap<(Option<&str>, String), BTreeMap<String, f64>> = BTreeMap::new();
    for setting in settings.iter().filter(|s| s.is_active) {
        scopes
            .entry((setting.course_id.as_deref(), setting.dimension.to_string()))
            .or_default()
            .insert(setting.key.clone(), setting.weight);
    }

    for ((course, dimension), weights) in &scopes {
        let scope = course.unwrap_or("global");
        if !weights_sum_to_100(weights.values().copied()) {
            warnings.push(ValidationWarning::new(
                scope,
                format!(
                    "{dimension} weights sum to {:.2}, not 100",
                    weights.values().sum::<f64>()
                ),
            ));
        }
    }

    for setting in settings.iter().filter(|s| s.is_active) {
        if !is_known_key(setting.dimension, &setting.key) {
            warnings.push(ValidationWarning::new(
                &setting.id,
                format!("unknown {} weight key '{}'", setting.dimension, setting.key),
            ));
        }
        if !setting.weight.is_finite() || setting.weight < 0.0 {
            warnings.push(ValidationWarning::new(
                &setting.id,
                format!("weight for '{}' must be non-negative", setting.key),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[course]
id = "algebra"
title = "Algebra I"

[[modules]]
id = "m1"
title = "Linear equations"

[[modules]]
id = "m2"
title = "Quadratics"

[[lessons]]
id = "l1"
module = "m1"
title = "Intro"

[[activities]]
id = "q1"
module = "m1"
title = "Quiz 1"
type = "quiz"
passing_score = 60.0

[[activities]]
id = "p1"
module = "m2"
title = "Project"
type = "project"

[[questions]]
id = "q1-1"
activity = "q1"
type = "multiple_choice"
points = 2

[[questions.options]]
id = "a"
text = "x = 2"
correct = true

[[questions.options]]
id = "b"
text = "x = 3"

[[questions]]
id = "q1-2"
activity = "q1"
type = "short_answer"
correct_answer = "Paris"

[[settings]]
scope = "course"
dimension = "module_components"
weights = { lessons = 20.0, activities = 80.0 }

[[skills]]
id = "solve"
name = "Solving equations"
competency_threshold = 70.0

[[skill_links]]
skill = "solve"
activity = "q1"
weight = 2.0

[[students]]
id = "ada"
completed_lessons = ["l1"]

[[students.answers]]
question = "q1-1"
options = ["a"]

[[students.answers]]
question = "q1-2"
text = "paris"

[[students.manual_grades]]
activity = "p1"
score = 45.0
max_score = 50.0
"#;

    #[test]
    fn parse_valid_toml() {
        let book = parse_gradebook_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(book.course.id, "algebra");
        assert_eq!(book.modules.len(), 2);
        assert_eq!(book.modules[1].position, 1);
        assert_eq!(book.modules[0].course_id, "algebra");
        assert_eq!(book.activities[1].activity_type, ActivityType::Project);
        assert_eq!(book.questions[0].correct_option_ids(), vec!["a"]);
        assert_eq!(book.questions[1].question_type, QuestionType::ShortAnswer);
        assert_eq!(book.questions[1].points, 1);
        assert_eq!(book.settings.len(), 2);
        assert!(book
            .settings
            .iter()
            .all(|s| s.course_id.as_deref() == Some("algebra")));
        assert_eq!(book.skill_links[0].weight, 2.0);

        let ada = book.student("ada").unwrap();
        assert_eq!(ada.answers.len(), 2);
        assert_eq!(ada.answers[0].student_id, "ada");
        assert_eq!(ada.answers[0].correctness, Correctness::PendingReview);
        assert_eq!(ada.manual_grades[0].score, 45.0);

        assert!(validate_gradebook(&book).is_empty());
    }

    #[test]
    fn parse_minimal() {
        let toml = r#"
[course]
id = "empty"
title = "Empty"
"#;
        let book = parse_gradebook_str(toml, &PathBuf::from("test.toml")).unwrap();
        assert!(book.modules.is_empty());
        assert!(validate_gradebook(&book).is_empty());
    }

    #[test]
    fn unknown_question_type_is_an_error() {
        let toml = r#"
[course]
id = "c"
title = "C"

[[questions]]
id = "q"
activity = "a"
type = "drawing"
"#;
        let err = parse_gradebook_str(toml, &PathBuf::from("test.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("unknown question type"));
    }

    #[test]
    fn validate_duplicates_and_dangling_references() {
        let toml = r#"
[course]
id = "c"
title = "C"

[[modules]]
id = "m1"
title = "One"

[[modules]]
id = "m1"
title = "Again"

[[activities]]
id = "a1"
module = "m9"
title = "Orphan"
type = "exercise"

[[students]]
id = "s1"
completed_lessons = ["nope"]
"#;
        let book = parse_gradebook_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_gradebook(&book);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate module")));
        assert!(warnings.iter().any(|w| w.message.contains("unknown module m9")));
        assert!(warnings.iter().any(|w| w.message.contains("unknown lesson nope")));
    }

    #[test]
    fn validate_question_shapes() {
        let toml = r#"
[course]
id = "c"
title = "C"

[[modules]]
id = "m1"
title = "One"

[[activities]]
id = "a1"
module = "m1"
title = "Quiz"
type = "quiz"

[[questions]]
id = "mc"
activity = "a1"
type = "multiple_choice"

[[questions.options]]
id = "x"
text = "X"

[[questions]]
id = "tf"
activity = "a1"
type = "true_false"

[[questions.options]]
id = "t"
text = "True"
correct = true

[[questions]]
id = "zero"
activity = "a1"
type = "essay"
points = 0
"#;
        let book = parse_gradebook_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_gradebook(&book);
        assert!(warnings
            .iter()
            .any(|w| w.item_id.as_deref() == Some("mc") && w.message.contains("no correct option")));
        assert!(warnings
            .iter()
            .any(|w| w.item_id.as_deref() == Some("tf") && w.message.contains("exactly 2")));
        assert!(warnings
            .iter()
            .any(|w| w.item_id.as_deref() == Some("zero") && w.message.contains("positive")));
    }

    #[test]
    fn validate_weight_sums_and_keys() {
        let toml = r#"
[course]
id = "c"
title = "C"

[[settings]]
scope = "global"
dimension = "activity_types"
weights = { Quiz = 50.0, Assignment = 30.0, Homework = 10.0 }
"#;
        let book = parse_gradebook_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_gradebook(&book);
        assert!(warnings.iter().any(|w| w.message.contains("not 100")));
        assert!(warnings.iter().any(|w| w.message.contains("Homework")));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_gradebook_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("algebra.toml"), VALID_TOML).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("broken.toml"), "[course").unwrap();

        let books = load_gradebook_directory(dir.path()).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].course.id, "algebra");
    }
}
