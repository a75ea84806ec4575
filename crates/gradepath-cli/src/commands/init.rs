//! The `gradepath init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("gradepath.toml").exists() {
        println!("gradepath.toml already exists, skipping.");
    } else {
        std::fs::write("gradepath.toml", SAMPLE_CONFIG)?;
        println!("Created gradepath.toml");
    }

    std::fs::create_dir_all("gradebooks")?;
    let example_path = std::path::Path::new("gradebooks/example.toml");
    if example_path.exists() {
        println!("gradebooks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_GRADEBOOK)?;
        println!("Created gradebooks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Adjust the weights and penalties in gradepath.toml");
    println!("  2. Run: gradepath validate --gradebook gradebooks/example.toml");
    println!("  3. Run: gradepath grade --gradebook gradebooks/example.toml --format all");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gradepath configuration

parallelism = 4
max_retries = 3
retry_delay_ms = 50

# Skill mastery
late_penalty_per_day = 5.0
# max_late_penalty = 25.0
mastery_multiplier = 1.15

output_dir = "./gradepath-reports"

# Used when a gradebook has no settings for a course or globally.
[default_weights.module_components]
lessons = 30.0
activities = 70.0

[default_weights.activity_types]
Quiz = 25.0
Assignment = 25.0
Assessment = 25.0
Exercise = 25.0
"#;

const EXAMPLE_GRADEBOOK: &str = r#"# Example gradebook: one course, two modules, two students.

[course]
id = "algebra-1"
title = "Algebra I"

[[modules]]
id = "linear"
title = "Linear equations"

[[modules]]
id = "quadratics"
title = "Quadratics"

[[lessons]]
id = "linear-intro"
module = "linear"
title = "What is a linear equation?"

[[lessons]]
id = "linear-solving"
module = "linear"
title = "Solving for x"

[[lessons]]
id = "quadratics-intro"
module = "quadratics"
title = "Parabolas"

[[activities]]
id = "linear-quiz"
module = "linear"
title = "Linear equations quiz"
type = "quiz"
passing_score = 60.0

[[activities]]
id = "linear-homework"
module = "linear"
title = "Word problems"
type = "assignment"

[[activities]]
id = "quadratics-project"
module = "quadratics"
title = "Projectile motion project"
type = "project"

[[activities]]
id = "quadratics-practice"
module = "quadratics"
title = "Factoring practice"
type = "exercise"

[[questions]]
id = "lq-1"
activity = "linear-quiz"
type = "multiple_choice"
points = 2

[[questions.options]]
id = "a"
text = "x = 3"
correct = true

[[questions.options]]
id = "b"
text = "x = -3"

[[questions]]
id = "lq-2"
activity = "linear-quiz"
type = "true_false"

[[questions.options]]
id = "true"
text = "True"
correct = true

[[questions.options]]
id = "false"
text = "False"

[[questions]]
id = "lq-3"
activity = "linear-quiz"
type = "short_answer"
points = 2
acceptable_answers = ["x = 4", "x=4", "4"]

[[questions]]
id = "lh-1"
activity = "linear-homework"
type = "essay"
points = 5

[[settings]]
scope = "course"
dimension = "module_components"
weights = { lessons = 20.0, activities = 80.0 }

[[settings]]
scope = "global"
dimension = "activity_types"
weights = { Quiz = 40.0, Assignment = 40.0, Assessment = 10.0, Exercise = 10.0 }

[[skills]]
id = "solve-linear"
name = "Solving linear equations"
competency_threshold = 70.0

[[skill_links]]
skill = "solve-linear"
activity = "linear-quiz"
weight = 2.0

[[skill_links]]
skill = "solve-linear"
activity = "linear-homework"
weight = 1.0

[[students]]
id = "ada"
completed_lessons = ["linear-intro", "linear-solving", "quadratics-intro"]

[[students.answers]]
question = "lq-1"
options = ["a"]

[[students.answers]]
question = "lq-2"
options = ["true"]

[[students.answers]]
question = "lq-3"
text = "X = 4"

[[students.answers]]
question = "lh-1"
text = "A train leaves the station at 3pm..."

[[students.reviews]]
question = "lh-1"
points = 4.0
correct = true

[[students.manual_grades]]
activity = "quadratics-project"
score = 45.0
max_score = 50.0

[[students.statuses]]
activity = "quadratics-practice"
status = "completed"

[[students]]
id = "ben"
completed_lessons = ["linear-intro"]

[[students.answers]]
question = "lq-1"
options = ["a", "b"]

[[students.answers]]
question = "lq-2"
options = ["false"]

[[students.answers]]
question = "lq-3"
text = "4"
"#;
