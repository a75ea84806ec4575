//! The `gradepath skills` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use gradepath_core::skill::SkillInputs;

use super::session::Session;

pub async fn execute(
    gradebook_path: PathBuf,
    student: Option<String>,
    days_late: i64,
    attempts: u32,
    improvement: f64,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(days_late >= 0, "days-late must not be negative");
    anyhow::ensure!(attempts >= 1, "attempts must be at least 1");
    anyhow::ensure!(
        improvement.is_finite() && improvement > 0.0,
        "improvement must be positive"
    );

    let session = Session::open(&gradebook_path, config_path.as_deref()).await?;
    let pairs = session.pairs(student.as_deref())?;
    session.replay(student.as_deref()).await?;

    let inputs = SkillInputs {
        attempt_count: attempts,
        days_late,
        improvement_factor: improvement,
    };

    let mut table = Table::new();
    table.set_header(vec!["Student", "Skill", "Normalized", "Final", "Mastery"]);

    let mut assessed = 0;
    for (student_id, course_id) in &pairs {
        let Some(book) = session.book(course_id) else {
            continue;
        };
        for skill in &book.skills {
            let a = session
                .pipeline
                .assess_skill(student_id, &skill.id, inputs)
                .await?;
            table.add_row(vec![
                Cell::new(&a.student_id),
                Cell::new(&skill.name),
                Cell::new(format!("{:.2}", a.normalized_score)),
                Cell::new(format!("{:.2}", a.final_score)),
                Cell::new(a.mastery_level),
            ]);
            assessed += 1;
        }
    }

    if assessed == 0 {
        println!("No skills defined.");
    } else {
        println!("{table}");
    }
    Ok(())
}
