//! The `gradepath grade` command.

use std::path::PathBuf;

use anyhow::Result;

use gradepath_core::report::GradeReport;
use gradepath_core::skill::SkillInputs;
use gradepath_report::html::write_html_report;
use gradepath_report::markdown::write_markdown_report;

use super::session::Session;

pub async fn execute(
    gradebook_path: PathBuf,
    student: Option<String>,
    output: PathBuf,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let formats: Vec<&str> = if format == "all" {
        vec!["json", "html", "markdown"]
    } else {
        format.split(',').map(str::trim).collect()
    };
    for fmt in &formats {
        anyhow::ensure!(
            matches!(*fmt, "json" | "html" | "markdown" | "md"),
            "unknown format: {fmt} (expected json, html, markdown, or all)"
        );
    }

    let session = Session::open(&gradebook_path, config_path.as_deref()).await?;
    let pairs = session.pairs(student.as_deref())?;

    eprintln!(
        "gradepath v{}: grading {} enrollment(s) across {} course(s)",
        env!("CARGO_PKG_VERSION"),
        pairs.len(),
        session.books.len()
    );
    eprintln!();

    let outcome = session.replay(student.as_deref()).await?;

    let mut reports = Vec::with_capacity(pairs.len());
    for (student_id, course_id) in &pairs {
        let mut assessments = Vec::new();
        if let Some(book) = session.book(course_id) {
            for skill in &book.skills {
                assessments.push(
                    session
                        .pipeline
                        .assess_skill(student_id, &skill.id, SkillInputs::default())
                        .await?,
                );
            }
        }
        let report = session
            .pipeline
            .build_report(student_id, course_id)
            .await?
            .with_skill_assessments(assessments);
        reports.push(report);
    }

    print_summary(&reports);

    std::fs::create_dir_all(&output)?;
    for report in &reports {
        let stem = format!("{}-{}", report.course.id, report.student_id);
        for fmt in &formats {
            match *fmt {
                "json" => {
                    let path = output.join(format!("{stem}.json"));
                    report.save_json(&path)?;
                    eprintln!("Report saved to: {}", path.display());
                }
                "html" => {
                    let path = output.join(format!("{stem}.html"));
                    write_html_report(report, &path)?;
                    eprintln!("HTML report: {}", path.display());
                }
                _ => {
                    let path = output.join(format!("{stem}.md"));
                    write_markdown_report(report, &path)?;
                    eprintln!("Markdown report: {}", path.display());
                }
            }
        }
    }

    anyhow::ensure!(
        outcome.is_clean(),
        "{} of {} refresh(es) failed",
        outcome.failures.len(),
        pairs.len()
    );
    Ok(())
}

fn print_summary(reports: &[GradeReport]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Student",
        "Course",
        "Progress",
        "Modules",
        "Avg Module Score",
        "Completed",
    ]);

    for report in reports {
        let p = &report.progress;
        table.add_row(vec![
            Cell::new(&report.student_id),
            Cell::new(&report.course.id),
            Cell::new(format!("{:.2}%", p.progress)),
            Cell::new(format!("{}/{}", p.completed_modules, p.total_modules)),
            Cell::new(format!("{:.2}%", report.average_module_score)),
            Cell::new(
                p.completed_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    eprintln!("\n{table}");
}
