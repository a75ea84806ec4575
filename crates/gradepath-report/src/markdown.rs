//! Markdown report generator.

use std::path::Path;

use anyhow::{Context, Result};

use gradepath_core::report::GradeReport;

/// Table cells cannot contain raw pipes.
fn cell(s: &str) -> String {
    s.replace('|', "\\|")
}

pub fn generate_markdown(report: &GradeReport) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# {}: {}\n\n",
        cell(&report.course.title),
        cell(&report.student_id)
    ));
    md.push_str(&format!(
        "**Progress:** {:.2}% ({}/{} activities) | **Modules complete:** {}/{} | **Average module score:** {:.2}%\n\n",
        report.progress.progress,
        report.progress.completed_activities,
        report.progress.total_activities,
        report.progress.completed_modules,
        report.progress.total_modules,
        report.average_module_score,
    ));
    if let Some(at) = report.progress.completed_at {
        md.push_str(&format!(
            "Course completed on {}.\n\n",
            at.format("%Y-%m-%d")
        ));
    }

    md.push_str("## Modules\n\n");
    md.push_str("| Module | Complete | Lessons | Activities | Score |\n");
    md.push_str("|--------|----------|---------|------------|-------|\n");
    for m in &report.module_reports {
        md.push_str(&format!(
            "| {} | {} | {}/{} | {}/{} | {:.2}% |\n",
            cell(&m.title),
            if m.is_complete { "yes" } else { "no" },
            m.tally.lessons_completed,
            m.tally.lessons_total,
            m.tally.activities_done,
            m.tally.activities_total,
            m.module_score
        ));
    }
    md.push('\n');

    for m in report.module_reports.iter().filter(|m| !m.activities.is_empty()) {
        md.push_str(&format!("### {}\n\n", m.title));
        md.push_str("| Activity | Type | Status | Score | Percent |\n");
        md.push_str("|----------|------|--------|-------|---------|\n");
        for a in &m.activities {
            md.push_str(&format!(
                "| {} | {} | {:?} | {}/{} | {:.2}% |\n",
                cell(&a.title),
                a.activity_type,
                a.status,
                a.score,
                a.max_score,
                a.percentage_score
            ));
        }
        md.push('\n');
    }

    if !report.skill_assessments.is_empty() {
        md.push_str("## Skills\n\n");
        md.push_str("| Skill | Final score | Mastery |\n");
        md.push_str("|-------|-------------|---------|\n");
        for s in &report.skill_assessments {
            md.push_str(&format!(
                "| {} | {:.2} | {} |\n",
                cell(&s.skill_id),
                s.final_score,
                s.mastery_level
            ));
        }
    }

    md
}

pub fn write_markdown_report(report: &GradeReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, generate_markdown(report))
        .with_context(|| format!("failed to write Markdown report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn markdown_has_both_signals() {
        let md = generate_markdown(&fixtures::report());
        assert!(md.contains("**Progress:** 50.00%"));
        assert!(md.contains("**Average module score:** 59.25%"));
        assert!(md.contains("| Decimals | no | 1/1 | 0/1 | 30.00% |"));
        assert!(md.contains("| ratios | 80.00 | met |"));
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        write_markdown_report(&fixtures::report(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("## Modules"));
    }
}
