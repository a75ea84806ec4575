//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use gradepath_core::model::ActivityStatus;
use gradepath_core::report::{GradeReport, ModuleReport};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn status_class(status: ActivityStatus) -> &'static str {
    match status {
        ActivityStatus::Graded | ActivityStatus::Completed => "pass",
        ActivityStatus::Submitted => "pending",
        ActivityStatus::InProgress | ActivityStatus::NotStarted => "fail",
    }
}

/// Generate an HTML report from a grade report.
pub fn generate_html(report: &GradeReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>gradepath report: {} in {}</title>\n",
        html_escape(&report.student_id),
        html_escape(&report.course.title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>gradepath report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Student: <strong>{}</strong> | Course: <strong>{}</strong> | {} modules | {} activities | {}</p>\n",
        html_escape(&report.student_id),
        html_escape(&report.course.title),
        report.course.module_count,
        report.course.activity_count,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard with both progress signals
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Course progress</th><th>Activities done</th><th>Modules complete</th><th>Average module score</th><th>Completed</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    let completed = match report.progress.completed_at {
        Some(at) => at.format("%Y-%m-%d").to_string(),
        None => "-".to_string(),
    };
    html.push_str(&format!(
        "<tr><td>{:.2}%</td><td>{}/{}</td><td>{}/{}</td><td>{:.2}%</td><td>{}</td></tr>\n",
        report.progress.progress,
        report.progress.completed_activities,
        report.progress.total_activities,
        report.progress.completed_modules,
        report.progress.total_modules,
        report.average_module_score,
        completed,
    ));
    html.push_str("</tbody></table>\n");

    if !report.module_reports.is_empty() {
        html.push_str(&generate_bar_chart(&report.module_reports));
    }
    html.push_str("</section>\n");

    // Modules
    html.push_str("<section class=\"modules\">\n");
    html.push_str("<h2>Modules</h2>\n");
    html.push_str("<table class=\"modules-table\">\n");
    html.push_str("<thead><tr><th>Module</th><th>Complete</th><th>Lessons</th><th>Activities</th><th>Weighted score</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for m in &report.module_reports {
        let class = if m.is_complete { "pass" } else { "fail" };
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}/{}</td><td>{}/{}</td><td>{:.2}%</td></tr>\n",
            html_escape(&m.title),
            class,
            if m.is_complete { "yes" } else { "no" },
            m.tally.lessons_completed,
            m.tally.lessons_total,
            m.tally.activities_done,
            m.tally.activities_total,
            m.module_score,
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Per-activity results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Activities</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Module</th><th onclick=\"sortTable(1)\">Activity</th><th onclick=\"sortTable(2)\">Type</th><th onclick=\"sortTable(3)\">Status</th><th onclick=\"sortTable(4)\">Score</th><th onclick=\"sortTable(5)\">Percent</th><th onclick=\"sortTable(6)\">Passed</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for m in &report.module_reports {
        for a in &m.activities {
            let passed = match a.passed {
                Some(true) => "yes",
                Some(false) => "no",
                None => "-",
            };
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}/{}</td><td>{:.2}%</td><td>{}</td></tr>\n",
                html_escape(&m.title),
                html_escape(&a.title),
                a.activity_type,
                status_class(a.status),
                status_label(a.status),
                a.score,
                a.max_score,
                a.percentage_score,
                passed,
            ));
        }
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Skills
    if !report.skill_assessments.is_empty() {
        html.push_str("<section class=\"skills\">\n");
        html.push_str("<h2>Skills</h2>\n");
        html.push_str("<table>\n");
        html.push_str("<thead><tr><th>Skill</th><th>Normalized</th><th>Final</th><th>Days late</th><th>Mastery</th></tr></thead>\n");
        html.push_str("<tbody>\n");
        for s in &report.skill_assessments {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&s.skill_id),
                s.normalized_score,
                s.final_score,
                s.days_late,
                s.mastery_level,
            ));
        }
        html.push_str("</tbody></table>\n");
        html.push_str("</section>\n");
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

fn status_label(status: ActivityStatus) -> &'static str {
    match status {
        ActivityStatus::NotStarted => "not started",
        ActivityStatus::InProgress => "in progress",
        ActivityStatus::Completed => "completed",
        ActivityStatus::Submitted => "pending review",
        ActivityStatus::Graded => "graded",
    }
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &GradeReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

/// Horizontal bars of weighted module scores on a 0-100 scale.
fn generate_bar_chart(modules: &[ModuleReport]) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 200;

    let total_height = modules.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 70,
        total_height
    );

    for (i, module) in modules.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let score = module.module_score.clamp(0.0, 100.0);
        let width = (score / 100.0 * max_width as f64) as usize;

        let color = if score >= 80.0 {
            "#22c55e"
        } else if score >= 50.0 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&module.title)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.2}%</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            module.module_score
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; --pending: #fef9c3; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; --pending: #713f12; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
.pending { background: var(--pending); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, { numeric: true }) : vb.localeCompare(va, undefined, { numeric: true });
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn html_report_contains_required_elements() {
        let report = fixtures::report();
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Math 101"));
        assert!(html.contains("Quiz 1"));
        assert!(html.contains("50.00%"));
        assert!(html.contains("59.25%"));
        assert!(html.contains("<svg"));
        assert!(html.contains("ratios"));
    }

    #[test]
    fn html_escapes_titles() {
        let html = generate_html(&fixtures::report());
        assert!(html.contains("Fractions &lt;basics&gt;"));
        assert!(!html.contains("Fractions <basics>"));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = fixtures::report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_html_report(&report, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
