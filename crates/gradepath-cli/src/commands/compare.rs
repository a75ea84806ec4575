//! The `gradepath compare` command.

use std::path::PathBuf;

use anyhow::Result;

use gradepath_core::report::GradeReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = GradeReport::load_json(&baseline_path)?;
    let current = GradeReport::load_json(&current_path)?;

    if baseline.student_id != current.student_id || baseline.course.id != current.course.id {
        eprintln!(
            "Warning: comparing {}/{} against {}/{}",
            current.student_id, current.course.id, baseline.student_id, baseline.course.id
        );
    }

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} drops, {} gains, {} unchanged (progress {:+.2}, average {:+.2})",
                report.drops.len(),
                report.gains.len(),
                report.unchanged,
                report.progress_delta,
                report.average_delta
            );

            if !report.drops.is_empty() {
                println!("\nDrops:");
                for d in &report.drops {
                    println!(
                        "  {} ({}) {:.2}% -> {:.2}% ({:+.2})",
                        d.module_id, d.title, d.baseline_score, d.current_score, d.delta
                    );
                }
            }

            if !report.gains.is_empty() {
                println!("\nGains:");
                for g in &report.gains {
                    println!(
                        "  {} ({}) {:.2}% -> {:.2}% ({:+.2})",
                        g.module_id, g.title, g.baseline_score, g.current_score, g.delta
                    );
                }
            }

            if !report.new_modules.is_empty() {
                println!("\n{} new module(s)", report.new_modules.len());
            }
            if !report.removed_modules.is_empty() {
                println!("{} removed module(s)", report.removed_modules.len());
            }
        }
    }

    if fail_on_regression && report.has_drops() {
        std::process::exit(1);
    }

    Ok(())
}
