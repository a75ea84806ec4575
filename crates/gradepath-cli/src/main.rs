//! gradepath CLI, the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gradepath",
    version,
    about = "LMS grading, progress, and skill-mastery engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade every student in a gradebook and write reports
    Grade {
        /// Path to .toml gradebook or directory
        #[arg(long)]
        gradebook: PathBuf,

        /// Only report this student
        #[arg(long)]
        student: Option<String>,

        /// Output directory
        #[arg(long, default_value = "./gradepath-reports")]
        output: PathBuf,

        /// Output format: json, html, markdown, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Assess skill mastery for the students of a gradebook
    Skills {
        /// Path to .toml gradebook or directory
        #[arg(long)]
        gradebook: PathBuf,

        /// Only assess this student
        #[arg(long)]
        student: Option<String>,

        /// Days past the deadline
        #[arg(long, default_value = "0")]
        days_late: i64,

        /// Attempts made
        #[arg(long, default_value = "1")]
        attempts: u32,

        /// Improvement multiplier applied before the late penalty
        #[arg(long, default_value = "1.0")]
        improvement: f64,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two grade reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Minimum module score change, in percentage points
        #[arg(long, default_value = "5.0")]
        threshold: f64,

        /// Exit code 1 if any module score dropped
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate gradebook TOML files
    Validate {
        /// Path to gradebook file or directory
        #[arg(long)]
        gradebook: PathBuf,
    },

    /// Create starter config and example gradebook
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gradepath=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Grade {
            gradebook,
            student,
            output,
            format,
            config,
        } => commands::grade::execute(gradebook, student, output, format, config).await,
        Commands::Skills {
            gradebook,
            student,
            days_late,
            attempts,
            improvement,
            config,
        } => {
            commands::skills::execute(gradebook, student, days_late, attempts, improvement, config)
                .await
        }
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Validate { gradebook } => commands::validate::execute(gradebook),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
