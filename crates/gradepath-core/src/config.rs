//! gradepath configuration loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::PipelineConfig;
use crate::skill::LatePenalty;
use crate::weights::WeightDefaults;

/// Top-level gradepath configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradepathConfig {
    /// Max concurrent recomputations in a batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Retries after a concurrent-update conflict.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Percentage points deducted per day late.
    #[serde(default = "default_late_penalty")]
    pub late_penalty_per_day: f64,
    /// Cap on the total late penalty.
    #[serde(default)]
    pub max_late_penalty: Option<f64>,
    /// `exceeds` starts at competency threshold times this.
    #[serde(default = "default_mastery_multiplier")]
    pub mastery_multiplier: f64,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Weights used when no stored setting applies.
    #[serde(default)]
    pub default_weights: WeightDefaults,
}

fn default_parallelism() -> usize {
    4
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    50
}
fn default_late_penalty() -> f64 {
    5.0
}
fn default_mastery_multiplier() -> f64 {
    1.15
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./gradepath-reports")
}

impl Default for GradepathConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            late_penalty_per_day: default_late_penalty(),
            max_late_penalty: None,
            mastery_multiplier: default_mastery_multiplier(),
            output_dir: default_output_dir(),
            default_weights: WeightDefaults::default(),
        }
    }
}

impl GradepathConfig {
    pub fn late_penalty(&self) -> LatePenalty {
        LatePenalty {
            per_day: self.late_penalty_per_day,
            max_penalty: self.max_late_penalty,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            parallelism: self.parallelism.max(1),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            late_penalty: self.late_penalty(),
            mastery_multiplier: self.mastery_multiplier,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `gradepath.toml` in the current directory
/// 2. `~/.config/gradepath/config.toml`
///
/// `GRADEPATH_PARALLELISM` overrides the parallelism setting.
pub fn load_config() -> Result<GradepathConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<GradepathConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("gradepath.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => GradepathConfig::default(),
    };

    if let Ok(value) = std::env::var("GRADEPATH_PARALLELISM") {
        config.parallelism = value
            .parse()
            .with_context(|| format!("GRADEPATH_PARALLELISM is not a number: {value}"))?;
    }

    anyhow::ensure!(config.parallelism >= 1, "parallelism must be at least 1");
    anyhow::ensure!(
        config.late_penalty_per_day >= 0.0,
        "late_penalty_per_day must not be negative"
    );
    anyhow::ensure!(
        config.mastery_multiplier >= 1.0,
        "mastery_multiplier must be at least 1.0"
    );

    Ok(config)
}

/// Parse config TOML, resolving `${VAR}` references first.
pub fn parse_config_str(content: &str) -> Result<GradepathConfig> {
    let resolved = resolve_env_vars(content);
    Ok(toml::from_str::<GradepathConfig>(&resolved)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gradepath"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActivityCategory;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_GRADEPATH_TEST_VAR", "12");
        assert_eq!(resolve_env_vars("${_GRADEPATH_TEST_VAR}"), "12");
        assert_eq!(
            resolve_env_vars("prefix_${_GRADEPATH_TEST_VAR}_suffix"),
            "prefix_12_suffix"
        );
        std::env::remove_var("_GRADEPATH_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = GradepathConfig::default();
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.mastery_multiplier, 1.15);
        assert_eq!(config.default_weights.module_components.activities, 70.0);
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
parallelism = 8
late_penalty_per_day = 2.5
max_late_penalty = 30.0

[default_weights.module_components]
lessons = 10.0
activities = 90.0
"#;
        let config = parse_config_str(toml_str).unwrap();
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.late_penalty().penalty(4), 10.0);
        assert_eq!(config.late_penalty().penalty(100), 30.0);
        assert_eq!(config.default_weights.module_components.lessons, 10.0);
        assert_eq!(
            config
                .default_weights
                .activity_types
                .get(ActivityCategory::Quiz),
            25.0
        );
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/gradepath.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradepath.toml");
        std::fs::write(&path, "max_retries = 7\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.max_retries, 7);
    }
}
