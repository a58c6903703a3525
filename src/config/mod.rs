//! Configuration module for the reclaimer.
//!
//! The reclaimer is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [database]
//! type = "sqlite"
//! path = "${RECLAIMER_DATA_DIR}/atc.db"
//!
//! [gc]
//! missing_grace_period_secs = 300
//!
//! [gc.build_logs]
//! drain_required = true
//!
//! [observability.logging]
//! format = "json"
//! ```

mod database;
mod gc;
mod observability;
mod workers;

use std::path::Path;

pub use database::*;
pub use gc::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use workers::*;

/// Root configuration for the reclaimer.
///
/// Every section except `[database]` is optional with sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReclaimerConfig {
    /// Database holding containers, volumes, caches and build logs.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Grace periods, intervals and retention policy.
    #[serde(default)]
    pub gc: GcConfig,

    /// Worker runtime client settings.
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ReclaimerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: ReclaimerConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.is_none() {
            return Err(ConfigError::Validation(
                "a [database] section is required".into(),
            ));
        }

        self.database.validate()?;
        self.gc.validate()?;
        self.workers.validate()?;
        self.observability.validate()?;

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables that appear after a `#` on the same line are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("invalid env var pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = ReclaimerConfig::from_str(
            r#"
            [database]
            type = "sqlite"
            path = "atc.db"
        "#,
        )
        .unwrap();

        assert!(!config.database.is_none());
        assert_eq!(config.gc.build_logs.batch_size, 500);
        assert_eq!(config.workers.sweep_interval_secs, 30);
    }

    #[test]
    fn test_missing_database_rejected() {
        let result = ReclaimerConfig::from_str(
            r#"
            [gc]
            dry_run = true
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = ReclaimerConfig::from_str(
            r#"
            [database]
            type = "sqlite"
            path = "atc.db"

            [server]
            port = 8080
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
type = "sqlite"
path = "/tmp/atc.db"

[gc]
hijack_grace_period_secs = 60
"#
        )
        .unwrap();

        let config = ReclaimerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gc.hijack_grace_period_secs, 60);
    }

    #[test]
    fn test_from_missing_file() {
        let result = ReclaimerConfig::from_file("/nonexistent/reclaimer.toml");
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_RECLAIMER_DB", Some("/data/atc.db"), || {
            let result = expand_env_vars("path = \"${TEST_RECLAIMER_DB}\"").unwrap();
            assert_eq!(result, "path = \"/data/atc.db\"");
        });
    }

    #[test]
    fn test_env_var_missing() {
        temp_env::with_var_unset("TEST_RECLAIMER_UNSET", || {
            let result = expand_env_vars("path = \"${TEST_RECLAIMER_UNSET}\"");
            assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "TEST_RECLAIMER_UNSET"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# path = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# path = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("TEST_RECLAIMER_DIR", Some("/var/lib"), || {
            let input = "# ${IGNORED}\npath = \"${TEST_RECLAIMER_DIR}/atc.db\"\n";
            let result = expand_env_vars(input).unwrap();
            assert_eq!(result, "# ${IGNORED}\npath = \"/var/lib/atc.db\"\n");
        });
    }
}
