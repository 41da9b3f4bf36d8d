use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::lifecycle::DEFAULT_DUPLICATE_TITLE;

pub const CONFIG_FILE: &str = "course-lifecycle.toml";
pub const RC_FILE: &str = ".course-lifecycle-rc";
pub const ENV_PREFIX: &str = "COURSE_LIFECYCLE";

/// Main configuration structure for the course lifecycle tool
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Where the in-memory backends are persisted
    pub state: StateConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Workflow manager settings
    pub workflows: WorkflowsConfig,
    /// Keep workflows in SQLite instead of the state file (optional)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path to the JSON state file
    pub path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: ".course-lifecycle/state.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level, used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human readable logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    /// Title of duplicated workflows; `{title}` is the source title
    pub duplicate_title_template: String,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            duplicate_title_template: DEFAULT_DUPLICATE_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path or connection string
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://.course-lifecycle/workflows.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (course-lifecycle.toml, .course-lifecycle-rc)
    /// 3. Environment variables (COURSE_LIFECYCLE__SECTION__KEY)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`Self::load`], looking for configuration files in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let config_file = dir.join(CONFIG_FILE);
        if config_file.exists() {
            builder = builder.add_source(File::from(config_file).format(FileFormat::Toml));
        }

        let rc_file = dir.join(RC_FILE);
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: LifecycleConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<LifecycleConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = LifecycleConfig::load_env_file();
        LifecycleConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static LifecycleConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<&'static LifecycleConfig> {
    let config = config()?;
    tracing::debug!(state = %config.state.path, "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = LifecycleConfig::load_from(dir.path()).unwrap();

        assert_eq!(config.workflows.duplicate_title_template, "{title} (copy)");
        assert!(config.database.is_none());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[workflows]
duplicate_title_template = "Copy of {title}"

[database]
url = "sqlite::memory:"
"#,
        )
        .unwrap();

        let config = LifecycleConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.workflows.duplicate_title_template, "Copy of {title}");
        let database = config.database.unwrap();
        assert_eq!(database.url, "sqlite::memory:");
        assert_eq!(database.max_connections, 5);
        assert_eq!(config.observability, ObservabilityConfig::default());
    }

    #[test]
    fn test_rc_file_wins_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[state]\npath = \"a.json\"\n").unwrap();
        std::fs::write(dir.path().join(RC_FILE), "[state]\npath = \"b.json\"\n").unwrap();

        let config = LifecycleConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.state.path, "b.json");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LifecycleConfig::default();
        config.observability.json_logs = true;
        config.save_to_file(dir.path().join(CONFIG_FILE)).unwrap();

        let reloaded = LifecycleConfig::load_from(dir.path()).unwrap();
        assert!(reloaded.observability.json_logs);
    }
}
