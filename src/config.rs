use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::records::Pagination;
use crate::workflows::{EngineOptions, StageConfiguration};

/// Main configuration structure for the GRC platform
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GrcConfig {
    /// Approval workflow settings
    pub workflow: WorkflowConfig,
    /// Snapshot storage settings
    pub storage: StorageConfig,
    /// List paging limits
    pub pagination: PaginationConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Stage labels used until an administrator replaces them
    pub default_stages: Vec<String>,
    /// Let approve/reject reopen Approved or Rejected requests
    pub reopen_terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// JSON snapshot written after every mutating command
    pub state_file: String,
    /// Seed demo policies, risks and frameworks when no snapshot exists
    pub seed_demo_data: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaginationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or EnvFilter directive
    pub log_level: String,
    /// Emit JSON log lines instead of compact text
    pub json_logs: bool,
}

impl Default for GrcConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig {
                default_stages: StageConfiguration::default().into(),
                reopen_terminal: false,
            },
            storage: StorageConfig {
                state_file: ".grc/state.json".to_string(),
                seed_demo_data: true,
            },
            pagination: PaginationConfig {
                default_limit: 20,
                max_limit: 100,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl GrcConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (grc.toml, .grc-rc)
    /// 3. Environment variables (prefixed with GRC__, nested with __)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`GrcConfig::load`] with configuration files resolved against `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&GrcConfig::default())?);

        let toml_file = dir.join("grc.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".grc-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("GRC")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("workflow.default_stages")
                .try_parsing(true),
        );

        let config: GrcConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        StageConfiguration::new(self.workflow.default_stages.iter().map(String::as_str))?;
        if self.pagination.default_limit == 0 || self.pagination.max_limit == 0 {
            bail!("pagination limits must be greater than zero");
        }
        Ok(())
    }

    pub fn stage_configuration(&self) -> Result<StageConfiguration> {
        Ok(StageConfiguration::new(self.workflow.default_stages.iter().map(String::as_str))?)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            reopen_terminal: self.workflow.reopen_terminal,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            default_limit: self.pagination.default_limit,
            max_limit: self.pagination.max_limit.max(self.pagination.default_limit),
        }
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
