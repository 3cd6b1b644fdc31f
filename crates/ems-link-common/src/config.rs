//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and logging for the middleware."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use strum::Display;
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_approval_workers() -> usize {
    2
}

fn default_queue_depth() -> usize {
    64
}

fn default_heartbeat_window() -> Duration {
    Duration::from_secs(120)
}

/// Configuration of a host embedding the ems-link use cases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// A [`LinkConfig`] together with the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedLinkConfig {
    pub config: LinkConfig,
    pub source: PathBuf,
}

impl LinkConfig {
    pub const ENV_CONFIG_PATH: &'static str = "EMS_LINK_CONFIG";

    /// Load configuration from the first existing candidate, respecting the
    /// `EMS_LINK_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedLinkConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedLinkConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedLinkConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read and validate one configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<LinkConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.approval.validate()?;
        self.heartbeat.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for LinkConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: LinkConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Sizing of the worker pool sending automatic approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default = "default_approval_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            workers: default_approval_workers(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl ApprovalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("approval.workers must be at least 1"));
        }
        if self.queue_depth == 0 {
            return Err(anyhow!("approval.queue_depth must be at least 1"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Maximum age of the last heartbeat for the link to count as alive.
    #[serde(default = "default_heartbeat_window")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub window: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            window: default_heartbeat_window(),
        }
    }
}

impl HeartbeatConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(anyhow!("heartbeat.window must be greater than zero"));
        }
        Ok(())
    }
}

/// Energy direction a power-limit use case controls.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LimitDirection {
    /// Limitation of power consumption.
    #[default]
    Consumption,
    /// Limitation of power production.
    Production,
}

impl std::str::FromStr for LimitDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consumption" => Ok(LimitDirection::Consumption),
            "production" => Ok(LimitDirection::Production),
            other => Err(format!("unknown limit direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub direction: LimitDirection,
}
