//! Configuration module for the bubble-tea pipeline simulator.
//!
//! Loads settings from a JSON file (default `config.json`) layered under
//! environment variable overrides, and validates the merged result before
//! the engine ever sees it.
//!
//! Unlike most configuration loaders, a missing or malformed file is not
//! fatal here (§6/§7): a missing file causes defaults to be written out and
//! used; a malformed file causes a warning and a fall back to defaults.
//! Only a validation failure on the resulting values aborts startup.

use std::path::{Path, PathBuf};

use crate::error::config::ConfigError;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub mod emitters;
pub mod handlers;
pub mod queues;

pub use emitters::EmitterConfig;
pub use handlers::HandlersConfig;
pub use queues::QueuesConfig;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A trait for types that can be validated.
pub trait Validate {
    /// Validates that the configuration is correct.
    fn validate(&self) -> ConfigResult<()>;
}

/// Default path the simulator looks for its configuration file at.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Top-level configuration for the pipeline simulator, mirroring the JSON
/// schema of §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineConfig {
    /// Total wall-clock duration the simulation runs for, in seconds.
    pub simulation_duration_seconds: u64,

    /// Divides every sampled and fixed duration in the pipeline (service
    /// times, rework penalties, backoffs, shutdown grace windows, the
    /// simulation duration itself) by this factor before it becomes a real
    /// sleep. `1.0` (the default) runs at the seconds-denominated pace the
    /// other fields describe; a test harness sets this higher so a run
    /// that would take minutes of wall-clock time completes in
    /// milliseconds while every timing *ratio* between stages is preserved.
    pub time_scale: f64,

    /// Number of `RegularEmitter` tasks to spawn.
    pub regular_emitter_count: usize,

    /// Number of `GroupEmitter` tasks to spawn.
    pub group_emitter_count: usize,

    /// Number of `BasePreparation` handler tasks to spawn.
    pub base_preparation_handlers: usize,

    /// Number of `TapiocaCooking` handler tasks to spawn (see §9: only one
    /// task actually observes the pool regardless of this count).
    pub tapioca_cooking_handlers: usize,

    /// Number of `Toppings` handler tasks to spawn.
    pub toppings_handlers: usize,

    /// Number of `QualityControl` handler tasks to spawn.
    pub quality_control_handlers: usize,

    /// Number of `Packaging` handler tasks to spawn.
    pub packaging_handlers: usize,

    /// Emitter inter-arrival distribution parameters.
    pub emitter: EmitterConfig,

    /// Queue capacity configuration.
    pub queues: QueuesConfig,

    /// Per-stage handler timing and branching probabilities.
    pub handlers: HandlersConfig,

    /// Logging configuration.
    pub log: LogConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            simulation_duration_seconds: 120,
            time_scale: 1.0,
            regular_emitter_count: 2,
            group_emitter_count: 1,
            base_preparation_handlers: 2,
            tapioca_cooking_handlers: 1,
            toppings_handlers: 2,
            quality_control_handlers: 2,
            packaging_handlers: 2,
            emitter: EmitterConfig::default(),
            queues: QueuesConfig::default(),
            handlers: HandlersConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !(self.time_scale > 0.0) {
            return Err(ConfigError::ValidationError(
                "TimeScale must be a positive number".to_string(),
            ));
        }
        if self.regular_emitter_count == 0 {
            return Err(ConfigError::ValidationError(
                "RegularEmitterCount must be at least 1".to_string(),
            ));
        }
        if self.base_preparation_handlers == 0
            || self.tapioca_cooking_handlers == 0
            || self.toppings_handlers == 0
            || self.quality_control_handlers == 0
            || self.packaging_handlers == 0
        {
            return Err(ConfigError::ValidationError(
                "every handler pool must have at least 1 worker".to_string(),
            ));
        }

        self.emitter.validate()?;
        self.queues.validate()?;
        self.handlers.validate()?;
        self.log.validate()?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to log in JSON format
    pub json: bool,

    /// Log file path; the simulator also always writes here per §6 even
    /// when `stdout` is enabled.
    pub file: PathBuf,

    /// Whether to additionally mirror log lines to stdout.
    pub stdout: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: PathBuf::from("simulation.log"),
            stdout: true,
        }
    }
}

impl Validate for LogConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "invalid log level: {other}"
            ))),
        }
    }
}

/// Configuration loader for the pipeline simulator.
#[derive(Debug)]
pub struct ConfigLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// `config_path` defaults to [`DEFAULT_CONFIG_PATH`] when `None`.
    pub fn new<P: AsRef<Path>>(config_path: Option<P>, env_prefix: &str) -> Self {
        Self {
            config_path: config_path
                .map(|p| p.as_ref().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            env_prefix: env_prefix.to_string(),
        }
    }

    /// Loads the configuration from a file and environment variables.
    ///
    /// Behavior on a missing or malformed file follows §6/§7: neither is
    /// fatal. Only validation failure of the final merged value aborts.
    pub fn load(&self) -> ConfigResult<PipelineConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                path = %self.config_path.display(),
                "configuration file not found, writing defaults and proceeding"
            );
            self.write_defaults()?;
        }

        let config = match self.load_merged() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %self.config_path.display(),
                    error = %e,
                    "configuration file is malformed, proceeding with defaults"
                );
                PipelineConfig::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Writes the default configuration to `config_path` as pretty JSON.
    fn write_defaults(&self) -> ConfigResult<()> {
        let defaults = PipelineConfig::default();
        let json = serde_json::to_string_pretty(&defaults)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(&self.config_path, json)
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Ok(())
    }

    /// Loads defaults, the JSON file, and environment overrides through the
    /// `config` crate's layered builder.
    fn load_merged(&self) -> ConfigResult<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let builder = Config::builder()
            .add_source(
                Config::try_from(&defaults).map_err(|e| ConfigError::ParseError(e.to_string()))?,
            )
            .add_source(File::new(
                self.config_path.to_string_lossy().as_ref(),
                FileFormat::Json,
            ))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
