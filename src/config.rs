#![allow(dead_code)]

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default = "GrabberConfig::default")]
    pub grabber: GrabberConfig,
    #[serde(default = "SystemConfig::default")]
    pub system: SystemConfig,
}

/// One configured capture source. Tagged by `type` so a TOML document can
/// mix file and network sources in the same `[[sources]]` array.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    File {
        name: String,
        file: String,
        /// Per-frame throttle interval, in microseconds. Zero disables pacing.
        #[serde(default)]
        usec: u64,
        history_capacity: Option<usize>,
        framerate_memory: Option<usize>,
    },
    Network {
        name: String,
        host: String,
        port: u16,
        #[serde(default = "default_path")]
        path: String,
        user: Option<String>,
        pass: Option<String>,
        history_capacity: Option<usize>,
        framerate_memory: Option<usize>,
    },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::File { name, .. } => name,
            SourceConfig::Network { name, .. } => name,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GrabberConfig {
    /// Fixed scan-buffer capacity in bytes. Must comfortably exceed the
    /// largest expected frame plus its headers.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Idle timeout, in seconds, applied to each select on the source fd.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Default frame-history ring capacity applied when a source doesn't override it.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Default framerate estimator memory applied when a source doesn't override it.
    #[serde(default = "default_framerate_memory")]
    pub framerate_memory: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            history_capacity: default_history_capacity(),
            framerate_memory: default_framerate_memory(),
        }
    }
}

impl AppConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("mjpegwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("grabber.buffer_size", default_buffer_size() as i64)?
            .set_default("grabber.idle_timeout_secs", default_idle_timeout_secs() as i64)?
            .set_default("system.log_level", default_log_level())?
            .set_default("system.log_format", default_log_format())?
            .set_default(
                "system.history_capacity",
                default_history_capacity() as i64,
            )?
            .set_default(
                "system.framerate_memory",
                default_framerate_memory() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with MJPEGWATCH_ prefix
            .add_source(Environment::with_prefix("MJPEGWATCH").separator("_"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Message(
                "at least one [[sources]] entry is required".to_string(),
            ));
        }

        for source in &self.sources {
            match source {
                SourceConfig::File { name, file, .. } => {
                    if name.is_empty() {
                        return Err(ConfigError::Message(
                            "file source name must not be empty".to_string(),
                        ));
                    }
                    if file.is_empty() {
                        return Err(ConfigError::Message(format!(
                            "file source '{name}' has an empty path"
                        )));
                    }
                }
                SourceConfig::Network {
                    name, host, path, ..
                } => {
                    if name.is_empty() {
                        return Err(ConfigError::Message(
                            "network source name must not be empty".to_string(),
                        ));
                    }
                    if host.is_empty() {
                        return Err(ConfigError::Message(format!(
                            "network source '{name}' has an empty host"
                        )));
                    }
                    if path.is_empty() {
                        return Err(ConfigError::Message(format!(
                            "network source '{name}' has an empty path"
                        )));
                    }
                }
            }
        }

        if self.grabber.buffer_size < 4096 {
            tracing::warn!(
                "grabber.buffer_size ({}) is quite small; frames may be dropped",
                self.grabber.buffer_size
            );
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            grabber: GrabberConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

fn default_path() -> String {
    "/".to_string()
}
fn default_buffer_size() -> usize {
    100_000
}
fn default_idle_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_history_capacity() -> usize {
    150
}
fn default_framerate_memory() -> usize {
    15
}
