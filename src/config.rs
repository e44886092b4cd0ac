//! Configuration management for the risk prediction service

use crate::error::ConfigError;
use crate::schema::SchemaVersion;
use crate::types::assessment::{RiskBandTable, RiskBandThresholds};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub schema: SchemaConfig,
    pub risk_bands: RiskBandThresholds,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Trained artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the three training artifacts
    pub artifacts_dir: PathBuf,
    /// JSON model export
    #[serde(default = "default_model_file")]
    pub model_file: String,
    /// ONNX model export, used when the JSON export is absent
    #[serde(default = "default_onnx_model_file")]
    pub onnx_model_file: String,
    #[serde(default = "default_preprocessor_file")]
    pub preprocessor_file: String,
    #[serde(default = "default_feature_list_file")]
    pub feature_list_file: String,
    /// Reported as `model_used` for ONNX models
    #[serde(default = "default_onnx_model_name")]
    pub onnx_model_name: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Load artifacts at startup rather than on first request
    #[serde(default = "default_preload")]
    pub preload: bool,
}

fn default_model_file() -> String {
    "best_model.json".to_string()
}

fn default_onnx_model_file() -> String {
    "best_model.onnx".to_string()
}

fn default_preprocessor_file() -> String {
    "preprocessor.json".to_string()
}

fn default_feature_list_file() -> String {
    "feature_list.json".to_string()
}

fn default_onnx_model_name() -> String {
    "ONNXModel".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

fn default_preload() -> bool {
    true
}

/// Input schema generation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub version: SchemaVersion,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Metrics reporting
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries, 0 disables
    pub report_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, overridden by
    /// `CERVICAL_RISK__SECTION__KEY` environment variables
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("CERVICAL_RISK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Band table for the configured thresholds
    pub fn risk_band_table(&self) -> Result<RiskBandTable, ConfigError> {
        RiskBandTable::new(self.risk_bands)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            models: ModelsConfig::default(),
            schema: SchemaConfig::default(),
            risk_bands: RiskBandThresholds::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("../model-training/models"),
            model_file: default_model_file(),
            onnx_model_file: default_onnx_model_file(),
            preprocessor_file: default_preprocessor_file(),
            feature_list_file: default_feature_list_file(),
            onnx_model_name: default_onnx_model_name(),
            onnx_threads: default_onnx_threads(),
            preload: default_preload(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}
