//! Configuration management for the loan approval pipeline

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming loan applications
    pub application_subject: String,
    /// Subject for decisions on messages without a reply subject
    pub decision_subject: String,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// ONNX export of the trained classifier
    pub classifier_path: String,
    /// Exported employment title encoder (JSON)
    pub emp_title_encoder_path: String,
    /// Exported loan title encoder (JSON)
    pub title_encoder_path: String,
    /// Encoding schema exported with the model; the embedded schema is used when unset
    #[serde(default)]
    pub schema_path: Option<String>,
    /// Classifier input width; defaults to the schema's feature count
    #[serde(default)]
    pub expected_features: Option<usize>,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum applications evaluated concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                application_subject: "loan.applications".to_string(),
                decision_subject: "loan.decisions".to_string(),
            },
            models: ModelsConfig {
                classifier_path: "models/loan_pred.onnx".to_string(),
                emp_title_encoder_path: "models/emp_title_encoder.json".to_string(),
                title_encoder_path: "models/title_encoder.json".to_string(),
                schema_path: None,
                expected_features: None,
                onnx_threads: default_onnx_threads(),
            },
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: default_metrics_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.application_subject, "loan.applications");
        assert_eq!(config.models.schema_path, None);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[nats]
url = "nats://nats:4222"
application_subject = "apps"
decision_subject = "decisions"

[models]
classifier_path = "m/clf.onnx"
emp_title_encoder_path = "m/emp.json"
title_encoder_path = "m/title.json"
schema_path = "m/schema.json"

[pipeline]
workers = 8

[logging]
level = "debug"
format = "pretty"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.nats.url, "nats://nats:4222");
        assert_eq!(config.models.schema_path.as_deref(), Some("m/schema.json"));
        assert_eq!(config.models.onnx_threads, 1);
        assert_eq!(config.models.expected_features, None);
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.metrics_interval_secs, 30);
        assert_eq!(config.logging.format, "pretty");
    }
}
