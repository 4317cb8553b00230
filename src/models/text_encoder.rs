//! Frozen categorical encoders for free-text fields

use crate::error::SchemaError;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// A fitted encoder mapping a single text column to numeric codes.
///
/// Implementations must be safe for concurrent read-only use; the pipeline
/// shares one instance across all workers.
pub trait TextEncoder: Send + Sync {
    /// Name of the column this encoder was fitted on
    fn column(&self) -> &str;

    /// Encode one column of values, returning one code per row.
    fn transform(&self, column: &[&str]) -> Result<Vec<f64>>;
}

/// What to do with text never seen while fitting
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Fail the transform
    #[default]
    Error,
    /// Substitute a fixed code
    Value { value: f64 },
}

/// Encoder exported from training as a category → code table (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapEncoder {
    column: String,
    categories: HashMap<String, f64>,
    #[serde(default)]
    unknown: UnknownPolicy,
}

impl CategoryMapEncoder {
    pub fn new(
        column: impl Into<String>,
        categories: HashMap<String, f64>,
        unknown: UnknownPolicy,
    ) -> Self {
        Self {
            column: column.into(),
            categories,
            unknown,
        }
    }

    /// Load an exported encoder artifact.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let encoder: Self = serde_json::from_str(&raw).map_err(|source| SchemaError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        info!(
            column = %encoder.column,
            categories = encoder.categories.len(),
            unknown = ?encoder.unknown,
            path = %path.display(),
            "Text encoder loaded"
        );

        Ok(encoder)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    fn encode_one(&self, text: &str) -> Result<f64> {
        if let Some(code) = self.categories.get(text) {
            return Ok(*code);
        }
        match self.unknown {
            UnknownPolicy::Value { value } => Ok(value),
            UnknownPolicy::Error => bail!(
                "unknown category {:?} for column `{}`",
                text,
                self.column
            ),
        }
    }
}

impl TextEncoder for CategoryMapEncoder {
    fn column(&self) -> &str {
        &self.column
    }

    fn transform(&self, column: &[&str]) -> Result<Vec<f64>> {
        column.iter().map(|text| self.encode_one(text)).collect()
    }
}
