//! Model artifact loader

use crate::config::ModelsConfig;
use crate::models::classifier::OnnxClassifier;
use crate::models::text_encoder::CategoryMapEncoder;
use crate::schema::EncodingSchema;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Every artifact the pipeline needs before the first request
pub struct LoadedArtifacts {
    pub schema: EncodingSchema,
    pub classifier: OnnxClassifier,
    pub emp_title_encoder: CategoryMapEncoder,
    pub title_encoder: CategoryMapEncoder,
}

/// Loader for the classifier, the text encoders and the encoding schema
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self { onnx_threads }
    }

    /// Load the ONNX classifier from file
    pub fn load_classifier<P: AsRef<Path>>(
        &self,
        path: P,
        expected_features: Option<usize>,
    ) -> Result<OnnxClassifier> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // Classifier exports carry a label output next to the probabilities
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "label".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(OnnxClassifier::new(
            name,
            session,
            input_name,
            output_name,
            expected_features,
        ))
    }

    /// Load the encoding schema, falling back to the embedded one
    pub fn load_schema(&self, path: Option<&str>) -> Result<EncodingSchema> {
        match path {
            Some(path) => EncodingSchema::load_from_path(path)
                .with_context(|| format!("Failed to load encoding schema from {}", path)),
            None => {
                info!(
                    version = crate::schema::BUILTIN_SCHEMA_VERSION,
                    "Using embedded encoding schema"
                );
                Ok(EncodingSchema::builtin())
            }
        }
    }

    /// Load every artifact named in the configuration
    pub fn load_all(&self, config: &ModelsConfig) -> Result<LoadedArtifacts> {
        let schema = self.load_schema(config.schema_path.as_deref())?;

        let emp_title_encoder = CategoryMapEncoder::load_from_path(&config.emp_title_encoder_path)
            .context("Failed to load employment title encoder")?;
        let title_encoder = CategoryMapEncoder::load_from_path(&config.title_encoder_path)
            .context("Failed to load loan title encoder")?;

        let expected_features = config
            .expected_features
            .or(Some(schema.feature_order.len()));
        let classifier = self.load_classifier(&config.classifier_path, expected_features)?;

        info!(
            schema_version = %schema.version,
            classifier = %config.classifier_path,
            "All model artifacts loaded"
        );

        Ok(LoadedArtifacts {
            schema,
            classifier,
            emp_title_encoder,
            title_encoder,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
