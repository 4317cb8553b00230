//! Binary classifier interface and its ONNX Runtime implementation

use anyhow::{anyhow, bail, Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use std::sync::Mutex;
use tracing::debug;

/// Raw label output of a classifier run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTensor {
    pub shape: Vec<usize>,
    pub values: Vec<i64>,
}

impl LabelTensor {
    /// Label tensor holding one value, as produced for a single-row batch
    pub fn scalar(label: i64) -> Self {
        Self {
            shape: vec![1],
            values: vec![label],
        }
    }
}

/// Trained binary classifier.
///
/// Must be safe to call from several workers at once.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Predict labels for a single feature row.
    fn predict(&self, features: &[f32]) -> Result<LabelTensor>;

    /// Input width the model was exported with, when known
    fn expected_features(&self) -> Option<usize> {
        None
    }
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    name: String,
    /// Session runs need exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    expected_features: Option<usize>,
}

impl OnnxClassifier {
    pub(crate) fn new(
        name: String,
        session: Session,
        input_name: String,
        output_name: String,
        expected_features: Option<usize>,
    ) -> Self {
        Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            expected_features,
        }
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, features: &[f32]) -> Result<LabelTensor> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| anyhow!("model has no output named {}", self.output_name))?;

        // sklearn and xgboost exports emit int64 labels; some converters emit floats
        let labels = if let Ok((shape, data)) = output.try_extract_tensor::<i64>() {
            LabelTensor {
                shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
                values: data.to_vec(),
            }
        } else if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let mut values = Vec::with_capacity(data.len());
            for &v in data {
                if !v.is_finite() || v.fract() != 0.0 {
                    bail!("output {} holds non-integral label {}", self.output_name, v);
                }
                values.push(v as i64);
            }
            LabelTensor {
                shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
                values,
            }
        } else {
            bail!(
                "output {} is not an int64 or float label tensor",
                self.output_name
            );
        };

        debug!(model = %self.name, labels = ?labels.values, "Classifier run complete");

        Ok(labels)
    }

    fn expected_features(&self) -> Option<usize> {
        self.expected_features
    }
}
