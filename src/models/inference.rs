//! Inference adapter mapping classifier output to loan decisions

use crate::error::InferenceError;
use crate::feature_encoder::EncodedFeatureRow;
use crate::models::classifier::Classifier;
use crate::types::decision::Prediction;
use std::sync::Arc;
use tracing::debug;

/// Runs the classifier on encoded rows.
///
/// Stateless per call: no retries, since the same row would fail the same way.
pub struct InferenceEngine {
    classifier: Arc<dyn Classifier>,
}

impl InferenceEngine {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Name of the wrapped classifier
    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    /// Predict the decision for one encoded row.
    ///
    /// Label 1 approves; any other label rejects. Anything but exactly one
    /// label is an error, never a rejection.
    pub fn predict(&self, row: &EncodedFeatureRow) -> Result<Prediction, InferenceError> {
        if let Some(expected) = self.classifier.expected_features() {
            if expected != row.len() {
                return Err(InferenceError::FeatureCountMismatch {
                    expected,
                    actual: row.len(),
                });
            }
        }

        let labels = self
            .classifier
            .predict(&row.to_f32())
            .map_err(|e| InferenceError::Classifier(format!("{:#}", e)))?;

        let single_row_shape = labels.shape.iter().product::<usize>() == 1;
        let label = match labels.values.as_slice() {
            [label] if single_row_shape => *label,
            values => {
                return Err(InferenceError::UnexpectedOutput {
                    shape: labels.shape.clone(),
                    len: values.len(),
                })
            }
        };

        let prediction = Prediction::from_label(label);

        debug!(
            model = %self.classifier.name(),
            raw_label = label,
            decision = prediction.decision.as_str(),
            "Inference complete"
        );

        Ok(prediction)
    }
}
