//! Encode-then-predict composition shared by every entry point

use crate::error::PipelineError;
use crate::feature_encoder::FeatureEncoder;
use crate::models::inference::InferenceEngine;
use crate::models::loader::LoadedArtifacts;
use crate::types::application::LoanApplicationRecord;
use crate::types::decision::Prediction;
use std::sync::Arc;

/// Feature encoder and inference engine, evaluated in that order.
pub struct DecisionPipeline {
    encoder: FeatureEncoder,
    engine: InferenceEngine,
}

impl DecisionPipeline {
    pub fn new(encoder: FeatureEncoder, engine: InferenceEngine) -> Self {
        Self { encoder, engine }
    }

    /// Assemble the pipeline from loaded artifacts.
    pub fn from_artifacts(artifacts: LoadedArtifacts) -> anyhow::Result<Self> {
        let encoder = FeatureEncoder::new(
            Arc::new(artifacts.schema),
            Arc::new(artifacts.emp_title_encoder),
            Arc::new(artifacts.title_encoder),
        )?;
        let engine = InferenceEngine::new(Arc::new(artifacts.classifier));
        Ok(Self::new(encoder, engine))
    }

    /// Evaluate one application.
    ///
    /// An application that fails encoding never reaches the classifier.
    pub fn evaluate(&self, record: &LoanApplicationRecord) -> Result<Prediction, PipelineError> {
        let row = self.encoder.encode(record)?;
        Ok(self.engine.predict(&row)?)
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodingError;
    use crate::models::classifier::{Classifier, LabelTensor};
    use crate::models::text_encoder::{CategoryMapEncoder, TextEncoder, UnknownPolicy};
    use crate::schema::EncodingSchema;
    use crate::types::decision::Decision;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    impl Classifier for CountingClassifier {
        fn name(&self) -> &str {
            "counting"
        }

        fn predict(&self, _features: &[f32]) -> anyhow::Result<LabelTensor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LabelTensor::scalar(1))
        }
    }

    fn pipeline(classifier: Arc<CountingClassifier>) -> DecisionPipeline {
        let lenient = |column: &str| -> Arc<dyn TextEncoder> {
            Arc::new(CategoryMapEncoder::new(
                column,
                HashMap::new(),
                UnknownPolicy::Value { value: 0.0 },
            ))
        };
        let encoder = FeatureEncoder::new(
            Arc::new(EncodingSchema::builtin()),
            lenient("emp_title"),
            lenient("title"),
        )
        .unwrap();
        DecisionPipeline::new(encoder, InferenceEngine::new(classifier))
    }

    #[test]
    fn test_evaluate_sample() {
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline(classifier.clone());

        let prediction = pipeline.evaluate(&LoanApplicationRecord::sample()).unwrap();
        assert_eq!(prediction.decision, Decision::Approved);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_encoding_failure_skips_classifier() {
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline(classifier.clone());

        let mut record = LoanApplicationRecord::sample();
        record.home_ownership = "UNKNOWN".to_string();

        let err = pipeline.evaluate(&record).unwrap_err();
        assert_eq!(err.stage(), "encoding");
        assert!(matches!(
            err,
            PipelineError::Encoding(EncodingError::UnknownCategory { .. })
        ));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }
}
